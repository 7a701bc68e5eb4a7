//! Batch snapshot
//!
//! Copy-on-read view of everything a settlement batch may change: pools,
//! synthetic supply, throttle windows, the outbound items prepared so far,
//! reserve credits and buffered events. Dropping the snapshot rolls the batch
//! back; [`BatchSnapshot::commit`] is the only path that writes to the ledger.
//!
//! # Commit Order
//!
//! 1. Enqueue every prepared outbound (all-or-nothing; failure writes nothing)
//! 2. Overwrite changed pools
//! 3. Store throttle window totals
//! 4. Credit the reserve
//! 5. Mint synthetic outbounds funded by the mint module
//! 6. Finalize queued synthetic burns

use crate::core::math::{safe_sub, Amount};
use crate::models::asset::{Asset, Coin};
use crate::models::event::{SettlementEvent, SupplyChange};
use crate::models::outbound::{OutboundModule, TxOutItem};
use crate::models::pool::Pool;
use crate::settlement::error::{SettlementError, UnavailableReason};
use crate::store::{Ledger, OutboundQueue, PoolStore, SupplyLedger};
use num_traits::Zero;
use std::collections::BTreeMap;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    height: u64,
    pools: BTreeMap<Asset, Pool>,
    originals: BTreeMap<Asset, Pool>,
    synth_supply: BTreeMap<Asset, Amount>,
    priced_mints: BTreeMap<Asset, Amount>,
    minted: BTreeMap<Asset, Amount>,
    burns: Vec<Coin>,
    windows: BTreeMap<u64, Amount>,
    dirty_windows: BTreeMap<u64, Amount>,
    pending: Vec<TxOutItem>,
    reserve_credit: Amount,
    events: Vec<SettlementEvent>,
    mutated: bool,
}

/// What a successful commit wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedBatch {
    pub height: u64,
    pub items: Vec<TxOutItem>,
    pub pools: Vec<Pool>,
    pub reserve_credit: Amount,
    pub events: Vec<SettlementEvent>,
}

impl BatchSnapshot {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            pools: BTreeMap::new(),
            originals: BTreeMap::new(),
            synth_supply: BTreeMap::new(),
            priced_mints: BTreeMap::new(),
            minted: BTreeMap::new(),
            burns: Vec::new(),
            windows: BTreeMap::new(),
            dirty_windows: BTreeMap::new(),
            pending: Vec::new(),
            reserve_credit: Amount::zero(),
            events: Vec::new(),
            mutated: false,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Whether anything has been written to the snapshot yet.
    pub fn is_mutated(&self) -> bool {
        self.mutated
    }

    // ------------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------------

    /// Working copy of the pool backing `asset`, loading it on first use.
    pub fn pool<S: PoolStore>(&mut self, store: &S, asset: &Asset) -> Result<Pool, SettlementError> {
        let key = asset.layer1();
        if let Some(pool) = self.pools.get(&key) {
            return Ok(pool.clone());
        }
        let pool = store
            .pool(&key)
            .ok_or_else(|| SettlementError::unavailable(&key, UnavailableReason::Missing))?;
        self.originals.insert(key.clone(), pool.clone());
        self.pools.insert(key, pool.clone());
        Ok(pool)
    }

    /// Current view of a pool without loading it into the snapshot.
    pub fn peek_pool<S: PoolStore>(&self, store: &S, asset: &Asset) -> Option<Pool> {
        let key = asset.layer1();
        self.pools.get(&key).cloned().or_else(|| store.pool(&key))
    }

    pub fn put_pool(&mut self, pool: Pool) {
        self.mutated = true;
        self.pools.insert(pool.asset.clone(), pool);
    }

    /// Pools that differ from what was loaded.
    pub fn changed_pools(&self) -> Vec<Pool> {
        self.pools
            .iter()
            .filter(|(asset, pool)| self.originals.get(*asset) != Some(*pool))
            .map(|(_, pool)| pool.clone())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Synthetic supply
    // ------------------------------------------------------------------------

    /// Outstanding supply of `synth` as the batch has left it so far.
    ///
    /// Loaded supply, plus synthetics minted earlier in the batch (priced by a
    /// swap or scheduled through the mint module), minus queued burns.
    pub fn synth_supply<S: SupplyLedger>(&mut self, store: &S, synth: &Asset) -> Amount {
        let loaded = self
            .synth_supply
            .entry(synth.clone())
            .or_insert_with(|| store.synth_supply(synth))
            .clone();
        let minted = [&self.priced_mints, &self.minted]
            .iter()
            .filter_map(|mints| mints.get(synth))
            .fold(loaded, |acc, amount| acc + amount);
        let queued = self
            .burns
            .iter()
            .filter(|coin| &coin.asset == synth)
            .fold(Amount::zero(), |acc, coin| acc + &coin.amount);
        safe_sub(&minted, &queued)
    }

    /// Count a synthetic mint priced by a swap leg until its outbound is
    /// scheduled.
    pub fn price_mint(&mut self, coin: &Coin) {
        self.mutated = true;
        *self
            .priced_mints
            .entry(coin.asset.clone())
            .or_insert_with(Amount::zero) += &coin.amount;
    }

    pub fn queue_burn(&mut self, coin: Coin) {
        self.mutated = true;
        self.burns.push(coin);
    }

    pub fn burns(&self) -> &[Coin] {
        &self.burns
    }

    // ------------------------------------------------------------------------
    // Throttle windows
    // ------------------------------------------------------------------------

    pub fn window_volume<Q: OutboundQueue>(&mut self, store: &Q, window: u64) -> Amount {
        self.windows
            .entry(window)
            .or_insert_with(|| store.window_volume(window))
            .clone()
    }

    pub fn add_window_volume<Q: OutboundQueue>(&mut self, store: &Q, window: u64, value: &Amount) {
        let total = self.window_volume(store, window) + value;
        self.mutated = true;
        self.windows.insert(window, total.clone());
        self.dirty_windows.insert(window, total);
    }

    // ------------------------------------------------------------------------
    // Outbounds, reserve, events
    // ------------------------------------------------------------------------

    pub fn push_outbound(&mut self, item: TxOutItem) {
        self.mutated = true;
        if item.module == Some(OutboundModule::Mint) {
            // The delivered amount replaces the priced one; the fee is never minted.
            self.priced_mints.remove(&item.coin.asset);
            *self
                .minted
                .entry(item.coin.asset.clone())
                .or_insert_with(Amount::zero) += &item.coin.amount;
        }
        self.pending.push(item);
    }

    /// Items prepared earlier in this batch.
    pub fn pending(&self) -> &[TxOutItem] {
        &self.pending
    }

    pub fn credit_reserve(&mut self, amount: &Amount) {
        if amount.is_zero() {
            return;
        }
        self.mutated = true;
        self.reserve_credit += amount;
    }

    pub fn reserve_credit(&self) -> &Amount {
        &self.reserve_credit
    }

    pub fn record_event(&mut self, event: SettlementEvent) {
        self.events.push(event);
    }

    // ------------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------------

    /// Write the batch to `ledger`.
    ///
    /// Enqueueing happens first; if the queue refuses the batch nothing else
    /// is written and `SchedulingFailure` is returned.
    pub fn commit<L: Ledger>(self, ledger: &mut L) -> Result<CommittedBatch, SettlementError> {
        ledger.enqueue_batch(&self.pending)?;

        let pools = self.changed_pools();
        for pool in &pools {
            ledger.set_pool(pool.clone());
        }
        for (window, volume) in &self.dirty_windows {
            ledger.set_window_volume(*window, volume.clone());
        }
        if !self.reserve_credit.is_zero() {
            ledger.credit_reserve(&self.reserve_credit);
        }

        let mut events = self.events;
        for item in &self.pending {
            if item.module == Some(OutboundModule::Mint) {
                ledger.mint_synth(&item.coin);
                events.push(SettlementEvent::MintBurn {
                    height: self.height,
                    change: SupplyChange::Mint,
                    coin: item.coin.clone(),
                });
            }
        }
        for coin in &self.burns {
            match ledger.burn_synth(coin) {
                Ok(()) => events.push(SettlementEvent::MintBurn {
                    height: self.height,
                    change: SupplyChange::Burn,
                    coin: coin.clone(),
                }),
                Err(err) => error!(coin = %coin, error = %err, "fail to burn synthetic after commit"),
            }
        }
        for item in &self.pending {
            events.push(SettlementEvent::Scheduled {
                height: self.height,
                item: item.clone(),
            });
        }

        info!(
            height = self.height,
            outbounds = self.pending.len(),
            pools = pools.len(),
            reserve_credit = %self.reserve_credit,
            "settlement batch committed"
        );

        Ok(CommittedBatch {
            height: self.height,
            items: self.pending,
            pools,
            reserve_credit: self.reserve_credit,
            events,
        })
    }
}
