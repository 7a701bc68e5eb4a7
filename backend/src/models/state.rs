//! Ledger State
//!
//! In-memory implementation of every collaborator contract the settlement
//! core consumes: pools, vaults, network fees, governance overrides,
//! observations, validator records, the height-indexed outbound queue,
//! throttle windows, synthetic supply and the reserve.
//!
//! # Critical Invariants
//!
//! 1. **Deterministic iteration**: every table is a `BTreeMap`
//! 2. **Atomic enqueue**: a batch that would overflow any height bucket is
//!    rejected whole
//! 3. **No negative supply**: burning more than the outstanding supply fails

use crate::core::math::{safe_sub, Amount};
use crate::models::asset::{Asset, Chain, Coin};
use crate::models::outbound::{NetworkFee, TxOutItem};
use crate::models::pool::Pool;
use crate::models::tx::{Observation, TxId};
use crate::models::vault::{NodeId, Vault, VaultPubKey};
use crate::store::{
    NetworkFeeOracle, NodeRegistry, ObservationProvider, OutboundQueue, ParameterStore, PoolStore,
    QueueError, SupplyError, SupplyLedger, VaultStore,
};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validator record: bond and jail release height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(with = "crate::core::math::amount_serde")]
    pub bond: Amount,
    /// Jailed while the current height is below this value
    pub jailed_until: u64,
}

/// Complete ledger the settlement core runs against.
///
/// # Example
///
/// ```rust
/// use liquidity_settlement_core::core::math::amount;
/// use liquidity_settlement_core::models::pool::Pool;
/// use liquidity_settlement_core::models::state::LedgerState;
/// use liquidity_settlement_core::store::PoolStore;
///
/// let btc = "BTC.BTC".parse().unwrap();
/// let state = LedgerState::new()
///     .with_pool(Pool::new(btc).with_balances(amount(100), amount(10)));
/// assert!(state.pool(&"BTC.BTC".parse().unwrap()).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pools: BTreeMap<Asset, Pool>,
    vaults: BTreeMap<VaultPubKey, Vault>,
    network_fees: BTreeMap<Chain, NetworkFee>,
    parameters: BTreeMap<String, i64>,
    observations: BTreeMap<TxId, Observation>,
    nodes: BTreeMap<NodeId, NodeRecord>,
    queue: BTreeMap<u64, Vec<TxOutItem>>,
    throttle_windows: BTreeMap<u64, Amount>,
    synth_supply: BTreeMap<Asset, Amount>,
    reserve: Amount,
    /// Maximum items per height bucket (unbounded when `None`)
    queue_capacity: Option<usize>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pools.insert(pool.asset.clone(), pool);
        self
    }

    pub fn with_vault(mut self, vault: Vault) -> Self {
        self.vaults.insert(vault.pub_key.clone(), vault);
        self
    }

    pub fn with_network_fee(mut self, fee: NetworkFee) -> Self {
        self.network_fees.insert(fee.chain, fee);
        self
    }

    pub fn with_parameter(mut self, key: &str, value: i64) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn with_observation(mut self, observation: Observation) -> Self {
        self.observations.insert(observation.tx.id.clone(), observation);
        self
    }

    pub fn with_node(mut self, id: NodeId, bond: Amount) -> Self {
        self.nodes.insert(
            id.clone(),
            NodeRecord {
                id,
                bond,
                jailed_until: 0,
            },
        );
        self
    }

    /// Jail `id` until `height` (registering it with zero bond if unknown).
    pub fn with_jailed_node(mut self, id: NodeId, height: u64) -> Self {
        self.nodes
            .entry(id.clone())
            .or_insert_with(|| NodeRecord {
                id,
                bond: Amount::zero(),
                jailed_until: 0,
            })
            .jailed_until = height;
        self
    }

    pub fn with_synth_supply(mut self, asset: Asset, supply: Amount) -> Self {
        self.synth_supply.insert(asset, supply);
        self
    }

    pub fn with_reserve(mut self, reserve: Amount) -> Self {
        self.reserve = reserve;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_queued_item(mut self, item: TxOutItem) -> Self {
        self.queue.entry(item.scheduled_height).or_default().push(item);
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Every queued item, ordered by scheduled height then insertion.
    pub fn queued_items(&self) -> Vec<TxOutItem> {
        self.queue.values().flatten().cloned().collect()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }

    pub fn throttle_windows(&self) -> &BTreeMap<u64, Amount> {
        &self.throttle_windows
    }

    pub fn synth_supplies(&self) -> &BTreeMap<Asset, Amount> {
        &self.synth_supply
    }

    pub fn network_fees(&self) -> impl Iterator<Item = &NetworkFee> {
        self.network_fees.values()
    }

    pub fn parameters(&self) -> &BTreeMap<String, i64> {
        &self.parameters
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.values()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue_capacity
    }

    pub fn insert_node(&mut self, record: NodeRecord) {
        self.nodes.insert(record.id.clone(), record);
    }

    /// Record that an outbound has been broadcast.
    pub fn mark_fulfilled(&mut self, height: u64, in_hash: &TxId, out_hash: TxId) -> bool {
        let item = self.queue.get_mut(&height).and_then(|items| {
            items
                .iter_mut()
                .find(|item| &item.in_hash == in_hash && item.is_pending())
        });
        match item {
            Some(item) => {
                item.out_hash = Some(out_hash);
                true
            }
            None => false,
        }
    }
}

impl PoolStore for LedgerState {
    fn pool(&self, asset: &Asset) -> Option<Pool> {
        self.pools.get(&asset.layer1()).cloned()
    }

    fn set_pool(&mut self, pool: Pool) {
        self.pools.insert(pool.asset.clone(), pool);
    }

    fn pools(&self) -> Vec<Pool> {
        self.pools.values().cloned().collect()
    }
}

impl VaultStore for LedgerState {
    fn vault(&self, pub_key: &VaultPubKey) -> Option<Vault> {
        self.vaults.get(pub_key).cloned()
    }

    fn vaults(&self) -> Vec<Vault> {
        self.vaults.values().cloned().collect()
    }

    fn set_vault(&mut self, vault: Vault) {
        self.vaults.insert(vault.pub_key.clone(), vault);
    }
}

impl NetworkFeeOracle for LedgerState {
    fn network_fee(&self, chain: Chain) -> Option<NetworkFee> {
        self.network_fees.get(&chain).copied()
    }
}

impl ParameterStore for LedgerState {
    fn int_override(&self, key: &str) -> Option<i64> {
        self.parameters.get(key).copied()
    }
}

impl ObservationProvider for LedgerState {
    fn observation(&self, in_hash: &TxId) -> Option<Observation> {
        self.observations.get(in_hash).cloned()
    }
}

impl NodeRegistry for LedgerState {
    fn is_jailed(&self, node: &NodeId, height: u64) -> bool {
        self.nodes
            .get(node)
            .map(|record| record.jailed_until > height)
            .unwrap_or(false)
    }

    fn bond(&self, node: &NodeId) -> Amount {
        self.nodes
            .get(node)
            .map(|record| record.bond.clone())
            .unwrap_or_else(Amount::zero)
    }
}

impl OutboundQueue for LedgerState {
    fn items_at(&self, height: u64) -> Vec<TxOutItem> {
        self.queue.get(&height).cloned().unwrap_or_default()
    }

    fn items_between(&self, start: u64, end: u64) -> Vec<TxOutItem> {
        if start > end {
            return Vec::new();
        }
        self.queue
            .range(start..=end)
            .flat_map(|(_, items)| items.iter().cloned())
            .collect()
    }

    fn enqueue_batch(&mut self, items: &[TxOutItem]) -> Result<(), QueueError> {
        if let Some(capacity) = self.queue_capacity {
            let mut added: BTreeMap<u64, usize> = BTreeMap::new();
            for item in items {
                *added.entry(item.scheduled_height).or_default() += 1;
            }
            for (height, count) in added {
                let existing = self.queue.get(&height).map(Vec::len).unwrap_or(0);
                if existing + count > capacity {
                    return Err(QueueError::Full { height });
                }
            }
        }
        for item in items {
            self.queue
                .entry(item.scheduled_height)
                .or_default()
                .push(item.clone());
        }
        Ok(())
    }

    fn window_volume(&self, window: u64) -> Amount {
        self.throttle_windows
            .get(&window)
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    fn set_window_volume(&mut self, window: u64, volume: Amount) {
        self.throttle_windows.insert(window, volume);
    }
}

impl SupplyLedger for LedgerState {
    fn synth_supply(&self, asset: &Asset) -> Amount {
        self.synth_supply
            .get(asset)
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    fn mint_synth(&mut self, coin: &Coin) {
        let supply = self
            .synth_supply
            .entry(coin.asset.clone())
            .or_insert_with(Amount::zero);
        *supply += &coin.amount;
    }

    fn burn_synth(&mut self, coin: &Coin) -> Result<(), SupplyError> {
        let supply = self.synth_supply(&coin.asset);
        if supply < coin.amount {
            return Err(SupplyError::BurnExceedsSupply {
                asset: coin.asset.clone(),
                requested: coin.amount.clone(),
                supply,
            });
        }
        self.synth_supply
            .insert(coin.asset.clone(), safe_sub(&supply, &coin.amount));
        Ok(())
    }

    fn reserve(&self) -> Amount {
        self.reserve.clone()
    }

    fn credit_reserve(&mut self, amount: &Amount) {
        self.reserve += amount;
    }
}
