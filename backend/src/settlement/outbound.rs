//! Outbound preparation
//!
//! Turns one requested payment into the concrete instructions that will be
//! enqueued at commit: resolves the gas ceiling, picks funding vaults, charges
//! the outbound fee on each instruction and schedules it through the
//! throttle. Every effect lands in the [`BatchSnapshot`]; nothing is written
//! to the ledger here.
//!
//! # Critical Invariants
//!
//! - **Validate first**: [`validate_outbound`] runs before any snapshot write
//! - **Whole or nothing**: if any allocation fails the caller drops the
//!   snapshot, so partially prepared instructions never reach the queue
//! - **Module funding**: THOR-chain outbounds never select a vault

use crate::core::math::Amount;
use crate::models::asset::Coin;
use crate::models::event::SettlementEvent;
use crate::models::outbound::{Memo, OutboundModule, TxOutItem};
use crate::models::pool::Pool;
use crate::settlement::error::{SettlementError, ValidationError};
use crate::settlement::fees::{self, GasCeiling};
use crate::settlement::snapshot::BatchSnapshot;
use crate::settlement::throttle::{self, ThrottleParams};
use crate::settlement::vault_select::{self, FundingRequest, SelectionPolicy};
use crate::settlement::PipelineStage;
use crate::store::Ledger;
use num_traits::Zero;
use tracing::debug;

/// Fee, gas, vault and throttle settings for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundParams {
    /// Outbound transaction fee in rune
    pub fee: Amount,
    pub gas_multiplier_bps: u64,
    pub selection: SelectionPolicy,
    pub throttle: ThrottleParams,
}

/// Check an instruction before anything is priced or reserved.
///
/// Returns the parsed memo; an empty memo means `OUT:<in_hash>`.
pub fn validate_outbound(item: &TxOutItem) -> Result<Memo, ValidationError> {
    if item.to_address.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    if !item.to_address.is_chain(item.chain) {
        return Err(ValidationError::AddressChainMismatch {
            address: item.to_address.clone(),
            chain: item.chain,
        });
    }
    if item.coin.amount.is_zero() {
        return Err(ValidationError::ZeroAmount(item.coin.asset.clone()));
    }
    if item.memo.trim().is_empty() {
        return Ok(Memo::Outbound {
            in_hash: item.in_hash.clone(),
        });
    }
    Ok(Memo::parse(&item.memo)?)
}

/// Rune-denominated value of `coin` at current snapshot prices.
fn rune_value<L: Ledger>(snapshot: &BatchSnapshot, ledger: &L, coin: &Coin) -> Amount {
    if coin.asset.is_rune() {
        return coin.amount.clone();
    }
    snapshot
        .peek_pool(ledger, &coin.asset)
        .map(|pool| pool.asset_value_in_rune(&coin.amount))
        .unwrap_or_else(Amount::zero)
}

/// Fee a vault must exceed in the coin's own asset to be worth selecting.
fn asset_fee_for<L: Ledger>(
    snapshot: &BatchSnapshot,
    ledger: &L,
    coin: &Coin,
    memo: &Memo,
    fee: &Amount,
) -> Amount {
    if fees::is_fee_exempt(memo) {
        return Amount::zero();
    }
    if coin.asset.is_rune() {
        return fee.clone();
    }
    snapshot
        .peek_pool(ledger, &coin.asset)
        .map(|pool| pool.rune_value_in_asset(fee))
        .unwrap_or_else(Amount::zero)
}

/// Prepare `item` into one or more scheduled instructions.
///
/// `item.vault_pub_key`, when set, pins the funding vault. On success the
/// instructions have been pushed onto the snapshot and are also returned.
/// `stage` advances through vault selection, fee and scheduling so a failure
/// can be reported against the step that raised it.
pub fn prepare_outbound<L: Ledger>(
    snapshot: &mut BatchSnapshot,
    ledger: &L,
    item: TxOutItem,
    params: &OutboundParams,
    stage: &mut PipelineStage,
) -> Result<Vec<TxOutItem>, SettlementError> {
    let memo = validate_outbound(&item)?;

    let mut item = item;
    if item.memo.trim().is_empty() {
        item.memo = memo.to_string();
    }

    let GasCeiling { max_gas, gas_rate } =
        fees::resolve_gas(ledger, item.chain, params.gas_multiplier_bps)?;
    item.max_gas = max_gas;
    item.gas_rate = gas_rate;

    let funded: Vec<TxOutItem> = if item.chain.is_thor() {
        if item.module.is_none() {
            let module = if item.coin.asset.is_synthetic() {
                OutboundModule::Mint
            } else {
                OutboundModule::Asgard
            };
            item.module = Some(module);
        }
        item.vault_pub_key = None;
        vec![item]
    } else {
        let no_gas = Amount::zero();
        let asset_fee = asset_fee_for(snapshot, ledger, &item.coin, &memo, &params.fee);
        let request = FundingRequest {
            coin: &item.coin,
            chain: item.chain,
            to_address: &item.to_address,
            in_hash: &item.in_hash,
            max_gas: item.max_gas_amount().unwrap_or(&no_gas),
            asset_fee: &asset_fee,
        };
        let allocations = vault_select::select_funding(
            ledger,
            snapshot,
            &request,
            item.vault_pub_key.as_ref(),
            &params.selection,
        )?;
        allocations
            .into_iter()
            .map(|allocation| {
                let mut funded = item.clone();
                funded.vault_pub_key = Some(allocation.vault);
                funded.coin.amount = allocation.amount;
                funded
            })
            .collect()
    };
    *stage = PipelineStage::VaultSelected;

    let mut charged = Vec::with_capacity(funded.len());
    for instruction in funded {
        let pool: Option<Pool> = if instruction.coin.asset.is_rune() || fees::is_fee_exempt(&memo) {
            None
        } else {
            snapshot.peek_pool(ledger, &instruction.coin.asset)
        };
        let outcome = fees::apply_outbound_fee(instruction, &memo, pool.as_ref(), &params.fee)?;
        if let Some(updated) = outcome.pool {
            snapshot.put_pool(updated);
        }
        snapshot.credit_reserve(&outcome.reserve_credit);
        if !outcome.asset_fee.is_zero() {
            let pool_deduct = if outcome.item.coin.asset.is_rune() {
                Amount::zero()
            } else {
                outcome.reserve_credit.clone()
            };
            snapshot.record_event(SettlementEvent::Fee {
                height: snapshot.height(),
                in_hash: outcome.item.in_hash.clone(),
                coin: Coin::new(outcome.item.coin.asset.clone(), outcome.asset_fee.clone()),
                pool_deduct,
            });
        }
        charged.push(outcome.item);
    }
    *stage = PipelineStage::FeeApplied;

    let mut scheduled = Vec::with_capacity(charged.len());
    for mut instruction in charged {
        instruction.scheduled_height = if memo.is_internal() {
            snapshot.height()
        } else {
            let value = rune_value(snapshot, ledger, &instruction.coin);
            throttle::schedule(snapshot, ledger, &value, &params.throttle)
        };
        debug!(
            item = %instruction,
            vault = ?instruction.vault_pub_key,
            "outbound prepared"
        );
        snapshot.push_outbound(instruction.clone());
        scheduled.push(instruction);
    }
    *stage = PipelineStage::Scheduled;

    Ok(scheduled)
}
