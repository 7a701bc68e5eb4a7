//! Outbound fee and gas engine
//!
//! # Fee deduction
//!
//! Every non-internal outbound instruction pays the outbound transaction fee
//! (denominated in rune):
//!
//! - **Rune coin**: the fee (capped at the coin amount) is deducted and sent to
//!   the reserve.
//! - **Any other coin**: the fee is converted to asset terms at the pool price
//!   and deducted. The asset is credited back to the pool (synthetics are simply
//!   never minted), and the pool's rune side pays the reserve, capped at the
//!   pool's rune balance. A coin with no pool, or a pool without liquidity
//!   units, is charged nothing.
//!
//! # Gas ceiling
//!
//! External-chain instructions carry a max-gas allowance of the chain's gas
//! asset derived from the last observed network fee. THOR-chain instructions
//! carry none.

use crate::core::math::{safe_sub, Amount, MAX_BASIS_POINTS};
use crate::models::asset::{Chain, Coin};
use crate::models::outbound::{Memo, TxOutItem};
use crate::models::pool::Pool;
use crate::settlement::error::SettlementError;
use crate::store::NetworkFeeOracle;
use num_traits::Zero;
use std::cmp::min;

// ============================================================================
// Fee deduction
// ============================================================================

/// Result of charging one instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeOutcome {
    pub item: TxOutItem,
    /// Updated pool when an asset fee moved pool balances
    pub pool: Option<Pool>,
    /// Fee taken from the coin, in the coin's asset
    pub asset_fee: Amount,
    /// Rune owed to the reserve
    pub reserve_credit: Amount,
}

/// Whether `memo` skips fee deduction.
pub fn is_fee_exempt(memo: &Memo) -> bool {
    memo.is_internal()
}

/// Charge `fee` rune against `item`.
///
/// `pool` is the pool backing the coin's asset for non-rune coins; `None`
/// charges no fee, as for a pool with zero liquidity units.
///
/// # Returns
///
/// - `Ok(FeeOutcome)` with the reduced item
/// - `Err(InsufficientFee)` if nothing is left to send
pub fn apply_outbound_fee(
    item: TxOutItem,
    memo: &Memo,
    pool: Option<&Pool>,
    fee: &Amount,
) -> Result<FeeOutcome, SettlementError> {
    let mut item = item;
    let original = item.coin.amount.clone();
    let mut pool_out = None;
    let mut asset_fee = Amount::zero();
    let mut reserve_credit = Amount::zero();

    if !is_fee_exempt(memo) {
        if item.coin.asset.is_rune() {
            asset_fee = min(fee, &item.coin.amount).clone();
            reserve_credit = asset_fee.clone();
            item.coin.amount = safe_sub(&item.coin.amount, &asset_fee);
        } else if let Some(pool) = pool {
            if !pool.lp_units.is_zero() {
                let mut updated = pool.clone();
                asset_fee = min(pool.rune_value_in_asset(fee), item.coin.amount.clone());
                item.coin.amount = safe_sub(&item.coin.amount, &asset_fee);
                if !item.coin.asset.is_synthetic() {
                    updated.balance_asset += &asset_fee;
                }
                reserve_credit = min(fee, &pool.balance_rune).clone();
                updated.balance_rune = safe_sub(&pool.balance_rune, &reserve_credit);
                pool_out = Some(updated);
            }
        }
    }

    if matches!(memo, Memo::Ragnarok { .. }) && item.coin.asset.is_gas_asset() {
        if let Some(gas) = item.max_gas_amount().cloned() {
            item.coin.amount = safe_sub(&item.coin.amount, &gas);
        }
    }

    if item.coin.amount.is_zero() && !matches!(memo, Memo::YggdrasilReturn { .. }) {
        return Err(SettlementError::InsufficientFee {
            asset: item.coin.asset.clone(),
            amount: original,
            fee: fee.clone(),
        });
    }

    Ok(FeeOutcome {
        item,
        pool: pool_out,
        asset_fee,
        reserve_credit,
    })
}

// ============================================================================
// Gas
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct GasCeiling {
    pub max_gas: Option<Coin>,
    pub gas_rate: u64,
}

/// Max gas for an instruction on `chain`: `size · rate · multiplier`.
pub fn resolve_gas<O: NetworkFeeOracle>(
    oracle: &O,
    chain: Chain,
    multiplier_bps: u64,
) -> Result<GasCeiling, SettlementError> {
    if chain.is_thor() {
        return Ok(GasCeiling {
            max_gas: None,
            gas_rate: 0,
        });
    }
    let fee = oracle
        .network_fee(chain)
        .filter(|fee| fee.transaction_size > 0 && fee.transaction_rate > 0)
        .ok_or(SettlementError::NetworkFeeUnavailable(chain))?;
    let amount = Amount::from(fee.transaction_size) * fee.transaction_rate * multiplier_bps
        / MAX_BASIS_POINTS;
    Ok(GasCeiling {
        max_gas: Some(Coin::new(chain.gas_asset(), amount)),
        gas_rate: fee.transaction_rate,
    })
}
