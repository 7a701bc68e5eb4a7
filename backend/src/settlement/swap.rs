//! AMM Swap Calculator
//!
//! Prices swaps against constant-product pools that pair the settlement asset
//! (rune) with one layer-1 asset.
//!
//! # Formulas
//!
//! With input depth `X`, input amount `x` and output depth `Y`:
//!
//! ```text
//! emitted       = x·X·Y / (x+X)²
//! liquidity fee = x²·Y  / (x+X)²
//! slip (bps)    = x·(2X+x) / X² · 10000   (rounded half-up)
//! ```
//!
//! A swap where neither side is rune runs two legs: source → rune → target.
//!
//! # Critical Invariants
//!
//! - **Pure pricing**: [`price_leg`] takes a pool by reference and returns the
//!   post-swap pool as a new value
//! - **Pre-mutation validation**: pool availability is checked for every leg
//!   before the first leg touches the batch snapshot
//! - **Chain resolution**: emitted amounts are floored to the pool's decimals

use crate::core::math::{ratio_bps_half_up, round_to_decimal, safe_sub, Amount};
use crate::models::asset::{Asset, Coin};
use crate::models::pool::Pool;
use crate::settlement::error::{SettlementError, UnavailableReason, ValidationError};
use crate::settlement::snapshot::BatchSnapshot;
use crate::settlement::synth::{self, SynthOperation, SynthPolicy};
use crate::store::{PoolStore, SupplyLedger};
use num_traits::Zero;
use tracing::{debug, info};

// ============================================================================
// Formulas
// ============================================================================

/// `x·X·Y / (x+X)²`, floored. Zero when the denominator is zero.
///
/// # Example
///
/// ```rust
/// use liquidity_settlement_core::core::math::amount;
/// use liquidity_settlement_core::settlement::swap::calc_asset_emission;
///
/// let depth = amount(100_00000000);
/// let emitted = calc_asset_emission(&depth, &amount(5_00000000), &depth);
/// assert_eq!(emitted, amount(453_514_739));
/// ```
pub fn calc_asset_emission(depth_in: &Amount, input: &Amount, depth_out: &Amount) -> Amount {
    let denominator = (input + depth_in) * (input + depth_in);
    if denominator.is_zero() {
        return Amount::zero();
    }
    input * depth_in * depth_out / denominator
}

/// `x²·Y / (x+X)²`, floored. Zero when the denominator is zero.
pub fn calc_liquidity_fee(depth_in: &Amount, input: &Amount, depth_out: &Amount) -> Amount {
    let denominator = (input + depth_in) * (input + depth_in);
    if denominator.is_zero() {
        return Amount::zero();
    }
    input * input * depth_out / denominator
}

/// `x·(2X+x) / X²` in basis points, computed as an exact rational and
/// rounded half-up. Zero when the input depth is zero.
pub fn calc_swap_slip_bps(depth_in: &Amount, input: &Amount) -> u64 {
    let numerator = input * (depth_in * 2u32 + input);
    let denominator = depth_in * depth_in;
    ratio_bps_half_up(&numerator, &denominator).unwrap_or(0)
}

// ============================================================================
// Single leg
// ============================================================================

/// Per-leg pricing inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct LegParams {
    /// Minimum acceptable output (zero = no limit)
    pub trade_target: Amount,
    /// Protocol outbound fee in rune
    pub transaction_fee: Amount,
    /// Working-depth multiplier for synthetic mint/burn
    pub virtual_multiplier: u64,
}

/// Priced swap leg.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapLegResult {
    pub pool_before: Pool,
    pub pool_after: Pool,
    pub source: Coin,
    pub emitted: Coin,
    pub trade_target: Amount,
    /// Fee in output-asset units
    pub liquidity_fee: Amount,
    pub liquidity_fee_in_rune: Amount,
    pub slip_bps: u64,
}

/// Price one leg of a swap against `pool`.
///
/// One side of the leg must be rune. A synthetic on either side prices
/// against depths scaled by `virtual_multiplier`; the post-swap pool then
/// only moves its rune balance (the asset side backs the synthetic, not the
/// pool's real holdings).
///
/// # Returns
///
/// - `Ok(SwapLegResult)` with the post-swap pool as a new value
/// - `Err(SettlementError)` leaving `pool` untouched
pub fn price_leg(
    pool: &Pool,
    source: &Coin,
    target: &Asset,
    params: &LegParams,
) -> Result<SwapLegResult, SettlementError> {
    let source_is_rune = source.asset.is_rune();
    if source_is_rune && source.amount <= params.transaction_fee {
        return Err(SettlementError::InsufficientFee {
            asset: source.asset.clone(),
            amount: source.amount.clone(),
            fee: params.transaction_fee.clone(),
        });
    }
    if !pool.is_available() && !source.asset.is_synthetic() {
        return Err(SettlementError::unavailable(
            &pool.asset,
            UnavailableReason::Status(pool.status),
        ));
    }
    if source.amount.is_zero() {
        return Err(ValidationError::ZeroAmount(source.asset.clone()).into());
    }

    let synthetic = source.asset.is_synthetic() || target.is_synthetic();
    let (mut depth_in, mut depth_out) = if source_is_rune {
        (pool.balance_rune.clone(), pool.balance_asset.clone())
    } else {
        (pool.balance_asset.clone(), pool.balance_rune.clone())
    };
    if synthetic {
        depth_in *= params.virtual_multiplier;
        depth_out *= params.virtual_multiplier;
    }
    if depth_in.is_zero() || depth_out.is_zero() {
        return Err(SettlementError::unavailable(
            &pool.asset,
            UnavailableReason::EmptyDepth,
        ));
    }

    let input = &source.amount;
    let liquidity_fee = calc_liquidity_fee(&depth_in, input, &depth_out);
    let slip_bps = calc_swap_slip_bps(&depth_in, input);
    let emitted = round_to_decimal(
        &calc_asset_emission(&depth_in, input, &depth_out),
        pool.decimals,
    );

    // A burn pays out of the real rune balance, not the virtual depth.
    let payable = if source.asset.is_synthetic() {
        pool.balance_rune.clone()
    } else {
        depth_out.clone()
    };
    if emitted >= payable {
        return Err(SettlementError::InsufficientBalance {
            asset: target.clone(),
            requested: emitted,
            available: payable,
        });
    }
    if !params.trade_target.is_zero() && emitted < params.trade_target {
        return Err(SettlementError::SlippageExceeded {
            emitted,
            limit: params.trade_target.clone(),
        });
    }
    if emitted.is_zero() {
        return Err(SettlementError::ZeroEmission {
            asset: target.clone(),
        });
    }

    let liquidity_fee_in_rune = if source_is_rune {
        pool.asset_value_in_rune(&liquidity_fee)
    } else {
        liquidity_fee.clone()
    };

    let mut pool_after = pool.clone();
    if source.asset.is_synthetic() {
        pool_after.balance_rune = safe_sub(&pool.balance_rune, &emitted);
    } else if target.is_synthetic() {
        pool_after.balance_rune = &pool.balance_rune + input;
    } else if source_is_rune {
        pool_after.balance_rune = &pool.balance_rune + input;
        pool_after.balance_asset = safe_sub(&pool.balance_asset, &emitted);
    } else {
        pool_after.balance_asset = &pool.balance_asset + input;
        pool_after.balance_rune = safe_sub(&pool.balance_rune, &emitted);
    }

    debug!(
        pool = %pool.asset,
        source = %source,
        target = %target,
        emitted = %emitted,
        liquidity_fee = %liquidity_fee,
        slip_bps,
        "priced swap leg"
    );

    Ok(SwapLegResult {
        pool_before: pool.clone(),
        pool_after,
        source: source.clone(),
        emitted: Coin::new(target.clone(), emitted),
        trade_target: params.trade_target.clone(),
        liquidity_fee,
        liquidity_fee_in_rune,
        slip_bps,
    })
}

// ============================================================================
// Full swap over the batch snapshot
// ============================================================================

/// Batch-level swap parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapParams {
    pub transaction_fee: Amount,
    pub virtual_multiplier: u64,
    pub synth: SynthPolicy,
}

/// Result of a complete (single or double) swap.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub emitted: Coin,
    pub legs: Vec<SwapLegResult>,
}

impl SwapOutcome {
    /// Sum of every leg's liquidity fee in rune terms.
    pub fn total_liquidity_fee_in_rune(&self) -> Amount {
        self.legs
            .iter()
            .fold(Amount::zero(), |acc, leg| acc + &leg.liquidity_fee_in_rune)
    }
}

/// Pool backing `asset` (rune has none).
fn pool_asset_for(source: &Asset, target: &Asset) -> Asset {
    if source.is_rune() {
        target.layer1()
    } else {
        source.layer1()
    }
}

/// Every pool the swap will touch exists and is tradable.
///
/// A synthetic source may still burn against a pool that is not available.
fn validate_pools<S: PoolStore>(
    snapshot: &BatchSnapshot,
    store: &S,
    source: &Asset,
    target: &Asset,
) -> Result<(), SettlementError> {
    for asset in [source, target] {
        if asset.is_rune() {
            continue;
        }
        let pool = snapshot
            .peek_pool(store, asset)
            .ok_or_else(|| SettlementError::unavailable(&asset.layer1(), UnavailableReason::Missing))?;
        if !pool.is_available() && !(asset == source && source.is_synthetic()) {
            return Err(SettlementError::unavailable(
                &pool.asset,
                UnavailableReason::Status(pool.status),
            ));
        }
    }
    Ok(())
}

/// Swap `source` into `target`, applying each leg to the batch snapshot.
///
/// Synthetic targets mint pool units and are capped by the supply policy;
/// synthetic sources burn units and queue the inbound coin for burning at
/// commit.
pub fn execute_swap<S: PoolStore + SupplyLedger>(
    snapshot: &mut BatchSnapshot,
    store: &S,
    source: &Coin,
    target: &Asset,
    trade_target: &Amount,
    params: &SwapParams,
) -> Result<SwapOutcome, SettlementError> {
    if source.asset == *target {
        return Err(ValidationError::SameAsset(target.clone()).into());
    }
    if source.asset.is_synthetic() {
        params.synth.check_enabled(SynthOperation::Burn, snapshot.height())?;
    }
    if target.is_synthetic() {
        params.synth.check_enabled(SynthOperation::Mint, snapshot.height())?;
    }
    validate_pools(snapshot, store, &source.asset, target)?;

    let mut legs = Vec::with_capacity(2);
    let mut input = source.clone();
    if !source.asset.is_rune() && !target.is_rune() {
        let leg = swap_one(snapshot, store, &input, &Asset::rune(), &Amount::zero(), params)?;
        input = leg.emitted.clone();
        legs.push(leg);
    }
    let leg = swap_one(snapshot, store, &input, target, trade_target, params)?;
    if target.is_rune() && leg.emitted.amount <= params.transaction_fee {
        return Err(SettlementError::InsufficientFee {
            asset: target.clone(),
            amount: leg.emitted.amount.clone(),
            fee: params.transaction_fee.clone(),
        });
    }
    let emitted = leg.emitted.clone();
    legs.push(leg);

    info!(
        source = %source,
        emitted = %emitted,
        legs = legs.len(),
        "swap priced"
    );
    Ok(SwapOutcome { emitted, legs })
}

fn swap_one<S: PoolStore + SupplyLedger>(
    snapshot: &mut BatchSnapshot,
    store: &S,
    source: &Coin,
    target: &Asset,
    trade_target: &Amount,
    params: &SwapParams,
) -> Result<SwapLegResult, SettlementError> {
    let pool_asset = pool_asset_for(&source.asset, target);
    let pool = snapshot.pool(store, &pool_asset)?;
    let leg_params = LegParams {
        trade_target: trade_target.clone(),
        transaction_fee: params.transaction_fee.clone(),
        virtual_multiplier: params.virtual_multiplier,
    };
    let mut leg = price_leg(&pool, source, target, &leg_params)?;

    if target.is_synthetic() {
        let units = synth::mint_units(&leg.pool_before, &source.amount);
        let supply_after = snapshot.synth_supply(store, target) + &leg.emitted.amount;
        let minted_pool = synth::apply_mint(&leg.pool_after, &units);
        params
            .synth
            .check_supply_cap(&minted_pool, target, &supply_after)?;
        leg.pool_after = minted_pool;
        snapshot.price_mint(&leg.emitted);
    }
    if source.asset.is_synthetic() {
        let supply = snapshot.synth_supply(store, &source.asset);
        let units = synth::burn_units(&leg.pool_after, source, &supply)?;
        leg.pool_after = synth::apply_burn(&leg.pool_after, &units);
        snapshot.queue_burn(source.clone());
    }

    snapshot.put_pool(leg.pool_after.clone());
    Ok(leg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::amount;
    use crate::models::pool::PoolStatus;

    fn pool() -> Pool {
        Pool::new("BTC.BTC".parse().unwrap())
            .with_balances(amount(100_00000000), amount(100_00000000))
            .with_units(amount(100_00000000), amount(0))
    }

    fn params() -> LegParams {
        LegParams {
            trade_target: amount(0),
            transaction_fee: amount(1_000000),
            virtual_multiplier: 2,
        }
    }

    #[test]
    fn test_formulas_match_reference_values() {
        let depth = amount(100_00000000);
        let input = amount(5_00000000);
        assert_eq!(calc_asset_emission(&depth, &input, &depth), amount(453_514_739));
        assert_eq!(calc_liquidity_fee(&depth, &input, &depth), amount(22_675_736));
        assert_eq!(calc_swap_slip_bps(&depth, &input), 1025);
    }

    #[test]
    fn test_zero_depth_formulas_do_not_panic() {
        assert_eq!(calc_asset_emission(&amount(0), &amount(0), &amount(5)), amount(0));
        assert_eq!(calc_swap_slip_bps(&amount(0), &amount(5)), 0);
    }

    #[test]
    fn test_price_leg_rune_to_asset_moves_both_sides() {
        let source = Coin::new(Asset::rune(), amount(5_00000000));
        let leg = price_leg(&pool(), &source, &"BTC.BTC".parse().unwrap(), &params()).unwrap();
        assert_eq!(leg.pool_after.balance_rune, amount(105_00000000));
        assert_eq!(leg.pool_after.balance_asset, amount(100_00000000 - 453_514_739));
        assert_eq!(leg.liquidity_fee_in_rune, amount(22_675_736));
    }

    #[test]
    fn test_price_leg_rejects_suspended_pool() {
        let source = Coin::new(Asset::rune(), amount(5_00000000));
        let suspended = pool().with_status(PoolStatus::Suspended);
        let err = price_leg(&suspended, &source, &"BTC.BTC".parse().unwrap(), &params()).unwrap_err();
        assert!(matches!(err, SettlementError::PoolUnavailable { .. }));
    }

    #[test]
    fn test_price_leg_rejects_rune_input_below_fee() {
        let source = Coin::new(Asset::rune(), amount(1_000000));
        let err = price_leg(&pool(), &source, &"BTC.BTC".parse().unwrap(), &params()).unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientFee { .. }));
    }

    #[test]
    fn test_price_leg_floors_to_pool_decimals() {
        let source = Coin::new(Asset::rune(), amount(5_00000000));
        let six_decimals = pool().with_decimals(6);
        let leg = price_leg(&six_decimals, &source, &"BTC.BTC".parse().unwrap(), &params()).unwrap();
        assert_eq!(leg.emitted.amount, amount(453_514_700));
    }
}
