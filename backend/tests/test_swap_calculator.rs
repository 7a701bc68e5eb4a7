//! AMM Swap Calculator Tests
//!
//! Single-leg pricing, double swaps through rune, and the rejection paths
//! that must leave the batch snapshot untouched.

use liquidity_settlement_core::core::math::{amount, Amount};
use liquidity_settlement_core::models::{Asset, Coin, LedgerState, Pool, PoolStatus};
use liquidity_settlement_core::settlement::error::UnavailableReason;
use liquidity_settlement_core::settlement::swap::{
    calc_asset_emission, calc_liquidity_fee, calc_swap_slip_bps, execute_swap, price_leg, LegParams,
    SwapParams,
};
use liquidity_settlement_core::settlement::synth::{CoverageFormula, SynthPolicy};
use liquidity_settlement_core::settlement::{BatchSnapshot, SettlementError, ValidationError};

// ============================================================================
// Test Helpers
// ============================================================================

fn asset(s: &str) -> Asset {
    s.parse().unwrap()
}

fn pool(symbol: &str, rune: u64, depth: u64) -> Pool {
    Pool::new(asset(symbol))
        .with_balances(amount(rune), amount(depth))
        .with_units(amount(rune), amount(0))
}

fn ledger() -> LedgerState {
    LedgerState::new()
        .with_pool(pool("BTC.BTC", 100_00000000, 100_00000000))
        .with_pool(pool("ETH.ETH", 100_00000000, 100_00000000))
}

fn swap_params() -> SwapParams {
    SwapParams {
        transaction_fee: amount(2_000000),
        virtual_multiplier: 2,
        synth: SynthPolicy {
            max_supply_bps: 3300,
            formula: CoverageFormula::DoubledAssetDepth,
            mint_halt_height: 0,
            burn_halt_height: 0,
        },
    }
}

fn leg_params(trade_target: u64) -> LegParams {
    LegParams {
        trade_target: amount(trade_target),
        transaction_fee: amount(2_000000),
        virtual_multiplier: 2,
    }
}

// ============================================================================
// Formula Tests
// ============================================================================

#[test]
fn test_emission_fee_and_slip_reference_swap() {
    let depth = amount(100_00000000);
    let input = amount(5_00000000);

    assert_eq!(calc_asset_emission(&depth, &input, &depth), amount(453_514_739));
    assert_eq!(calc_liquidity_fee(&depth, &input, &depth), amount(22_675_736));
    assert_eq!(calc_swap_slip_bps(&depth, &input), 1025);
}

#[test]
fn test_slip_rounds_half_up() {
    // x(2X+x)/X²: 1·5/4 → 12500 bps, 1·201/10000 → 201 bps
    assert_eq!(calc_swap_slip_bps(&amount(2), &amount(1)), 12_500);
    assert_eq!(calc_swap_slip_bps(&amount(100), &amount(1)), 201);
    // 1·(2·3+1)/9 = 0.7777… → 7777.7 bps rounds to 7778
    assert_eq!(calc_swap_slip_bps(&amount(3), &amount(1)), 7778);
}

// ============================================================================
// Single Leg Tests
// ============================================================================

#[test]
fn test_asset_to_rune_leg_moves_pool() {
    let btc_pool = pool("BTC.BTC", 100_00000000, 100_00000000);
    let source = Coin::new(asset("BTC.BTC"), amount(5_00000000));

    let leg = price_leg(&btc_pool, &source, &Asset::rune(), &leg_params(0)).unwrap();

    assert_eq!(leg.emitted, Coin::new(Asset::rune(), amount(453_514_739)));
    assert_eq!(leg.pool_after.balance_asset, amount(105_00000000));
    assert_eq!(leg.pool_after.balance_rune, amount(100_00000000 - 453_514_739));
    assert_eq!(leg.liquidity_fee_in_rune, amount(22_675_736));
    assert_eq!(leg.pool_before, btc_pool);
}

#[test]
fn test_trade_target_above_emission_is_slippage() {
    let btc_pool = pool("BTC.BTC", 100_00000000, 100_00000000);
    let source = Coin::new(Asset::rune(), amount(5_00000000));

    let err = price_leg(&btc_pool, &source, &asset("BTC.BTC"), &leg_params(453_514_740)).unwrap_err();
    assert_eq!(
        err,
        SettlementError::SlippageExceeded {
            emitted: amount(453_514_739),
            limit: amount(453_514_740),
        }
    );

    // Exactly the emission is acceptable
    assert!(price_leg(&btc_pool, &source, &asset("BTC.BTC"), &leg_params(453_514_739)).is_ok());
}

#[test]
fn test_empty_depth_is_unavailable() {
    let dry = pool("BTC.BTC", 100_00000000, 0);
    let source = Coin::new(Asset::rune(), amount(5_00000000));

    let err = price_leg(&dry, &source, &asset("BTC.BTC"), &leg_params(0)).unwrap_err();
    assert_eq!(
        err,
        SettlementError::PoolUnavailable {
            asset: asset("BTC.BTC"),
            reason: UnavailableReason::EmptyDepth,
        }
    );
}

#[test]
fn test_tiny_input_emits_nothing() {
    let deep = pool("BTC.BTC", 100_00000000, 100_00000000);
    let source = Coin::new(asset("BTC.BTC"), amount(1));

    let err = price_leg(&deep, &source, &Asset::rune(), &leg_params(0)).unwrap_err();
    assert!(matches!(err, SettlementError::ZeroEmission { .. }));
}

// ============================================================================
// Full Swap Tests
// ============================================================================

#[test]
fn test_double_swap_routes_through_rune() {
    let store = ledger();
    let mut snapshot = BatchSnapshot::new(10);
    let source = Coin::new(asset("BTC.BTC"), amount(5_00000000));

    let outcome = execute_swap(
        &mut snapshot,
        &store,
        &source,
        &asset("ETH.ETH"),
        &Amount::from(0u32),
        &swap_params(),
    )
    .unwrap();

    assert_eq!(outcome.legs.len(), 2);
    assert_eq!(outcome.legs[0].emitted, Coin::new(Asset::rune(), amount(453_514_739)));
    assert_eq!(outcome.emitted, Coin::new(asset("ETH.ETH"), amount(415_017_809)));
    assert_eq!(
        outcome.total_liquidity_fee_in_rune(),
        &outcome.legs[0].liquidity_fee_in_rune + &outcome.legs[1].liquidity_fee_in_rune
    );
    assert_eq!(outcome.total_liquidity_fee_in_rune(), amount(22_675_736 + 18_821_669));

    let eth = snapshot.peek_pool(&store, &asset("ETH.ETH")).unwrap();
    assert_eq!(eth.balance_rune, amount(100_00000000 + 453_514_739));
    assert_eq!(eth.balance_asset, amount(100_00000000 - 415_017_809));
    assert_eq!(snapshot.changed_pools().len(), 2);
}

#[test]
fn test_double_swap_checks_second_pool_before_mutating() {
    let store = ledger().with_pool(
        pool("ETH.ETH", 100_00000000, 100_00000000).with_status(PoolStatus::Staged),
    );
    let mut snapshot = BatchSnapshot::new(10);
    let source = Coin::new(asset("BTC.BTC"), amount(5_00000000));

    let err = execute_swap(
        &mut snapshot,
        &store,
        &source,
        &asset("ETH.ETH"),
        &amount(0),
        &swap_params(),
    )
    .unwrap_err();

    assert!(matches!(err, SettlementError::PoolUnavailable { .. }));
    assert!(!snapshot.is_mutated());
    assert!(snapshot.changed_pools().is_empty());
}

#[test]
fn test_missing_pool_rejected() {
    let store = LedgerState::new();
    let mut snapshot = BatchSnapshot::new(10);
    let source = Coin::new(Asset::rune(), amount(5_00000000));

    let err = execute_swap(
        &mut snapshot,
        &store,
        &source,
        &asset("DOGE.DOGE"),
        &amount(0),
        &swap_params(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        SettlementError::PoolUnavailable {
            asset: asset("DOGE.DOGE"),
            reason: UnavailableReason::Missing,
        }
    );
}

#[test]
fn test_same_asset_swap_rejected() {
    let store = ledger();
    let mut snapshot = BatchSnapshot::new(10);
    let source = Coin::new(asset("BTC.BTC"), amount(5_00000000));

    let err = execute_swap(
        &mut snapshot,
        &store,
        &source,
        &asset("BTC.BTC"),
        &amount(0),
        &swap_params(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        SettlementError::from(ValidationError::SameAsset(asset("BTC.BTC")))
    );
}

#[test]
fn test_rune_output_not_above_fee_rejected() {
    let store = ledger();
    let mut snapshot = BatchSnapshot::new(10);
    // 2_000000 BTC into a 100e8 pool emits just under 2_000000 rune
    let source = Coin::new(asset("BTC.BTC"), amount(2_000000));

    let err = execute_swap(
        &mut snapshot,
        &store,
        &source,
        &Asset::rune(),
        &amount(0),
        &swap_params(),
    )
    .unwrap_err();
    assert!(matches!(err, SettlementError::InsufficientFee { .. }));
}

#[test]
fn test_same_pool_twice_sees_sequential_effects() {
    let store = ledger();
    let mut snapshot = BatchSnapshot::new(10);
    let source = Coin::new(Asset::rune(), amount(5_00000000));
    let btc = asset("BTC.BTC");

    let first = execute_swap(&mut snapshot, &store, &source, &btc, &amount(0), &swap_params()).unwrap();
    let second = execute_swap(&mut snapshot, &store, &source, &btc, &amount(0), &swap_params()).unwrap();

    assert!(second.emitted.amount < first.emitted.amount);
    assert_eq!(second.legs[0].pool_before, first.legs[0].pool_after);
}
