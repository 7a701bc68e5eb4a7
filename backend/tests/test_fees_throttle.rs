//! Fee, Gas and Throttle Tests
//!
//! Outbound fee deduction against pool prices, gas ceilings from observed
//! network fees, and the congestion throttle's window accounting.

use liquidity_settlement_core::core::math::amount;
use liquidity_settlement_core::models::{
    Address, Asset, Chain, Coin, LedgerState, Memo, NetworkFee, Pool, TxId, TxOutItem,
};
use liquidity_settlement_core::settlement::fees::{apply_outbound_fee, resolve_gas};
use liquidity_settlement_core::settlement::snapshot::BatchSnapshot;
use liquidity_settlement_core::settlement::throttle::{
    delay_blocks, schedule, window_for, ThrottleParams,
};
use liquidity_settlement_core::settlement::SettlementError;
use liquidity_settlement_core::store::OutboundQueue;

const FEE: u64 = 2_000000;

fn btc() -> Asset {
    "BTC.BTC".parse().unwrap()
}

/// 2 rune per BTC
fn btc_pool() -> Pool {
    Pool::new(btc())
        .with_balances(amount(100_00000000), amount(50_00000000))
        .with_units(amount(100_00000000), amount(0))
}

fn outbound(coin: Coin) -> TxOutItem {
    TxOutItem::new(Chain::Btc, Address::new("bc1qdest"), coin, TxId::new("in-1"))
}

fn out_memo() -> Memo {
    Memo::Outbound {
        in_hash: TxId::new("in-1"),
    }
}

// ============================================================================
// Fee deduction
// ============================================================================

#[test]
fn test_asset_fee_moves_rune_from_pool_to_reserve() {
    let outcome = apply_outbound_fee(
        outbound(Coin::new(btc(), amount(1_00000000))),
        &out_memo(),
        Some(&btc_pool()),
        &amount(FEE),
    )
    .unwrap();

    assert_eq!(outcome.asset_fee, amount(1_000000));
    assert_eq!(outcome.item.coin.amount, amount(99_000000));
    assert_eq!(outcome.reserve_credit, amount(FEE));

    let pool = outcome.pool.unwrap();
    assert_eq!(pool.balance_asset, amount(50_01000000));
    assert_eq!(pool.balance_rune, amount(99_98000000));
}

#[test]
fn test_synthetic_fee_is_not_credited_to_pool_asset() {
    let outcome = apply_outbound_fee(
        outbound(Coin::new(btc().synthetic(), amount(1_00000000))),
        &out_memo(),
        Some(&btc_pool()),
        &amount(FEE),
    )
    .unwrap();

    assert_eq!(outcome.item.coin.amount, amount(99_000000));
    let pool = outcome.pool.unwrap();
    assert_eq!(pool.balance_asset, amount(50_00000000));
    assert_eq!(pool.balance_rune, amount(99_98000000));
}

#[test]
fn test_rune_fee_goes_straight_to_reserve() {
    let outcome = apply_outbound_fee(
        outbound(Coin::new(Asset::rune(), amount(10_000000))),
        &out_memo(),
        None,
        &amount(FEE),
    )
    .unwrap();

    assert_eq!(outcome.item.coin.amount, amount(8_000000));
    assert_eq!(outcome.reserve_credit, amount(FEE));
    assert!(outcome.pool.is_none());
}

#[test]
fn test_reserve_credit_capped_at_pool_rune() {
    let shallow = Pool::new(btc())
        .with_balances(amount(1_000000), amount(1_00000000))
        .with_units(amount(1_000000), amount(0));
    let outcome = apply_outbound_fee(
        outbound(Coin::new(btc(), amount(5_00000000))),
        &out_memo(),
        Some(&shallow),
        &amount(FEE),
    )
    .unwrap();

    assert_eq!(outcome.asset_fee, amount(2_00000000));
    assert_eq!(outcome.reserve_credit, amount(1_000000));
    assert_eq!(outcome.pool.unwrap().balance_rune, amount(0));
}

#[test]
fn test_asset_fee_floored_to_pool_decimals() {
    let pool = Pool::new(btc())
        .with_balances(amount(100_00000000), amount(33_33333333))
        .with_units(amount(100_00000000), amount(0))
        .with_decimals(6);
    let outcome = apply_outbound_fee(
        outbound(Coin::new(btc(), amount(1_00000000))),
        &out_memo(),
        Some(&pool),
        &amount(FEE),
    )
    .unwrap();

    // 2e6 · 33.33e8 / 100e8 = 666666, floored to hundreds
    assert_eq!(outcome.asset_fee, amount(666_600));
}

#[test]
fn test_fee_swallowing_outbound_is_rejected() {
    let err = apply_outbound_fee(
        outbound(Coin::new(btc(), amount(500_000))),
        &out_memo(),
        Some(&btc_pool()),
        &amount(FEE),
    )
    .unwrap_err();
    assert_eq!(
        err,
        SettlementError::InsufficientFee {
            asset: btc(),
            amount: amount(500_000),
            fee: amount(FEE),
        }
    );
}

#[test]
fn test_asset_coin_without_pool_is_charged_nothing() {
    let outcome = apply_outbound_fee(
        outbound(Coin::new(btc(), amount(1_00000000))),
        &out_memo(),
        None,
        &amount(FEE),
    )
    .unwrap();

    assert_eq!(outcome.item.coin.amount, amount(1_00000000));
    assert_eq!(outcome.asset_fee, amount(0));
    assert_eq!(outcome.reserve_credit, amount(0));
    assert!(outcome.pool.is_none());
}

#[test]
fn test_yggdrasil_return_may_carry_empty_coin() {
    let outcome = apply_outbound_fee(
        outbound(Coin::new(btc(), amount(0))),
        &Memo::YggdrasilReturn { height: 5 },
        None,
        &amount(FEE),
    )
    .unwrap();
    assert_eq!(outcome.item.coin.amount, amount(0));
    assert_eq!(outcome.reserve_credit, amount(0));
}

// ============================================================================
// Gas
// ============================================================================

#[test]
fn test_gas_ceiling_scales_with_multiplier() {
    let ledger = LedgerState::new().with_network_fee(NetworkFee {
        chain: Chain::Eth,
        transaction_size: 80_000,
        transaction_rate: 30,
    });

    let gas = resolve_gas(&ledger, Chain::Eth, 15_000).unwrap();
    assert_eq!(
        gas.max_gas,
        Some(Coin::new("ETH.ETH".parse().unwrap(), amount(3_600_000)))
    );
    assert_eq!(gas.gas_rate, 30);

    let exact = resolve_gas(&ledger, Chain::Eth, 10_000).unwrap();
    assert_eq!(exact.max_gas.unwrap().amount, amount(2_400_000));
}

#[test]
fn test_zero_rate_counts_as_unobserved() {
    let ledger = LedgerState::new().with_network_fee(NetworkFee {
        chain: Chain::Ltc,
        transaction_size: 250,
        transaction_rate: 0,
    });
    assert_eq!(
        resolve_gas(&ledger, Chain::Ltc, 15_000),
        Err(SettlementError::NetworkFeeUnavailable(Chain::Ltc))
    );
}

// ============================================================================
// Throttle
// ============================================================================

fn throttle() -> ThrottleParams {
    ThrottleParams {
        volume_threshold: amount(10_00000000),
        delay_rate: 720,
        max_offset: 720,
        window_blocks: 100,
    }
}

#[test]
fn test_delay_proportional_to_value_once_over_threshold() {
    let params = throttle();
    assert_eq!(delay_blocks(&amount(5_00000000), &amount(5_00000000), &params), 0);
    // 5e8 · 720 / 10e8
    assert_eq!(delay_blocks(&amount(5_00000000), &amount(6_00000000), &params), 360);
    assert_eq!(delay_blocks(&amount(1_000_00000000), &amount(0), &params), 720);
}

#[test]
fn test_window_volume_from_ledger_counts_toward_threshold() {
    let mut ledger = LedgerState::new();
    let window = window_for(1_050, 100);
    ledger.set_window_volume(window, amount(9_00000000));

    let mut snapshot = BatchSnapshot::new(1_050);
    let height = schedule(&mut snapshot, &ledger, &amount(2_00000000), &throttle());
    assert_eq!(height, 1_050 + 144);

    snapshot.commit(&mut ledger).unwrap();
    assert_eq!(ledger.window_volume(window), amount(11_00000000));
}

#[test]
fn test_new_window_starts_empty() {
    let mut ledger = LedgerState::new();
    ledger.set_window_volume(window_for(1_050, 100), amount(100_00000000));

    let mut snapshot = BatchSnapshot::new(1_100);
    assert_eq!(schedule(&mut snapshot, &ledger, &amount(2_00000000), &throttle()), 1_100);
}

#[test]
fn test_dropped_snapshot_leaves_windows_untouched() {
    let ledger = LedgerState::new();
    {
        let mut snapshot = BatchSnapshot::new(500);
        schedule(&mut snapshot, &ledger, &amount(50_00000000), &throttle());
    }
    assert!(ledger.throttle_windows().is_empty());
}
