//! Property Tests
//!
//! Invariants of the pricing, fee, throttle and vault selection arithmetic
//! over randomly generated pools and amounts.

use liquidity_settlement_core::core::math::{amount, Amount};
use liquidity_settlement_core::models::{
    Address, Asset, Chain, Coin, LedgerState, Memo, Pool, TxId, TxOutItem, Vault, VaultStatus,
};
use liquidity_settlement_core::settlement::fees::apply_outbound_fee;
use liquidity_settlement_core::settlement::snapshot::BatchSnapshot;
use liquidity_settlement_core::settlement::swap::{
    calc_asset_emission, calc_liquidity_fee, calc_swap_slip_bps,
};
use liquidity_settlement_core::settlement::throttle::{delay_blocks, ThrottleParams};
use liquidity_settlement_core::settlement::vault_select::{
    select_funding, FundingRequest, SelectionPolicy, VaultSortOrder,
};
use liquidity_settlement_core::settlement::SettlementError;
use num_traits::Zero;
use proptest::prelude::*;

const MAX_DEPTH: u64 = 1_000_000_00000000;

fn btc() -> Asset {
    "BTC.BTC".parse().unwrap()
}

// ============================================================================
// Swap pricing
// ============================================================================

proptest! {
    #[test]
    fn prop_emission_below_output_depth(
        x in 1u64..MAX_DEPTH,
        depth_in in 1u64..MAX_DEPTH,
        depth_out in 1u64..MAX_DEPTH,
    ) {
        let emitted = calc_asset_emission(&amount(depth_in), &amount(x), &amount(depth_out));
        prop_assert!(emitted < amount(depth_out));
    }

    #[test]
    fn prop_emission_monotonic_in_input(
        x in 1u64..MAX_DEPTH / 2,
        extra in 0u64..MAX_DEPTH / 2,
        depth_in in 1u64..MAX_DEPTH,
        depth_out in 1u64..MAX_DEPTH,
    ) {
        // Holds while the input stays within the pool depth
        prop_assume!(x + extra <= depth_in);
        let smaller = calc_asset_emission(&amount(depth_in), &amount(x), &amount(depth_out));
        let larger = calc_asset_emission(&amount(depth_in), &amount(x + extra), &amount(depth_out));
        prop_assert!(smaller <= larger);
    }

    #[test]
    fn prop_fee_bounded_by_emission_within_depth(
        x in 1u64..MAX_DEPTH,
        depth_in in 1u64..MAX_DEPTH,
        depth_out in 1u64..MAX_DEPTH,
    ) {
        prop_assume!(x <= depth_in);
        let emitted = calc_asset_emission(&amount(depth_in), &amount(x), &amount(depth_out));
        let fee = calc_liquidity_fee(&amount(depth_in), &amount(x), &amount(depth_out));
        prop_assert!(fee <= emitted);
    }

    #[test]
    fn prop_round_trip_never_gains(
        rune_in in 1u64..10_000_00000000,
        rune_depth in 1_00000000u64..MAX_DEPTH,
        asset_depth in 1_00000000u64..MAX_DEPTH,
    ) {
        let out = calc_asset_emission(&amount(rune_depth), &amount(rune_in), &amount(asset_depth));
        prop_assume!(!out.is_zero());
        let asset_after = amount(asset_depth) - &out;
        let rune_after = amount(rune_depth) + amount(rune_in);
        let back = calc_asset_emission(&asset_after, &out, &rune_after);
        prop_assert!(back <= amount(rune_in));
    }

    #[test]
    fn prop_slip_never_exceeds_full_range(
        x in 0u64..MAX_DEPTH,
        depth_in in 1u64..MAX_DEPTH,
    ) {
        prop_assert!(calc_swap_slip_bps(&amount(depth_in), &amount(x)) <= 10_000);
    }
}

// ============================================================================
// Outbound fee
// ============================================================================

proptest! {
    #[test]
    fn prop_fee_conserves_coin(
        coin_amount in 1u64..100_00000000,
        rune_depth in 1u64..MAX_DEPTH,
        asset_depth in 1u64..MAX_DEPTH,
        fee in 0u64..10_00000000,
    ) {
        let pool = Pool::new(btc())
            .with_balances(amount(rune_depth), amount(asset_depth))
            .with_units(amount(rune_depth), amount(0));
        let item = TxOutItem::new(
            Chain::Btc,
            Address::new("bc1qdest"),
            Coin::new(btc(), amount(coin_amount)),
            TxId::new("in"),
        );
        let memo = Memo::Outbound { in_hash: TxId::new("in") };

        match apply_outbound_fee(item, &memo, Some(&pool), &amount(fee)) {
            Ok(outcome) => {
                prop_assert_eq!(&outcome.item.coin.amount + &outcome.asset_fee, amount(coin_amount));
                prop_assert!(outcome.reserve_credit <= amount(fee));
                prop_assert!(outcome.reserve_credit <= amount(rune_depth));
                let updated = outcome.pool.unwrap();
                prop_assert_eq!(updated.balance_asset, amount(asset_depth) + &outcome.asset_fee);
            }
            Err(err) => {
                let is_insufficient = matches!(err, SettlementError::InsufficientFee { .. });
                prop_assert!(is_insufficient);
            }
        }
    }
}

// ============================================================================
// Throttle
// ============================================================================

fn throttle(threshold: u64, max_offset: u64) -> ThrottleParams {
    ThrottleParams {
        volume_threshold: amount(threshold),
        delay_rate: 720,
        max_offset,
        window_blocks: 100,
    }
}

proptest! {
    #[test]
    fn prop_delay_bounded_by_max_offset(
        value in 0u64..MAX_DEPTH,
        total in 0u64..MAX_DEPTH,
        threshold in 1u64..MAX_DEPTH,
        max_offset in 0u64..10_000,
    ) {
        let delay = delay_blocks(&amount(value), &amount(total), &throttle(threshold, max_offset));
        prop_assert!(delay <= max_offset);
    }

    #[test]
    fn prop_delay_zero_within_threshold(
        value in 0u64..MAX_DEPTH,
        total in 0u64..MAX_DEPTH,
        threshold in 1u64..MAX_DEPTH,
    ) {
        prop_assume!(value + total <= threshold);
        prop_assert_eq!(delay_blocks(&amount(value), &amount(total), &throttle(threshold, 720)), 0);
    }

    #[test]
    fn prop_delay_monotonic_in_value(
        value in 0u64..MAX_DEPTH,
        extra in 0u64..MAX_DEPTH,
        total in 0u64..MAX_DEPTH,
        threshold in 1u64..MAX_DEPTH,
    ) {
        let params = throttle(threshold, 720);
        let smaller = delay_blocks(&amount(value), &amount(total), &params);
        let larger = delay_blocks(&amount(value + extra), &amount(total), &params);
        prop_assert!(smaller <= larger);
    }
}

// ============================================================================
// Vault selection
// ============================================================================

proptest! {
    #[test]
    fn prop_allocations_cover_request_exactly_or_fail(
        balances in prop::collection::vec(0u64..10_00000000, 1..6),
        requested in 1u64..30_00000000,
    ) {
        let mut ledger = LedgerState::new();
        for (i, balance) in balances.iter().enumerate() {
            let key = format!("vault-{}", i);
            let vault = Vault::pooled(&key, VaultStatus::Active)
                .with_coin(Coin::new(btc(), amount(*balance)))
                .with_address(Chain::Btc, Address::new(format!("bc1q{}", key)));
            ledger = ledger.with_vault(vault);
        }
        let coin = Coin::new(btc(), amount(requested));
        let request = FundingRequest {
            coin: &coin,
            chain: Chain::Btc,
            to_address: &Address::new("bc1qdest"),
            in_hash: &TxId::new("in"),
            max_gas: &Amount::zero(),
            asset_fee: &Amount::zero(),
        };
        let policy = SelectionPolicy {
            order: VaultSortOrder::MostAvailableFirst,
            signing_period: 300,
            max_offset: 720,
        };
        let total: u64 = balances.iter().sum();

        match select_funding(&ledger, &BatchSnapshot::new(1_000), &request, None, &policy) {
            Ok(allocations) => {
                let sum = allocations
                    .iter()
                    .fold(Amount::zero(), |acc, allocation| acc + &allocation.amount);
                prop_assert_eq!(sum, amount(requested));
                prop_assert!(allocations.iter().all(|a| !a.amount.is_zero()));
            }
            Err(err) => {
                prop_assert!(total < requested);
                let is_insufficient = matches!(err, SettlementError::InsufficientBalance { .. });
                prop_assert!(is_insufficient);
            }
        }
    }
}
