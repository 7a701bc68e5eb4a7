//! Synthetic Asset Accounting Tests
//!
//! Mint and burn pricing with the virtual depth multiplier, unit issuance,
//! the supply cap under both coverage formulas, halt switches, and the
//! deferred supply changes applied at commit.

use liquidity_settlement_core::core::math::{amount, Amount};
use liquidity_settlement_core::models::outbound::OutboundModule;
use liquidity_settlement_core::models::{
    Address, Asset, Chain, Coin, LedgerState, Pool, PoolStatus, SettlementEvent, TxId, TxOutItem,
};
use liquidity_settlement_core::models::event::SupplyChange;
use liquidity_settlement_core::settlement::swap::{execute_swap, SwapParams};
use liquidity_settlement_core::settlement::synth::{
    apply_burn, burn_units, mint_units, CoverageFormula, SynthPolicy,
};
use liquidity_settlement_core::settlement::{BatchSnapshot, SettlementError};
use liquidity_settlement_core::store::SupplyLedger;

// ============================================================================
// Test Helpers
// ============================================================================

fn btc() -> Asset {
    "BTC.BTC".parse().unwrap()
}

fn btc_synth() -> Asset {
    "BTC/BTC".parse().unwrap()
}

fn btc_pool(synth_units: u64) -> Pool {
    Pool::new(btc())
        .with_balances(amount(100_00000000), amount(100_00000000))
        .with_units(amount(100_00000000), amount(synth_units))
}

fn params(formula: CoverageFormula) -> SwapParams {
    SwapParams {
        transaction_fee: amount(2_000000),
        virtual_multiplier: 2,
        synth: SynthPolicy {
            max_supply_bps: 3300,
            formula,
            mint_halt_height: 0,
            burn_halt_height: 0,
        },
    }
}

fn mint(
    store: &LedgerState,
    snapshot: &mut BatchSnapshot,
    swap_params: &SwapParams,
) -> Result<Coin, SettlementError> {
    let source = Coin::new(Asset::rune(), amount(5_00000000));
    execute_swap(snapshot, store, &source, &btc_synth(), &Amount::from(0u32), swap_params)
        .map(|outcome| outcome.emitted)
}

// ============================================================================
// Mint
// ============================================================================

#[test]
fn test_mint_prices_against_virtual_depth_and_adds_rune_only() {
    let store = LedgerState::new().with_pool(btc_pool(0));
    let mut snapshot = BatchSnapshot::new(10);

    let emitted = mint(&store, &mut snapshot, &params(CoverageFormula::DoubledAssetDepth)).unwrap();
    assert_eq!(emitted, Coin::new(btc_synth(), amount(475_907_198)));

    let pool = snapshot.peek_pool(&store, &btc()).unwrap();
    assert_eq!(pool.balance_rune, amount(105_00000000));
    assert_eq!(pool.balance_asset, amount(100_00000000));
    assert_eq!(pool.synth_units, amount(238_095_238));
    assert_eq!(pool.lp_units, amount(100_00000000 + 238_095_238));
}

#[test]
fn test_mint_units_single_sided() {
    let pool = btc_pool(0);
    assert_eq!(mint_units(&pool, &amount(5_00000000)), amount(238_095_238));

    let fresh = Pool::new(btc());
    assert_eq!(mint_units(&fresh, &amount(7)), amount(7));
}

#[test]
fn test_supply_cap_rejects_mint() {
    let store = LedgerState::new()
        .with_pool(btc_pool(0))
        .with_synth_supply(btc_synth(), amount(66_00000000));
    let mut snapshot = BatchSnapshot::new(10);

    let err = mint(&store, &mut snapshot, &params(CoverageFormula::DoubledAssetDepth)).unwrap_err();
    assert_eq!(
        err,
        SettlementError::SynthSupplyCapExceeded {
            asset: btc_synth(),
            coverage_bps: amount(3537),
            cap_bps: 3300,
        }
    );
    assert!(snapshot.changed_pools().is_empty());
}

#[test]
fn test_coverage_formula_changes_cap_outcome() {
    let store = LedgerState::new()
        .with_pool(btc_pool(0))
        .with_synth_supply(btc_synth(), amount(30_00000000));

    let mut doubled = BatchSnapshot::new(10);
    assert!(mint(&store, &mut doubled, &params(CoverageFormula::DoubledAssetDepth)).is_ok());

    let mut single = BatchSnapshot::new(10);
    let err = mint(&store, &mut single, &params(CoverageFormula::AssetDepth)).unwrap_err();
    assert!(matches!(
        err,
        SettlementError::SynthSupplyCapExceeded { ref coverage_bps, .. } if *coverage_bps == amount(3475)
    ));
}

#[test]
fn test_mint_halt_switch() {
    let store = LedgerState::new().with_pool(btc_pool(0));
    let mut halted = params(CoverageFormula::DoubledAssetDepth);
    halted.synth.mint_halt_height = 5;

    let err = mint(&store, &mut BatchSnapshot::new(10), &halted).unwrap_err();
    assert_eq!(
        err,
        SettlementError::SynthsHalted {
            operation: "minting",
            halt_height: 5,
        }
    );

    // Not yet past the halt height
    assert!(mint(&store, &mut BatchSnapshot::new(5), &halted).is_ok());
}

#[test]
fn test_second_mint_in_batch_sees_first_mint_supply() {
    let store = LedgerState::new()
        .with_pool(btc_pool(0))
        .with_synth_supply(btc_synth(), amount(60_00000000));
    let mut snapshot = BatchSnapshot::new(10);
    let swap_params = params(CoverageFormula::DoubledAssetDepth);

    // 3237 bps after the first mint
    let first = mint(&store, &mut snapshot, &swap_params).unwrap();
    assert_eq!(first.amount, amount(475_907_198));
    assert_eq!(
        snapshot.synth_supply(&store, &btc_synth()),
        amount(60_00000000 + 475_907_198)
    );

    let err = mint(&store, &mut snapshot, &swap_params).unwrap_err();
    assert_eq!(
        err,
        SettlementError::SynthSupplyCapExceeded {
            asset: btc_synth(),
            coverage_bps: amount(3465),
            cap_bps: 3300,
        }
    );
}

// ============================================================================
// Burn
// ============================================================================

#[test]
fn test_burn_pays_rune_and_retires_units() {
    let store = LedgerState::new()
        .with_pool(btc_pool(5_00000000))
        .with_synth_supply(btc_synth(), amount(10_00000000));
    let mut snapshot = BatchSnapshot::new(10);
    let source = Coin::new(btc_synth(), amount(1_00000000));

    let outcome = execute_swap(
        &mut snapshot,
        &store,
        &source,
        &Asset::rune(),
        &amount(0),
        &params(CoverageFormula::DoubledAssetDepth),
    )
    .unwrap();

    assert_eq!(outcome.emitted, Coin::new(Asset::rune(), amount(99_007_450)));
    let pool = snapshot.peek_pool(&store, &btc()).unwrap();
    assert_eq!(pool.balance_rune, amount(100_00000000 - 99_007_450));
    assert_eq!(pool.balance_asset, amount(100_00000000));
    assert_eq!(pool.synth_units, amount(4_50000000));
    assert_eq!(pool.lp_units, amount(99_50000000));

    // Burn is queued, not yet applied to the ledger
    assert_eq!(snapshot.burns(), &[source]);
    assert_eq!(snapshot.synth_supply(&store, &btc_synth()), amount(9_00000000));
    assert_eq!(store.synth_supply(&btc_synth()), amount(10_00000000));
}

#[test]
fn test_burn_allowed_against_unavailable_pool() {
    let store = LedgerState::new()
        .with_pool(btc_pool(5_00000000).with_status(PoolStatus::Staged))
        .with_synth_supply(btc_synth(), amount(10_00000000));
    let mut snapshot = BatchSnapshot::new(10);

    let outcome = execute_swap(
        &mut snapshot,
        &store,
        &Coin::new(btc_synth(), amount(1_00000000)),
        &Asset::rune(),
        &amount(0),
        &params(CoverageFormula::DoubledAssetDepth),
    );
    assert!(outcome.is_ok());
}

#[test]
fn test_burn_after_mint_in_same_batch_retires_minted_units() {
    let store = LedgerState::new().with_pool(btc_pool(0));
    let mut snapshot = BatchSnapshot::new(10);
    let swap_params = params(CoverageFormula::DoubledAssetDepth);

    let minted = mint(&store, &mut snapshot, &swap_params).unwrap();
    assert_eq!(
        snapshot.peek_pool(&store, &btc()).unwrap().synth_units,
        amount(238_095_238)
    );

    execute_swap(&mut snapshot, &store, &minted, &Asset::rune(), &amount(0), &swap_params).unwrap();

    let pool = snapshot.peek_pool(&store, &btc()).unwrap();
    assert_eq!(pool.synth_units, amount(0));
    assert_eq!(pool.lp_units, amount(100_00000000));
    assert_eq!(snapshot.synth_supply(&store, &btc_synth()), amount(0));
}

#[test]
fn test_burn_beyond_supply_rejected() {
    let pool = btc_pool(5_00000000);
    let err = burn_units(&pool, &Coin::new(btc_synth(), amount(10)), &amount(9)).unwrap_err();
    assert!(matches!(err, SettlementError::InsufficientBalance { .. }));

    let units = burn_units(&pool, &Coin::new(btc_synth(), amount(1)), &amount(10)).unwrap();
    assert_eq!(units, amount(5_00000000 / 10));
    let burned = apply_burn(&pool, &units);
    assert!(burned.synth_units <= burned.lp_units);
}

// ============================================================================
// Commit
// ============================================================================

#[test]
fn test_commit_mints_outbound_and_finalizes_burns() {
    let mut ledger = LedgerState::new()
        .with_pool(btc_pool(5_00000000))
        .with_synth_supply(btc_synth(), amount(10_00000000));
    let mut snapshot = BatchSnapshot::new(42);

    snapshot.queue_burn(Coin::new(btc_synth(), amount(3_00000000)));
    let mut minted = TxOutItem::new(
        Chain::Thor,
        Address::new("thor1holder"),
        Coin::new(btc_synth(), amount(2_00000000)),
        TxId::new("mint-origin"),
    )
    .with_module(OutboundModule::Mint);
    minted.scheduled_height = 42;
    snapshot.push_outbound(minted);

    let committed = snapshot.commit(&mut ledger).unwrap();

    assert_eq!(ledger.synth_supply(&btc_synth()), amount(9_00000000));
    let changes: Vec<SupplyChange> = committed
        .events
        .iter()
        .filter_map(|event| match event {
            SettlementEvent::MintBurn { change, .. } => Some(*change),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![SupplyChange::Mint, SupplyChange::Burn]);
}
