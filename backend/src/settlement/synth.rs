//! Synthetic Asset Accounting
//!
//! Synthetics are claims on a pool's rune side. Minting adds the inbound rune
//! to the pool and issues pool units against it; burning pays rune out of the
//! pool and retires the burner's share of units.
//!
//! # Critical Invariants
//!
//! - `synth_units <= lp_units` after every mint and burn
//! - The virtual depth multiplier only ever scales pricing depths; it never
//!   reaches stored balances
//! - Burns of inbound synthetic coins are finalized only after the batch
//!   commits

use crate::core::math::{safe_sub, Amount, MAX_BASIS_POINTS};
use crate::models::asset::{Asset, Coin};
use crate::models::pool::Pool;
use crate::settlement::error::SettlementError;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Denominator used when measuring synthetic supply against a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageFormula {
    /// `supply · 10000 / depth`
    AssetDepth,
    /// `supply · 10000 / (2·depth)`: both sides of the pool back the synthetic
    DoubledAssetDepth,
}

impl CoverageFormula {
    /// Synthetic supply in basis points of the backing depth.
    ///
    /// Returns `None` when the pool has no asset depth.
    pub fn coverage_bps(&self, supply: &Amount, asset_depth: &Amount) -> Option<Amount> {
        if asset_depth.is_zero() {
            return None;
        }
        let numerator = supply * MAX_BASIS_POINTS;
        Some(match self {
            CoverageFormula::AssetDepth => numerator / asset_depth,
            CoverageFormula::DoubledAssetDepth => numerator / (asset_depth * 2u32),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthOperation {
    Mint,
    Burn,
}

impl SynthOperation {
    fn label(&self) -> &'static str {
        match self {
            SynthOperation::Mint => "minting",
            SynthOperation::Burn => "burning",
        }
    }
}

/// Supply cap and halt switches for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthPolicy {
    pub max_supply_bps: u64,
    pub formula: CoverageFormula,
    /// 0 = never halted
    pub mint_halt_height: u64,
    /// 0 = never halted
    pub burn_halt_height: u64,
}

impl SynthPolicy {
    pub fn check_enabled(&self, operation: SynthOperation, height: u64) -> Result<(), SettlementError> {
        let halt_height = match operation {
            SynthOperation::Mint => self.mint_halt_height,
            SynthOperation::Burn => self.burn_halt_height,
        };
        if halt_height > 0 && height > halt_height {
            return Err(SettlementError::SynthsHalted {
                operation: operation.label(),
                halt_height,
            });
        }
        Ok(())
    }

    /// Reject a mint that would push supply above the cap.
    pub fn check_supply_cap(
        &self,
        pool: &Pool,
        synth: &Asset,
        supply_after: &Amount,
    ) -> Result<(), SettlementError> {
        let cap = Amount::from(self.max_supply_bps);
        match self.formula.coverage_bps(supply_after, &pool.balance_asset) {
            Some(coverage) if coverage <= cap => Ok(()),
            coverage => {
                let coverage_bps = coverage.unwrap_or_else(|| supply_after * MAX_BASIS_POINTS);
                warn!(
                    asset = %synth,
                    coverage_bps = %coverage_bps,
                    cap_bps = self.max_supply_bps,
                    "synthetic supply cap reached"
                );
                Err(SettlementError::SynthSupplyCapExceeded {
                    asset: synth.clone(),
                    coverage_bps,
                    cap_bps: self.max_supply_bps,
                })
            }
        }
    }
}

/// Units issued for `rune_in` added with no asset contribution.
///
/// Single-sided provision: `P·r / (2·(R+r))`, or `r` for a pool without
/// depth or units.
pub fn mint_units(pool: &Pool, rune_in: &Amount) -> Amount {
    if pool.is_empty() || pool.lp_units.is_zero() {
        return rune_in.clone();
    }
    let denominator = (&pool.balance_rune + rune_in) * 2u32;
    &pool.lp_units * rune_in / denominator
}

/// Pool with `units` minted to synthetic holders.
pub fn apply_mint(pool: &Pool, units: &Amount) -> Pool {
    let mut minted = pool.clone();
    minted.lp_units = &pool.lp_units + units;
    minted.synth_units = &pool.synth_units + units;
    minted
}

/// Units retired when `burned` synthetics leave a supply of `supply`.
pub fn burn_units(pool: &Pool, burned: &Coin, supply: &Amount) -> Result<Amount, SettlementError> {
    if supply.is_zero() || burned.amount > *supply {
        return Err(SettlementError::InsufficientBalance {
            asset: burned.asset.clone(),
            requested: burned.amount.clone(),
            available: supply.clone(),
        });
    }
    Ok(&pool.synth_units * &burned.amount / supply)
}

/// Pool with `units` retired from both unit counters.
pub fn apply_burn(pool: &Pool, units: &Amount) -> Pool {
    let mut burned = pool.clone();
    burned.lp_units = safe_sub(&pool.lp_units, units);
    burned.synth_units = safe_sub(&pool.synth_units, units);
    burned
}
