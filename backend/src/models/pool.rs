//! Pool ledger
//!
//! One AMM market between the settlement asset and a layer-1 asset.
//!
//! # Critical Invariants
//!
//! 1. Balances never go negative (unsigned amounts, saturating subtraction)
//! 2. `synth_units <= lp_units`
//! 3. Status gates swaps into and out of the pool
//!
//! Pools are values: settlement code takes a `&Pool` and produces a new `Pool`
//! rather than mutating stored state in place.

use crate::core::math::{amount_serde, get_share, round_to_decimal, Amount};
use crate::models::asset::Asset;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    Available,
    Staged,
    Suspended,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolStatus::Available => f.write_str("Available"),
            PoolStatus::Staged => f.write_str("Staged"),
            PoolStatus::Suspended => f.write_str("Suspended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub asset: Asset,
    #[serde(with = "amount_serde")]
    pub balance_rune: Amount,
    #[serde(with = "amount_serde")]
    pub balance_asset: Amount,
    #[serde(with = "amount_serde")]
    pub lp_units: Amount,
    #[serde(with = "amount_serde")]
    pub synth_units: Amount,
    pub status: PoolStatus,
    /// On-chain decimals of the asset (0 = native resolution)
    pub decimals: u32,
}

impl Pool {
    /// Empty, available pool for `asset` (always keyed by the layer-1 asset).
    pub fn new(asset: Asset) -> Self {
        Self {
            asset: asset.layer1(),
            balance_rune: Amount::zero(),
            balance_asset: Amount::zero(),
            lp_units: Amount::zero(),
            synth_units: Amount::zero(),
            status: PoolStatus::Available,
            decimals: 0,
        }
    }

    pub fn with_balances(mut self, rune: Amount, asset: Amount) -> Self {
        self.balance_rune = rune;
        self.balance_asset = asset;
        self
    }

    pub fn with_units(mut self, lp_units: Amount, synth_units: Amount) -> Self {
        self.lp_units = lp_units;
        self.synth_units = synth_units;
        self
    }

    pub fn with_status(mut self, status: PoolStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == PoolStatus::Available
    }

    /// Either side has no depth.
    pub fn is_empty(&self) -> bool {
        self.balance_rune.is_zero() || self.balance_asset.is_zero()
    }

    /// Rune value of `amt` units of the pool asset at the current price.
    pub fn asset_value_in_rune(&self, amt: &Amount) -> Amount {
        if self.is_empty() {
            return Amount::zero();
        }
        get_share(&self.balance_rune, &self.balance_asset, amt)
    }

    /// Asset value of `amt` rune at the current price, floored to the pool's decimals.
    pub fn rune_value_in_asset(&self, amt: &Amount) -> Amount {
        if self.is_empty() {
            return Amount::zero();
        }
        let value = get_share(&self.balance_asset, &self.balance_rune, amt);
        round_to_decimal(&value, self.decimals)
    }
}
