//! Amount arithmetic
//!
//! Every balance, fee and unit count in the settlement core is an unsigned
//! arbitrary-precision integer expressed in 1e-8 units of a whole coin.
//!
//! # Critical Invariants
//!
//! - **Never negative**: subtraction saturates at zero (`safe_sub`)
//! - **Floor division**: every quotient truncates toward zero
//! - **No division by zero**: helpers return zero instead of panicking

use num_bigint::BigUint;
use num_traits::{CheckedSub, ToPrimitive, Zero};

/// Unsigned amount in native (1e-8) resolution.
pub type Amount = BigUint;

/// One whole coin in native units.
pub const ONE: u64 = 100_000_000;

/// Decimal places of the native unit.
pub const NATIVE_DECIMALS: u32 = 8;

/// Basis points in 100%.
pub const MAX_BASIS_POINTS: u64 = 10_000;

/// Build an amount from a machine integer.
pub fn amount(value: u64) -> Amount {
    Amount::from(value)
}

/// `a - b`, or zero when `b > a`.
pub fn safe_sub(a: &Amount, b: &Amount) -> Amount {
    a.checked_sub(b).unwrap_or_else(Amount::zero)
}

/// `allocation * part / total`, or zero when `total` is zero.
///
/// # Example
///
/// ```rust
/// use liquidity_settlement_core::core::math::{amount, get_share};
///
/// assert_eq!(get_share(&amount(1), &amount(4), &amount(100)), amount(25));
/// assert_eq!(get_share(&amount(1), &amount(0), &amount(100)), amount(0));
/// ```
pub fn get_share(part: &Amount, total: &Amount, allocation: &Amount) -> Amount {
    if total.is_zero() {
        return Amount::zero();
    }
    allocation * part / total
}

/// Floor `value` to the resolution of an asset with `decimals` on-chain decimals.
///
/// Assets with 0 or >= 8 decimals are kept at native resolution.
///
/// # Example
///
/// ```rust
/// use liquidity_settlement_core::core::math::{amount, round_to_decimal};
///
/// assert_eq!(round_to_decimal(&amount(123_456_789), 6), amount(123_456_700));
/// assert_eq!(round_to_decimal(&amount(123_456_789), 8), amount(123_456_789));
/// ```
pub fn round_to_decimal(value: &Amount, decimals: u32) -> Amount {
    if decimals == 0 || decimals >= NATIVE_DECIMALS {
        return value.clone();
    }
    let scale = Amount::from(10u32).pow(NATIVE_DECIMALS - decimals);
    value / &scale * &scale
}

/// `num / den` in basis points, rounded half-up. `None` when `den` is zero.
pub fn ratio_bps_half_up(num: &Amount, den: &Amount) -> Option<u64> {
    if den.is_zero() {
        return None;
    }
    let scaled = num * MAX_BASIS_POINTS * 2u32 + den;
    let bps = scaled / (den * 2u32);
    Some(saturating_u64(&bps))
}

/// Narrow an amount to `u64`, saturating at `u64::MAX`.
pub fn saturating_u64(value: &Amount) -> u64 {
    value.to_u64().unwrap_or(u64::MAX)
}

/// Serde adapter: amounts travel as decimal strings so JSON consumers never
/// lose precision.
pub mod amount_serde {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<Amount>().map_err(serde::de::Error::custom)
    }
}
