//! Protocol constants
//!
//! Compiled-in defaults for every tunable the settlement core reads. A
//! [`ConstantValues`] table may override defaults from configuration, and the
//! batch parameter resolver layers live governance overrides on top.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Named protocol constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstantName {
    /// Rune charged per outbound instruction
    OutboundTransactionFee,
    /// Lookback window (blocks) for unsigned outbound reservations
    SigningTransactionPeriod,
    /// Depth multiplier applied to synthetic mint/burn pricing
    VirtualMultSynths,
    /// Synthetic supply cap, basis points of twice the asset depth
    MaxSynthPerAssetDepth,
    /// Largest scheduling delay the throttle may apply
    MaxTxOutOffset,
    /// Delay blocks applied per threshold's worth of outbound value
    TxOutDelayRate,
    /// Rune value per throttle window before delays kick in
    OutboundVolumeThreshold,
    /// Blocks per throttle accounting window
    ThrottleWindowBlocks,
    /// Max-gas multiplier over the observed network fee
    GasMultiplierBasisPoints,
    /// Height after which synthetic minting is disabled (0 = never)
    MintSynthsHaltHeight,
    /// Height after which synthetic burning is disabled (0 = never)
    BurnSynthsHaltHeight,
}

impl ConstantName {
    pub const ALL: [ConstantName; 11] = [
        ConstantName::OutboundTransactionFee,
        ConstantName::SigningTransactionPeriod,
        ConstantName::VirtualMultSynths,
        ConstantName::MaxSynthPerAssetDepth,
        ConstantName::MaxTxOutOffset,
        ConstantName::TxOutDelayRate,
        ConstantName::OutboundVolumeThreshold,
        ConstantName::ThrottleWindowBlocks,
        ConstantName::GasMultiplierBasisPoints,
        ConstantName::MintSynthsHaltHeight,
        ConstantName::BurnSynthsHaltHeight,
    ];

    /// Parameter-store key.
    pub fn key(&self) -> &'static str {
        match self {
            ConstantName::OutboundTransactionFee => "OutboundTransactionFee",
            ConstantName::SigningTransactionPeriod => "SigningTransactionPeriod",
            ConstantName::VirtualMultSynths => "VirtualMultSynths",
            ConstantName::MaxSynthPerAssetDepth => "MaxSynthPerAssetDepth",
            ConstantName::MaxTxOutOffset => "MaxTxOutOffset",
            ConstantName::TxOutDelayRate => "TxOutDelayRate",
            ConstantName::OutboundVolumeThreshold => "OutboundVolumeThreshold",
            ConstantName::ThrottleWindowBlocks => "ThrottleWindowBlocks",
            ConstantName::GasMultiplierBasisPoints => "GasMultiplierBasisPoints",
            ConstantName::MintSynthsHaltHeight => "MintSynths",
            ConstantName::BurnSynthsHaltHeight => "BurnSynths",
        }
    }

    /// Compiled-in default.
    pub fn default_value(&self) -> i64 {
        match self {
            ConstantName::OutboundTransactionFee => 2_000000,
            ConstantName::SigningTransactionPeriod => 300,
            ConstantName::VirtualMultSynths => 2,
            ConstantName::MaxSynthPerAssetDepth => 3300,
            ConstantName::MaxTxOutOffset => 720,
            ConstantName::TxOutDelayRate => 720,
            ConstantName::OutboundVolumeThreshold => 100_000_00000000,
            ConstantName::ThrottleWindowBlocks => 100,
            ConstantName::GasMultiplierBasisPoints => 15_000,
            ConstantName::MintSynthsHaltHeight => 0,
            ConstantName::BurnSynthsHaltHeight => 0,
        }
    }
}

impl fmt::Display for ConstantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown constant: {0}")]
pub struct UnknownConstant(pub String);

impl FromStr for ConstantName {
    type Err = UnknownConstant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstantName::ALL
            .iter()
            .copied()
            .find(|name| name.key().eq_ignore_ascii_case(s) || format!("{:?}", name).eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownConstant(s.to_string()))
    }
}

/// Constant table: compiled defaults plus configured overrides.
///
/// # Example
///
/// ```rust
/// use liquidity_settlement_core::core::constants::{ConstantName, ConstantValues};
///
/// let constants = ConstantValues::default().with_override(ConstantName::SigningTransactionPeriod, 10);
/// assert_eq!(constants.get(ConstantName::SigningTransactionPeriod), 10);
/// assert_eq!(constants.get(ConstantName::VirtualMultSynths), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantValues {
    overrides: BTreeMap<ConstantName, i64>,
}

impl ConstantValues {
    pub fn with_override(mut self, name: ConstantName, value: i64) -> Self {
        self.overrides.insert(name, value);
        self
    }

    pub fn set(&mut self, name: ConstantName, value: i64) {
        self.overrides.insert(name, value);
    }

    pub fn get(&self, name: ConstantName) -> i64 {
        self.overrides
            .get(&name)
            .copied()
            .unwrap_or_else(|| name.default_value())
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&ConstantName, &i64)> {
        self.overrides.iter()
    }
}
