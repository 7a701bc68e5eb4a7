//! Engine configuration
//!
//! [`EngineConfig`] is the static, serde-loadable configuration of an
//! orchestrator: compiled constant overrides and vault ordering.
//! [`BatchParameters`] is what a single batch actually runs with, after live
//! governance overrides from the [`ParameterStore`] are layered on top.
//!
//! # Resolution order
//!
//! 1. Parameter-store override, when present and non-negative
//! 2. `EngineConfig::constants` override
//! 3. Compiled default

use crate::core::constants::{ConstantName, ConstantValues};
use crate::core::math::Amount;
use crate::settlement::outbound::OutboundParams;
use crate::settlement::swap::SwapParams;
use crate::settlement::synth::{CoverageFormula, SynthPolicy};
use crate::settlement::throttle::ThrottleParams;
use crate::settlement::vault_select::{SelectionPolicy, VaultSortOrder};
use crate::store::ParameterStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value} for {name}: {reason}")]
    InvalidConstant {
        name: ConstantName,
        value: i64,
        reason: &'static str,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialization(String),
}

// ============================================================================
// Static configuration
// ============================================================================

/// Orchestrator configuration.
///
/// # Example
///
/// ```rust
/// use liquidity_settlement_core::core::constants::ConstantName;
/// use liquidity_settlement_core::orchestrator::EngineConfig;
///
/// let config = EngineConfig::from_json(
///     r#"{"constants": {"overrides": {"SigningTransactionPeriod": 10}},
///         "vault_sort_order": "LeastLeftoverFirst"}"#,
/// )
/// .unwrap();
/// assert_eq!(config.constants.get(ConstantName::SigningTransactionPeriod), 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub constants: ConstantValues,
    pub vault_sort_order: VaultSortOrder,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Reject constant overrides no batch could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.constants.overrides() {
            let invalid = |reason| ConfigError::InvalidConstant {
                name: *name,
                value: *value,
                reason,
            };
            if *value < 0 {
                return Err(invalid("must not be negative"));
            }
            match name {
                ConstantName::VirtualMultSynths if *value < 1 => {
                    return Err(invalid("multiplier must be at least 1"))
                }
                ConstantName::ThrottleWindowBlocks if *value < 1 => {
                    return Err(invalid("window must span at least one block"))
                }
                ConstantName::GasMultiplierBasisPoints if *value < 1 => {
                    return Err(invalid("gas multiplier must be positive"))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// Per-batch parameters
// ============================================================================

/// Every tunable resolved for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchParameters {
    pub outbound_fee: Amount,
    pub signing_period: u64,
    pub virtual_multiplier: u64,
    pub max_synth_bps: u64,
    pub max_offset: u64,
    pub delay_rate: u64,
    pub volume_threshold: Amount,
    pub window_blocks: u64,
    pub gas_multiplier_bps: u64,
    pub mint_halt_height: u64,
    pub burn_halt_height: u64,
    pub vault_sort_order: VaultSortOrder,
}

impl BatchParameters {
    /// Resolve against `config` and the live `store` overrides.
    pub fn resolve<P: ParameterStore>(config: &EngineConfig, store: &P) -> Self {
        let value = |name: ConstantName| -> u64 {
            let raw = store
                .int_override(name.key())
                .filter(|v| *v >= 0)
                .unwrap_or_else(|| config.constants.get(name));
            u64::try_from(raw).unwrap_or(0)
        };

        Self {
            outbound_fee: Amount::from(value(ConstantName::OutboundTransactionFee)),
            signing_period: value(ConstantName::SigningTransactionPeriod),
            virtual_multiplier: value(ConstantName::VirtualMultSynths).max(1),
            max_synth_bps: value(ConstantName::MaxSynthPerAssetDepth),
            max_offset: value(ConstantName::MaxTxOutOffset),
            delay_rate: value(ConstantName::TxOutDelayRate),
            volume_threshold: Amount::from(value(ConstantName::OutboundVolumeThreshold)),
            window_blocks: value(ConstantName::ThrottleWindowBlocks).max(1),
            gas_multiplier_bps: value(ConstantName::GasMultiplierBasisPoints),
            mint_halt_height: value(ConstantName::MintSynthsHaltHeight),
            burn_halt_height: value(ConstantName::BurnSynthsHaltHeight),
            vault_sort_order: config.vault_sort_order,
        }
    }

    pub fn swap_params(&self, formula: CoverageFormula) -> SwapParams {
        SwapParams {
            transaction_fee: self.outbound_fee.clone(),
            virtual_multiplier: self.virtual_multiplier,
            synth: SynthPolicy {
                max_supply_bps: self.max_synth_bps,
                formula,
                mint_halt_height: self.mint_halt_height,
                burn_halt_height: self.burn_halt_height,
            },
        }
    }

    pub fn outbound_params(&self) -> OutboundParams {
        OutboundParams {
            fee: self.outbound_fee.clone(),
            gas_multiplier_bps: self.gas_multiplier_bps,
            selection: SelectionPolicy {
                order: self.vault_sort_order,
                signing_period: self.signing_period,
                max_offset: self.max_offset,
            },
            throttle: ThrottleParams {
                volume_threshold: self.volume_threshold.clone(),
                delay_rate: self.delay_rate,
                max_offset: self.max_offset,
                window_blocks: self.window_blocks,
            },
        }
    }
}
