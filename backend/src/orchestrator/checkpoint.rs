//! Checkpoint - Save/Restore Ledger State
//!
//! Serializes the complete in-memory ledger so a node can persist it between
//! batches, and hashes it so independently running nodes can compare their
//! post-batch state.
//!
//! # Critical Invariants
//!
//! - **Determinism**: the same ledger always produces the same hash
//! - **Unit bound**: `synth_units <= lp_units` for every pool
//! - **No synthetic custody**: vaults never hold synthetic coins
//! - **Queue integrity**: no instruction is queued twice
//! - **Config matching**: state can only be restored with a matching config

use crate::core::math::{amount_serde, Amount};
use crate::models::asset::Coin;
use crate::models::outbound::{NetworkFee, OutboundModule, TxOutItem};
use crate::models::pool::Pool;
use crate::models::state::{LedgerState, NodeRecord};
use crate::models::tx::Observation;
use crate::models::vault::Vault;
use crate::orchestrator::config::EngineConfig;
use crate::store::{OutboundQueue, PoolStore, SupplyLedger, VaultStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckpointError {
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("ledger state invalid: {0}")]
    InvalidState(String),

    #[error("checkpoint config hash {found} does not match {expected}")]
    ConfigMismatch { expected: String, found: String },
}

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Throttle volume accounted to one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub window: u64,
    #[serde(with = "amount_serde")]
    pub volume: Amount,
}

/// Complete ledger snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Height of the last committed batch
    pub height: u64,
    pub pools: Vec<Pool>,
    pub vaults: Vec<Vault>,
    pub network_fees: Vec<NetworkFee>,
    pub parameters: BTreeMap<String, i64>,
    pub observations: Vec<Observation>,
    pub nodes: Vec<NodeRecord>,
    pub queue: Vec<TxOutItem>,
    pub queue_capacity: Option<usize>,
    pub throttle_windows: Vec<WindowSnapshot>,
    pub synth_supply: Vec<Coin>,
    #[serde(with = "amount_serde")]
    pub reserve: Amount,
    /// SHA256 of the engine config the ledger was produced under
    pub config_hash: String,
}

impl LedgerSnapshot {
    pub fn capture(
        state: &LedgerState,
        height: u64,
        config: &EngineConfig,
    ) -> Result<Self, CheckpointError> {
        Ok(Self {
            height,
            pools: state.pools(),
            vaults: state.vaults(),
            network_fees: state.network_fees().copied().collect(),
            parameters: state.parameters().clone(),
            observations: state.observations().cloned().collect(),
            nodes: state.nodes().cloned().collect(),
            queue: state.queued_items(),
            queue_capacity: state.queue_capacity(),
            throttle_windows: state
                .throttle_windows()
                .iter()
                .map(|(window, volume)| WindowSnapshot {
                    window: *window,
                    volume: volume.clone(),
                })
                .collect(),
            synth_supply: state
                .synth_supplies()
                .iter()
                .map(|(asset, supply)| Coin::new(asset.clone(), supply.clone()))
                .collect(),
            reserve: state.reserve(),
            config_hash: compute_config_hash(config)?,
        })
    }

    /// Fail unless this snapshot was taken under `config`.
    pub fn verify_config(&self, config: &EngineConfig) -> Result<(), CheckpointError> {
        let expected = compute_config_hash(config)?;
        if expected != self.config_hash {
            return Err(CheckpointError::ConfigMismatch {
                expected,
                found: self.config_hash.clone(),
            });
        }
        Ok(())
    }

    /// Rebuild the ledger, validating it first.
    pub fn restore(self, config: &EngineConfig) -> Result<LedgerState, CheckpointError> {
        self.verify_config(config)?;
        validate_ledger_snapshot(&self)?;

        let mut state = LedgerState::new().with_reserve(self.reserve);
        if let Some(capacity) = self.queue_capacity {
            state = state.with_queue_capacity(capacity);
        }
        for pool in self.pools {
            state = state.with_pool(pool);
        }
        for vault in self.vaults {
            state = state.with_vault(vault);
        }
        for fee in self.network_fees {
            state = state.with_network_fee(fee);
        }
        for (key, value) in &self.parameters {
            state = state.with_parameter(key, *value);
        }
        for observation in self.observations {
            state = state.with_observation(observation);
        }
        for node in self.nodes {
            state.insert_node(node);
        }
        for item in self.queue {
            state = state.with_queued_item(item);
        }
        for window in self.throttle_windows {
            state.set_window_volume(window.window, window.volume);
        }
        for coin in self.synth_supply {
            state = state.with_synth_supply(coin.asset, coin.amount);
        }
        Ok(state)
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// SHA-256 (lowercase hex) of a ledger snapshot or any other serializable
/// value, over its canonical JSON form.
pub fn compute_state_hash<T: Serialize>(value: &T) -> Result<String, CheckpointError> {
    let json = canonical_json(value)?;
    Ok(format!("{:x}", Sha256::digest(json.as_bytes())))
}

/// Hash recorded in a checkpoint to pin the config it was captured under.
pub fn compute_config_hash(config: &EngineConfig) -> Result<String, CheckpointError> {
    compute_state_hash(config)
}

/// JSON with object keys sorted at every depth.
fn canonical_json<T: Serialize>(value: &T) -> Result<String, CheckpointError> {
    let value =
        serde_json::to_value(value).map_err(|e| CheckpointError::Serialization(e.to_string()))?;
    serde_json::to_string(&sort_keys(value))
        .map_err(|e| CheckpointError::Serialization(e.to_string()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check ledger invariants on a snapshot.
pub fn validate_ledger_snapshot(snapshot: &LedgerSnapshot) -> Result<(), CheckpointError> {
    let invalid = |msg: String| Err(CheckpointError::InvalidState(msg));

    let mut pools = BTreeSet::new();
    for pool in &snapshot.pools {
        if pool.asset.is_synthetic() || pool.asset.is_rune() {
            return invalid(format!("pool keyed by non-layer-1 asset {}", pool.asset));
        }
        if !pools.insert(&pool.asset) {
            return invalid(format!("duplicate pool {}", pool.asset));
        }
        if pool.synth_units > pool.lp_units {
            return invalid(format!(
                "pool {} has synth units {} above LP units {}",
                pool.asset, pool.synth_units, pool.lp_units
            ));
        }
    }

    for vault in &snapshot.vaults {
        if let Some(coin) = vault.coins.iter().find(|coin| coin.asset.is_synthetic()) {
            return invalid(format!("vault {} holds synthetic {}", vault.pub_key, coin.asset));
        }
    }

    let mut queued = BTreeSet::new();
    for item in &snapshot.queue {
        if item.module == Some(OutboundModule::Mint) && !item.chain.is_thor() {
            return invalid(format!("mint-module outbound on {}: {}", item.chain, item));
        }
        let key = (
            item.scheduled_height,
            item.in_hash.clone(),
            item.vault_pub_key.clone(),
            item.to_address.clone(),
            item.coin.asset.clone(),
            item.memo.clone(),
        );
        if !queued.insert(key) {
            return invalid(format!("duplicate queued outbound {}", item));
        }
    }

    Ok(())
}
