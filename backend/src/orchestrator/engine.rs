//! Orchestrator Engine
//!
//! Runs settlement batches end to end:
//!
//! ```text
//! For each batch at height h:
//! 1. Select the settlement engine for the active protocol version
//! 2. Resolve batch parameters (config + governance overrides)
//! 3. For each request, in order:
//!    validate → price → select vaults → charge fees → schedule
//! 4. Commit the snapshot (enqueue, pools, windows, reserve, mint, burn)
//! 5. Emit events
//! ```
//!
//! Any failure in step 3 or 4 drops the snapshot; the ledger is untouched.
//!
//! # Versioning
//!
//! Behaviour that changed between protocol versions lives behind
//! [`SettlementEngine`]. The [`EngineRegistry`] picks the engine with the
//! greatest version not above the network's active version, once per batch.
//!
//! # Example
//!
//! ```rust
//! use liquidity_settlement_core::core::version::ProtocolVersion;
//! use liquidity_settlement_core::models::{EventLog, LedgerState};
//! use liquidity_settlement_core::orchestrator::{EngineConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(EngineConfig::default()).unwrap();
//! let mut ledger = LedgerState::new();
//! let mut events = EventLog::new();
//!
//! let receipt = orchestrator
//!     .settle_batch(&mut ledger, &mut events, 100, ProtocolVersion::new(1, 1, 0), &[])
//!     .unwrap();
//! assert_eq!(receipt.engine, "v2");
//! assert!(receipt.outbounds().is_empty());
//! ```

use crate::core::version::ProtocolVersion;
use crate::orchestrator::config::{BatchParameters, ConfigError, EngineConfig};
use crate::orchestrator::pipeline::{
    settle_request, BatchError, BatchReceipt, PipelineParams, SettlementRequest,
};
use crate::settlement::error::SettlementError;
use crate::settlement::outbound::OutboundParams;
use crate::settlement::snapshot::BatchSnapshot;
use crate::settlement::swap::SwapParams;
use crate::settlement::synth::CoverageFormula;
use crate::settlement::PipelineStage;
use crate::store::{EventSink, Ledger};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

// ============================================================================
// Versioned engines
// ============================================================================

/// Version-specific settlement behaviour.
pub trait SettlementEngine {
    fn name(&self) -> &'static str;

    /// First protocol version this engine applies to.
    fn version(&self) -> ProtocolVersion;

    /// How synthetic supply is measured against pool depth.
    fn coverage_formula(&self) -> CoverageFormula;

    fn swap_params(&self, params: &BatchParameters) -> SwapParams {
        params.swap_params(self.coverage_formula())
    }

    fn outbound_params(&self, params: &BatchParameters) -> OutboundParams {
        params.outbound_params()
    }
}

/// Synthetic coverage measured against the asset depth alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineV1;

impl SettlementEngine for EngineV1 {
    fn name(&self) -> &'static str {
        "v1"
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::new(1, 0, 0)
    }

    fn coverage_formula(&self) -> CoverageFormula {
        CoverageFormula::AssetDepth
    }
}

/// Synthetic coverage measured against twice the asset depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineV2;

impl SettlementEngine for EngineV2 {
    fn name(&self) -> &'static str {
        "v2"
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::new(1, 1, 0)
    }

    fn coverage_formula(&self) -> CoverageFormula {
        CoverageFormula::DoubledAssetDepth
    }
}

/// Engines keyed by the first version they apply to.
#[derive(Default)]
pub struct EngineRegistry {
    engines: BTreeMap<ProtocolVersion, Box<dyn SettlementEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in engine.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(EngineV1));
        registry.register(Box::new(EngineV2));
        registry
    }

    /// Add `engine`, replacing any engine registered at the same version.
    pub fn register(&mut self, engine: Box<dyn SettlementEngine>) {
        self.engines.insert(engine.version(), engine);
    }

    /// Engine for `version`: the greatest registered version not above it.
    pub fn select(&self, version: ProtocolVersion) -> Result<&dyn SettlementEngine, SettlementError> {
        self.engines
            .range(..=version)
            .next_back()
            .map(|(_, engine)| engine.as_ref())
            .ok_or(SettlementError::UnsupportedVersion(version))
    }

    pub fn versions(&self) -> Vec<ProtocolVersion> {
        self.engines.keys().copied().collect()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("versions", &self.versions())
            .finish()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Settlement batch driver.
///
/// Owns configuration and the engine registry; the ledger and event sink are
/// borrowed per batch.
#[derive(Debug)]
pub struct Orchestrator {
    config: EngineConfig,
    registry: EngineRegistry,
}

impl Orchestrator {
    /// Orchestrator with the built-in engines.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_registry(config, EngineRegistry::standard())
    }

    pub fn with_registry(config: EngineConfig, registry: EngineRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Settle `requests` at `height` as one atomic batch.
    ///
    /// # Returns
    ///
    /// - `Ok(BatchReceipt)` after every request was prepared and the batch
    ///   committed; events have been handed to `sink`
    /// - `Err(BatchError)` with the ledger unchanged and no events emitted
    pub fn settle_batch<L: Ledger, E: EventSink>(
        &self,
        ledger: &mut L,
        sink: &mut E,
        height: u64,
        version: ProtocolVersion,
        requests: &[SettlementRequest],
    ) -> Result<BatchReceipt, BatchError> {
        let engine = self.registry.select(version).map_err(|error| BatchError {
            request_index: None,
            outcome: PipelineStage::Rejected,
            reached: PipelineStage::Requested,
            error,
        })?;
        let resolved = BatchParameters::resolve(&self.config, &*ledger);
        let params = PipelineParams {
            swap: engine.swap_params(&resolved),
            outbound: engine.outbound_params(&resolved),
        };

        info!(
            height,
            version = %version,
            engine = engine.name(),
            requests = requests.len(),
            "settlement batch started"
        );

        let mut snapshot = BatchSnapshot::new(height);
        let mut outcomes = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let mut stage = PipelineStage::Requested;
            match settle_request(&mut snapshot, &*ledger, index, request, &params, &mut stage) {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    let outcome = if snapshot.is_mutated() {
                        PipelineStage::RolledBack
                    } else {
                        PipelineStage::Rejected
                    };
                    warn!(
                        height,
                        request = index,
                        kind = request.kind(),
                        reached = %stage,
                        outcome = %outcome,
                        error = %error,
                        "settlement batch abandoned"
                    );
                    return Err(BatchError {
                        request_index: Some(index),
                        outcome,
                        reached: stage,
                        error,
                    });
                }
            }
        }

        let committed = snapshot.commit(ledger).map_err(|error| {
            warn!(height, error = %error, "settlement batch commit refused");
            BatchError {
                request_index: None,
                outcome: PipelineStage::RolledBack,
                reached: PipelineStage::Scheduled,
                error,
            }
        })?;

        for event in &committed.events {
            if let Err(err) = sink.emit(event.clone()) {
                error!(
                    height,
                    event_type = event.event_type(),
                    error = %err,
                    "fail to emit settlement event"
                );
            }
        }

        Ok(BatchReceipt {
            height,
            version,
            engine: engine.name(),
            outcomes,
            committed,
        })
    }
}
