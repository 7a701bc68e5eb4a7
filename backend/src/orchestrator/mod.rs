//! Orchestrator - settlement batch driver
//!
//! Ties configuration, versioned engines and the settlement pipeline into
//! one atomic batch per call. See `engine.rs` for the batch loop.

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod pipeline;

pub use checkpoint::{
    compute_config_hash, compute_state_hash, validate_ledger_snapshot, CheckpointError,
    LedgerSnapshot, WindowSnapshot,
};
pub use config::{BatchParameters, ConfigError, EngineConfig};
pub use engine::{EngineRegistry, EngineV1, EngineV2, Orchestrator, SettlementEngine};
pub use pipeline::{
    resolve_target, BatchError, BatchReceipt, PipelineParams, RefundRequest, RequestOutcome,
    SettlementRequest, SwapRequest, TransferRequest,
};
