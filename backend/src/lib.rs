//! Liquidity Settlement Core
//!
//! Settlement core of a multi-chain liquidity protocol: prices swaps against
//! constant-product pools (including synthetic assets), then turns the
//! result into scheduled outbound payment instructions funded by custody
//! vaults, with protocol fees, gas ceilings and a congestion throttle.
//!
//! # Architecture
//!
//! - **core**: Amount arithmetic, protocol constants, versions, logging
//! - **models**: Domain types (Asset, Pool, Vault, TxOutItem) and the
//!   in-memory ledger
//! - **store**: Collaborator contracts the core reads and commits through
//! - **settlement**: Swap calculator, synthetics, vault selection, fees,
//!   throttle, batch snapshot
//! - **orchestrator**: Batch driver, versioned engines, config, checkpoints
//!
//! # Critical Invariants
//!
//! 1. All amounts are unsigned arbitrary-precision integers (1e8 base units)
//! 2. A batch commits completely or not at all
//! 3. Iteration over shared state is ordered, so settlement is deterministic

pub mod core;
pub mod models;
pub mod orchestrator;
pub mod settlement;
pub mod store;

// Re-exports for convenience
pub use core::math::Amount;
pub use core::version::ProtocolVersion;
pub use models::{
    Address, Asset, Chain, Coin, EventLog, LedgerState, Memo, Pool, PoolStatus, SettlementEvent,
    TxId, TxOutItem, Vault, VaultStatus,
};
pub use orchestrator::{
    BatchError, BatchReceipt, EngineConfig, Orchestrator, RefundRequest, SettlementRequest,
    SwapRequest, TransferRequest,
};
pub use settlement::{PipelineStage, SettlementError, ValidationError};
pub use store::{EventSink, Ledger};
