//! Settlement Module
//!
//! Pricing and outbound preparation for one batch:
//! - AMM swap legs and double swaps through rune ([`swap`])
//! - Synthetic mint/burn accounting ([`synth`])
//! - Vault selection ([`vault_select`])
//! - Fees, gas and congestion throttle ([`fees`], [`throttle`])
//! - Outbound preparation ([`outbound`])
//!
//! All of it works against a [`snapshot::BatchSnapshot`]; the orchestrator
//! owns the single commit.
//!
//! # Critical Invariants
//!
//! 1. **Atomicity**: a batch commits every instruction and pool change, or
//!    none of them
//! 2. **Determinism**: identical ledger, height and requests produce identical
//!    instructions and pools
//! 3. **No panics**: every failure is a [`SettlementError`]

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod fees;
pub mod outbound;
pub mod snapshot;
pub mod swap;
pub mod synth;
pub mod throttle;
pub mod vault_select;

pub use error::{SettlementError, UnavailableReason, ValidationError};
pub use fees::{apply_outbound_fee, resolve_gas, FeeOutcome, GasCeiling};
pub use outbound::{prepare_outbound, validate_outbound, OutboundParams};
pub use snapshot::{BatchSnapshot, CommittedBatch};
pub use swap::{
    calc_asset_emission, calc_liquidity_fee, calc_swap_slip_bps, execute_swap, price_leg,
    LegParams, SwapLegResult, SwapOutcome, SwapParams,
};
pub use synth::{CoverageFormula, SynthOperation, SynthPolicy};
pub use throttle::ThrottleParams;
pub use vault_select::{select_funding, Allocation, FundingRequest, SelectionPolicy, VaultSortOrder};

/// Progress of one request through the pipeline.
///
/// `Rejected` and `RolledBack` are terminal failure states: a rejection
/// happened before the batch snapshot was touched, a rollback after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Requested,
    Validated,
    Priced,
    VaultSelected,
    FeeApplied,
    Scheduled,
    Committed,
    Rejected,
    RolledBack,
}

impl PipelineStage {
    pub fn is_failure(&self) -> bool {
        matches!(self, PipelineStage::Rejected | PipelineStage::RolledBack)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Requested => "requested",
            PipelineStage::Validated => "validated",
            PipelineStage::Priced => "priced",
            PipelineStage::VaultSelected => "vault_selected",
            PipelineStage::FeeApplied => "fee_applied",
            PipelineStage::Scheduled => "scheduled",
            PipelineStage::Committed => "committed",
            PipelineStage::Rejected => "rejected",
            PipelineStage::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}
