//! Settlement error taxonomy
//!
//! Every settlement operation returns `Result<_, SettlementError>`. Errors
//! raised before the batch snapshot is touched are rejections; errors raised
//! afterwards roll the whole batch back. Either way nothing reaches the
//! ledger.

use crate::core::math::Amount;
use crate::core::version::ProtocolVersion;
use crate::models::asset::{Address, Asset, Chain};
use crate::models::outbound::MemoError;
use crate::models::pool::PoolStatus;
use crate::models::tx::TxId;
use crate::store::QueueError;
use thiserror::Error;

/// Malformed request; always raised before any pool mutation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("destination address is empty")]
    EmptyAddress,

    #[error("address {address} is not valid for chain {chain}")]
    AddressChainMismatch { address: Address, chain: Chain },

    #[error("invalid memo: {0}")]
    Memo(#[from] MemoError),

    #[error("cannot swap {0} to itself")]
    SameAsset(Asset),

    #[error("request carries no coins")]
    NoCoins,

    #[error("zero amount of {0}")]
    ZeroAmount(Asset),

    #[error("no finalized observation for inbound {0}")]
    UnknownInbound(TxId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnavailableReason {
    Missing,
    Status(PoolStatus),
    EmptyDepth,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::Missing => f.write_str("pool does not exist"),
            UnavailableReason::Status(status) => write!(f, "pool status is {}", status),
            UnavailableReason::EmptyDepth => f.write_str("pool has no depth"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettlementError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("pool {asset} unavailable: {reason}")]
    PoolUnavailable {
        asset: Asset,
        reason: UnavailableReason,
    },

    #[error("slippage exceeded: emitted {emitted} below limit {limit}")]
    SlippageExceeded { emitted: Amount, limit: Amount },

    #[error("insufficient balance of {asset}: requested {requested}, available {available}")]
    InsufficientBalance {
        asset: Asset,
        requested: Amount,
        available: Amount,
    },

    #[error("insufficient to cover fee: {amount} {asset} against fee {fee}")]
    InsufficientFee {
        asset: Asset,
        amount: Amount,
        fee: Amount,
    },

    #[error("swap into {asset} emits nothing")]
    ZeroEmission { asset: Asset },

    #[error("scheduling failed: {0}")]
    SchedulingFailure(#[from] QueueError),

    #[error("no network fee observed for chain {0}")]
    NetworkFeeUnavailable(Chain),

    #[error("synthetic supply of {asset} would reach {coverage_bps} bps of depth (cap {cap_bps})")]
    SynthSupplyCapExceeded {
        asset: Asset,
        coverage_bps: Amount,
        cap_bps: u64,
    },

    #[error("{operation} synthetics disabled since height {halt_height}")]
    SynthsHalted {
        operation: &'static str,
        halt_height: u64,
    },

    #[error("no settlement engine registered for protocol version {0}")]
    UnsupportedVersion(ProtocolVersion),
}

impl SettlementError {
    pub(crate) fn unavailable(asset: &Asset, reason: UnavailableReason) -> Self {
        SettlementError::PoolUnavailable {
            asset: asset.clone(),
            reason,
        }
    }
}
