//! Settlement requests and per-request processing
//!
//! Each request runs Requested → Validated → Priced → VaultSelected →
//! FeeApplied → Scheduled against the shared batch snapshot. Validation of a
//! request completes before that request touches the snapshot.

use crate::core::math::{amount_serde, Amount};
use crate::core::version::ProtocolVersion;
use crate::models::asset::{Address, Asset, Chain, Coin};
use crate::models::event::SettlementEvent;
use crate::models::outbound::{Memo, OutboundModule, TxOutItem};
use crate::models::tx::TxId;
use crate::settlement::error::{SettlementError, ValidationError};
use crate::settlement::outbound::{prepare_outbound, validate_outbound, OutboundParams};
use crate::settlement::snapshot::{BatchSnapshot, CommittedBatch};
use crate::settlement::swap::{execute_swap, SwapOutcome, SwapParams};
use crate::settlement::PipelineStage;
use crate::store::Ledger;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Requests
// ============================================================================

/// Swap the first coin of an observed inbound into `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub in_hash: TxId,
    pub target: Asset,
    pub destination: Address,
    /// Minimum acceptable output (zero = no limit)
    #[serde(with = "amount_serde", default)]
    pub trade_target: Amount,
}

/// Return inbound coins to their sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub in_hash: TxId,
    pub to_address: Address,
    pub coins: Vec<Coin>,
    pub reason: String,
}

/// Explicit outbound instructions, e.g. vault funding or migration.
///
/// An instruction with `vault_pub_key` set is funded from that vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub instructions: Vec<TxOutItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettlementRequest {
    Swap(SwapRequest),
    Refund(RefundRequest),
    Transfer(TransferRequest),
}

impl SettlementRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementRequest::Swap(_) => "swap",
            SettlementRequest::Refund(_) => "refund",
            SettlementRequest::Transfer(_) => "transfer",
        }
    }

    pub fn in_hash(&self) -> Option<&TxId> {
        match self {
            SettlementRequest::Swap(req) => Some(&req.in_hash),
            SettlementRequest::Refund(req) => Some(&req.in_hash),
            SettlementRequest::Transfer(req) => req.instructions.first().map(|item| &item.in_hash),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// What one request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub index: usize,
    pub kind: &'static str,
    pub swap: Option<SwapOutcome>,
    pub outbounds: Vec<TxOutItem>,
}

/// A committed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReceipt {
    pub height: u64,
    pub version: ProtocolVersion,
    pub engine: &'static str,
    pub outcomes: Vec<RequestOutcome>,
    pub committed: CommittedBatch,
}

impl BatchReceipt {
    pub fn outbounds(&self) -> &[TxOutItem] {
        &self.committed.items
    }

    pub fn events(&self) -> &[SettlementEvent] {
        &self.committed.events
    }
}

/// Why a batch did not commit.
///
/// `outcome` is [`PipelineStage::Rejected`] when the failure came before the
/// batch snapshot was written, [`PipelineStage::RolledBack`] otherwise.
/// `reached` is the last stage the failing request completed.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("batch {outcome} (request {request_index:?} after {reached}): {error}")]
pub struct BatchError {
    pub request_index: Option<usize>,
    pub outcome: PipelineStage,
    pub reached: PipelineStage,
    #[source]
    pub error: SettlementError,
}

// ============================================================================
// Processing
// ============================================================================

/// Parameters shared by every request of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    pub swap: SwapParams,
    pub outbound: OutboundParams,
}

/// Asset actually delivered for `target` to `destination`.
///
/// A layer-1 target sent to a THOR address becomes its synthetic; a synthetic
/// target sent to its own chain becomes its layer-1 asset.
pub fn resolve_target(target: &Asset, destination: &Address) -> Asset {
    if target.is_rune() || destination.is_chain(target.settlement_chain()) {
        return target.clone();
    }
    if destination.is_chain(Chain::Thor) {
        target.synthetic()
    } else {
        target.layer1()
    }
}

pub(crate) fn settle_request<L: Ledger>(
    snapshot: &mut BatchSnapshot,
    ledger: &L,
    index: usize,
    request: &SettlementRequest,
    params: &PipelineParams,
    stage: &mut PipelineStage,
) -> Result<RequestOutcome, SettlementError> {
    let (swap, outbounds) = match request {
        SettlementRequest::Swap(req) => {
            let (swap, outbounds) = settle_swap(snapshot, ledger, req, params, stage)?;
            (Some(swap), outbounds)
        }
        SettlementRequest::Refund(req) => (None, settle_refund(snapshot, ledger, req, params, stage)?),
        SettlementRequest::Transfer(req) => {
            (None, settle_transfer(snapshot, ledger, req, params, stage)?)
        }
    };
    Ok(RequestOutcome {
        index,
        kind: request.kind(),
        swap,
        outbounds,
    })
}

fn validate_swap<L: Ledger>(ledger: &L, req: &SwapRequest) -> Result<(Coin, Asset), ValidationError> {
    let observation = ledger
        .observation(&req.in_hash)
        .ok_or_else(|| ValidationError::UnknownInbound(req.in_hash.clone()))?;
    let source = observation
        .tx
        .coins
        .first()
        .cloned()
        .ok_or(ValidationError::NoCoins)?;
    if source.amount.is_zero() {
        return Err(ValidationError::ZeroAmount(source.asset));
    }
    if req.destination.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    let target = resolve_target(&req.target, &req.destination);
    let chain = target.settlement_chain();
    if !req.destination.is_chain(chain) {
        return Err(ValidationError::AddressChainMismatch {
            address: req.destination.clone(),
            chain,
        });
    }
    if source.asset == target {
        return Err(ValidationError::SameAsset(target));
    }
    Ok((source, target))
}

fn settle_swap<L: Ledger>(
    snapshot: &mut BatchSnapshot,
    ledger: &L,
    req: &SwapRequest,
    params: &PipelineParams,
    stage: &mut PipelineStage,
) -> Result<(SwapOutcome, Vec<TxOutItem>), SettlementError> {
    let (source, target) = validate_swap(ledger, req)?;
    *stage = PipelineStage::Validated;

    let outcome = execute_swap(snapshot, ledger, &source, &target, &req.trade_target, &params.swap)?;
    for leg in &outcome.legs {
        snapshot.record_event(SettlementEvent::Swap {
            height: snapshot.height(),
            in_hash: req.in_hash.clone(),
            pool: leg.pool_before.asset.clone(),
            source: leg.source.clone(),
            emitted: leg.emitted.clone(),
            trade_target: leg.trade_target.clone(),
            liquidity_fee: leg.liquidity_fee.clone(),
            liquidity_fee_in_rune: leg.liquidity_fee_in_rune.clone(),
            slip_bps: leg.slip_bps,
        });
    }
    *stage = PipelineStage::Priced;

    let item = TxOutItem::new(
        target.settlement_chain(),
        req.destination.clone(),
        outcome.emitted.clone(),
        req.in_hash.clone(),
    );
    let outbounds = prepare_outbound(snapshot, ledger, item, &params.outbound, stage)?;
    Ok((outcome, outbounds))
}

fn settle_refund<L: Ledger>(
    snapshot: &mut BatchSnapshot,
    ledger: &L,
    req: &RefundRequest,
    params: &PipelineParams,
    stage: &mut PipelineStage,
) -> Result<Vec<TxOutItem>, SettlementError> {
    if req.coins.is_empty() {
        return Err(ValidationError::NoCoins.into());
    }
    let memo = Memo::Refund {
        in_hash: req.in_hash.clone(),
    };
    let items: Vec<TxOutItem> = req
        .coins
        .iter()
        .map(|coin| {
            let chain = coin.asset.settlement_chain();
            let item = TxOutItem::new(chain, req.to_address.clone(), coin.clone(), req.in_hash.clone())
                .with_memo(memo.to_string());
            // Refunded synthetics already exist; they are returned, not minted.
            if chain.is_thor() {
                item.with_module(OutboundModule::Asgard)
            } else {
                item
            }
        })
        .collect();
    for item in &items {
        validate_outbound(item)?;
    }
    *stage = PipelineStage::Validated;
    debug!(in_hash = %req.in_hash, reason = %req.reason, "refunding inbound");

    prepare_all(snapshot, ledger, items, params, stage)
}

fn settle_transfer<L: Ledger>(
    snapshot: &mut BatchSnapshot,
    ledger: &L,
    req: &TransferRequest,
    params: &PipelineParams,
    stage: &mut PipelineStage,
) -> Result<Vec<TxOutItem>, SettlementError> {
    if req.instructions.is_empty() {
        return Err(ValidationError::NoCoins.into());
    }
    for item in &req.instructions {
        validate_outbound(item)?;
    }
    *stage = PipelineStage::Validated;

    prepare_all(snapshot, ledger, req.instructions.clone(), params, stage)
}

fn prepare_all<L: Ledger>(
    snapshot: &mut BatchSnapshot,
    ledger: &L,
    items: Vec<TxOutItem>,
    params: &PipelineParams,
    stage: &mut PipelineStage,
) -> Result<Vec<TxOutItem>, SettlementError> {
    let mut prepared = Vec::new();
    for item in items {
        prepared.extend(prepare_outbound(snapshot, ledger, item, &params.outbound, stage)?);
    }
    Ok(prepared)
}
