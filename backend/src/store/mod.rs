//! Collaborator contracts
//!
//! The settlement core owns no storage. Everything it reads or writes goes
//! through these traits; [`crate::models::state::LedgerState`] implements all
//! of them in memory.
//!
//! # Critical Invariants
//!
//! - **All-or-nothing enqueue**: [`OutboundQueue::enqueue_batch`] either
//!   stores every item or none of them
//! - **Write-on-commit**: the pipeline calls the mutating methods only from
//!   its single commit step

use crate::core::math::Amount;
use crate::models::asset::{Asset, Chain, Coin};
use crate::models::event::SettlementEvent;
use crate::models::outbound::{NetworkFee, TxOutItem};
use crate::models::pool::Pool;
use crate::models::tx::{Observation, TxId};
use crate::models::vault::{NodeId, Vault, VaultPubKey};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("outbound queue rejected item for height {height}: {reason}")]
    Rejected { height: u64, reason: String },

    #[error("outbound queue is full at height {height}")]
    Full { height: u64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SupplyError {
    #[error("cannot burn {requested} {asset}: supply is {supply}")]
    BurnExceedsSupply {
        asset: Asset,
        requested: Amount,
        supply: Amount,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("event sink unavailable: {0}")]
pub struct SinkError(pub String);

pub trait PoolStore {
    fn pool(&self, asset: &Asset) -> Option<Pool>;
    fn set_pool(&mut self, pool: Pool);
    fn pools(&self) -> Vec<Pool>;
}

pub trait VaultStore {
    fn vault(&self, pub_key: &VaultPubKey) -> Option<Vault>;
    fn vaults(&self) -> Vec<Vault>;
    fn set_vault(&mut self, vault: Vault);
}

pub trait NetworkFeeOracle {
    fn network_fee(&self, chain: Chain) -> Option<NetworkFee>;
}

/// Governance overrides. A negative or absent value means "use the default".
pub trait ParameterStore {
    fn int_override(&self, key: &str) -> Option<i64>;
}

pub trait ObservationProvider {
    fn observation(&self, in_hash: &TxId) -> Option<Observation>;
}

pub trait NodeRegistry {
    fn is_jailed(&self, node: &NodeId, height: u64) -> bool;
    fn bond(&self, node: &NodeId) -> Amount;
}

/// Height-indexed outbound queue plus throttle window accounting.
pub trait OutboundQueue {
    fn items_at(&self, height: u64) -> Vec<TxOutItem>;
    /// Items scheduled at any height in `start..=end`, in height order.
    fn items_between(&self, start: u64, end: u64) -> Vec<TxOutItem>;
    /// Store every item under its scheduled height, or none of them.
    fn enqueue_batch(&mut self, items: &[TxOutItem]) -> Result<(), QueueError>;
    fn window_volume(&self, window: u64) -> Amount;
    fn set_window_volume(&mut self, window: u64, volume: Amount);
}

/// Synthetic supply and the protocol reserve.
pub trait SupplyLedger {
    fn synth_supply(&self, asset: &Asset) -> Amount;
    fn mint_synth(&mut self, coin: &Coin);
    fn burn_synth(&mut self, coin: &Coin) -> Result<(), SupplyError>;
    fn reserve(&self) -> Amount;
    fn credit_reserve(&mut self, amount: &Amount);
}

pub trait EventSink {
    fn emit(&mut self, event: SettlementEvent) -> Result<(), SinkError>;
}

/// Everything a settlement batch reads or commits to.
pub trait Ledger:
    PoolStore
    + VaultStore
    + NetworkFeeOracle
    + ParameterStore
    + ObservationProvider
    + NodeRegistry
    + OutboundQueue
    + SupplyLedger
{
}

impl<T> Ledger for T where
    T: PoolStore
        + VaultStore
        + NetworkFeeOracle
        + ParameterStore
        + ObservationProvider
        + NodeRegistry
        + OutboundQueue
        + SupplyLedger
{
}
