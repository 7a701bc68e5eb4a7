//! Inbound transactions and their observations

use crate::models::asset::{Address, Chain, Coin};
use crate::models::vault::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const BLANK_TX_ID: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Transaction hash, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_ascii_uppercase())
    }

    /// Placeholder for outbounds with no originating transaction.
    pub fn blank() -> Self {
        Self(BLANK_TX_ID.to_string())
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty() || self.0 == BLANK_TX_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TxId {
    fn default() -> Self {
        TxId::blank()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finalized inbound transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundTx {
    pub id: TxId,
    pub chain: Chain,
    pub from_address: Address,
    pub to_address: Address,
    pub coins: Vec<Coin>,
    pub memo: String,
}

/// An inbound transaction together with the validators that attested to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub tx: InboundTx,
    pub signers: BTreeSet<NodeId>,
}

impl Observation {
    pub fn new(tx: InboundTx) -> Self {
        Self {
            tx,
            signers: BTreeSet::new(),
        }
    }

    pub fn with_signer(mut self, node: NodeId) -> Self {
        self.signers.insert(node);
        self
    }

    pub fn signed_by(&self, node: &NodeId) -> bool {
        self.signers.contains(node)
    }
}
