//! Outbound instructions and their memos
//!
//! A [`TxOutItem`] is a single payment the external signer must broadcast:
//! one coin, from one vault (or a module account on the THOR chain), to one
//! address, no earlier than its scheduled height.

use crate::core::math::Amount;
use crate::models::asset::{Address, Chain, Coin};
use crate::models::tx::TxId;
use crate::models::vault::VaultPubKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Memo
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MemoError {
    #[error("empty memo")]
    Empty,

    #[error("unknown memo type: {0}")]
    UnknownType(String),

    #[error("memo {kind} is missing its {field}")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("memo {kind} has invalid height: {value}")]
    InvalidHeight { kind: &'static str, value: String },
}

/// Parsed outbound memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Memo {
    Outbound { in_hash: TxId },
    Refund { in_hash: TxId },
    YggdrasilFund { height: u64 },
    YggdrasilReturn { height: u64 },
    Migrate { height: u64 },
    Ragnarok { height: u64 },
    Consolidate,
}

impl Memo {
    /// Parse a memo; the type prefix is case-insensitive.
    ///
    /// # Example
    ///
    /// ```rust
    /// use liquidity_settlement_core::models::outbound::Memo;
    ///
    /// let memo = Memo::parse("out:abc123").unwrap();
    /// assert_eq!(memo.to_string(), "OUT:ABC123");
    /// assert!(Memo::parse("migrate:42").unwrap().is_internal());
    /// assert!(Memo::parse("SWAP:BTC.BTC").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Memo, MemoError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MemoError::Empty);
        }
        let mut parts = raw.splitn(2, ':');
        let kind = parts.next().unwrap_or_default().to_ascii_uppercase();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        let hash = |kind: &'static str| {
            if arg.is_empty() {
                Err(MemoError::MissingField { kind, field: "hash" })
            } else {
                Ok(TxId::new(arg))
            }
        };
        let height = |kind: &'static str| {
            if arg.is_empty() {
                return Err(MemoError::MissingField { kind, field: "height" });
            }
            arg.parse::<u64>().map_err(|_| MemoError::InvalidHeight {
                kind,
                value: arg.to_string(),
            })
        };

        match kind.as_str() {
            "OUT" => Ok(Memo::Outbound { in_hash: hash("OUT")? }),
            "REFUND" => Ok(Memo::Refund { in_hash: hash("REFUND")? }),
            "YGGDRASIL+" => Ok(Memo::YggdrasilFund { height: height("YGGDRASIL+")? }),
            "YGGDRASIL-" => Ok(Memo::YggdrasilReturn { height: height("YGGDRASIL-")? }),
            "MIGRATE" => Ok(Memo::Migrate { height: height("MIGRATE")? }),
            "RAGNAROK" => Ok(Memo::Ragnarok { height: height("RAGNAROK")? }),
            "CONSOLIDATE" => Ok(Memo::Consolidate),
            _ => Err(MemoError::UnknownType(kind)),
        }
    }

    /// Vault-management transfer: exempt from fees and the throttle.
    pub fn is_internal(&self) -> bool {
        match self {
            Memo::YggdrasilFund { .. }
            | Memo::YggdrasilReturn { .. }
            | Memo::Migrate { .. }
            | Memo::Ragnarok { .. }
            | Memo::Consolidate => true,
            Memo::Outbound { .. } | Memo::Refund { .. } => false,
        }
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Memo::Outbound { in_hash } => write!(f, "OUT:{}", in_hash),
            Memo::Refund { in_hash } => write!(f, "REFUND:{}", in_hash),
            Memo::YggdrasilFund { height } => write!(f, "YGGDRASIL+:{}", height),
            Memo::YggdrasilReturn { height } => write!(f, "YGGDRASIL-:{}", height),
            Memo::Migrate { height } => write!(f, "MIGRATE:{}", height),
            Memo::Ragnarok { height } => write!(f, "RAGNAROK:{}", height),
            Memo::Consolidate => f.write_str("CONSOLIDATE"),
        }
    }
}

// ============================================================================
// Outbound instruction
// ============================================================================

/// Module account funding a native THOR outbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundModule {
    /// Transfer out of the protocol's own holdings
    Asgard,
    /// Mint the (synthetic) coin on delivery
    Mint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutItem {
    pub chain: Chain,
    pub to_address: Address,
    pub vault_pub_key: Option<VaultPubKey>,
    pub coin: Coin,
    pub max_gas: Option<Coin>,
    pub memo: String,
    pub in_hash: TxId,
    pub gas_rate: u64,
    pub scheduled_height: u64,
    pub module: Option<OutboundModule>,
    /// Set by external observation once the payment has been broadcast
    pub out_hash: Option<TxId>,
}

impl TxOutItem {
    pub fn new(chain: Chain, to_address: Address, coin: Coin, in_hash: TxId) -> Self {
        Self {
            chain,
            to_address,
            vault_pub_key: None,
            coin,
            max_gas: None,
            memo: String::new(),
            in_hash,
            gas_rate: 0,
            scheduled_height: 0,
            module: None,
            out_hash: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_vault(mut self, vault: VaultPubKey) -> Self {
        self.vault_pub_key = Some(vault);
        self
    }

    pub fn with_module(mut self, module: OutboundModule) -> Self {
        self.module = Some(module);
        self
    }

    /// Not yet observed on the destination chain.
    pub fn is_pending(&self) -> bool {
        self.out_hash.is_none()
    }

    /// Gas reserved by this instruction, in the chain's gas asset.
    pub fn max_gas_amount(&self) -> Option<&Amount> {
        self.max_gas.as_ref().map(|c| &c.amount)
    }
}

impl fmt::Display for TxOutItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} on {} @{} ({})",
            self.coin, self.to_address, self.chain, self.scheduled_height, self.memo
        )
    }
}

/// Most recently observed fee on an external chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFee {
    pub chain: Chain,
    pub transaction_size: u64,
    pub transaction_rate: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_prefix_is_case_insensitive() {
        assert_eq!(
            Memo::parse("refund:abc").unwrap(),
            Memo::Refund { in_hash: TxId::new("ABC") }
        );
        assert_eq!(Memo::parse("Ragnarok:13").unwrap(), Memo::Ragnarok { height: 13 });
        assert_eq!(Memo::parse("consolidate").unwrap(), Memo::Consolidate);
    }

    #[test]
    fn test_memo_errors() {
        assert_eq!(Memo::parse("  "), Err(MemoError::Empty));
        assert_eq!(
            Memo::parse("OUT:"),
            Err(MemoError::MissingField { kind: "OUT", field: "hash" })
        );
        assert!(matches!(Memo::parse("MIGRATE:abc"), Err(MemoError::InvalidHeight { .. })));
        assert!(matches!(Memo::parse("SWAP:BTC.BTC"), Err(MemoError::UnknownType(_))));
    }

    #[test]
    fn test_internal_memos() {
        assert!(!Memo::parse("OUT:ABC").unwrap().is_internal());
        assert!(!Memo::parse("REFUND:ABC").unwrap().is_internal());
        assert!(Memo::parse("YGGDRASIL-:5").unwrap().is_internal());
        assert!(Memo::Consolidate.is_internal());
    }
}
