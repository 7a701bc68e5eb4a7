//! Custody vaults
//!
//! A vault is a key group holding funds on external chains. Pooled vaults are
//! controlled by the active validator set; per-node vaults are bound to exactly
//! one validator's operating balance.
//!
//! The settlement core only reads vault balances. Reservations against
//! not-yet-signed outbounds are applied to a local copy (see [`Vault::deduct`]).

use crate::core::math::{safe_sub, Amount};
use crate::models::asset::{Address, Asset, Chain, Coin};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Vault public key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultPubKey(String);

impl VaultPubKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VaultPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validator identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultStatus {
    Active,
    Retiring,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultType {
    Pooled,
    PerNode { operator: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub pub_key: VaultPubKey,
    pub status: VaultStatus,
    pub vault_type: VaultType,
    pub coins: Vec<Coin>,
    pub membership: Vec<NodeId>,
    pub addresses: BTreeMap<Chain, Address>,
    /// Height at which the vault entered its current status
    pub status_since: u64,
}

impl Vault {
    pub fn new(pub_key: VaultPubKey, vault_type: VaultType, status: VaultStatus) -> Self {
        let membership = match &vault_type {
            VaultType::PerNode { operator } => vec![operator.clone()],
            VaultType::Pooled => Vec::new(),
        };
        Self {
            pub_key,
            status,
            vault_type,
            coins: Vec::new(),
            membership,
            addresses: BTreeMap::new(),
            status_since: 0,
        }
    }

    pub fn pooled(pub_key: &str, status: VaultStatus) -> Self {
        Vault::new(VaultPubKey::new(pub_key), VaultType::Pooled, status)
    }

    pub fn per_node(pub_key: &str, operator: &str) -> Self {
        Vault::new(
            VaultPubKey::new(pub_key),
            VaultType::PerNode {
                operator: NodeId::new(operator),
            },
            VaultStatus::Active,
        )
    }

    /// Add `coin` to the balance of its asset.
    pub fn with_coin(mut self, coin: Coin) -> Self {
        match self.coins.iter_mut().find(|c| c.asset == coin.asset) {
            Some(existing) => existing.amount += coin.amount,
            None => self.coins.push(coin),
        }
        self
    }

    pub fn with_address(mut self, chain: Chain, address: Address) -> Self {
        self.addresses.insert(chain, address);
        self
    }

    pub fn with_members(mut self, members: Vec<NodeId>) -> Self {
        self.membership = members;
        self
    }

    pub fn with_status_since(mut self, height: u64) -> Self {
        self.status_since = height;
        self
    }

    pub fn balance(&self, asset: &Asset) -> Amount {
        self.coins
            .iter()
            .find(|c| &c.asset == asset)
            .map(|c| c.amount.clone())
            .unwrap_or_else(Amount::zero)
    }

    pub fn has_asset(&self, asset: &Asset) -> bool {
        !self.balance(asset).is_zero()
    }

    pub fn address(&self, chain: Chain) -> Option<&Address> {
        self.addresses.get(&chain).filter(|a| !a.is_empty())
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self.vault_type, VaultType::Pooled)
    }

    pub fn operator(&self) -> Option<&NodeId> {
        match &self.vault_type {
            VaultType::PerNode { operator } => Some(operator),
            VaultType::Pooled => None,
        }
    }

    /// Copy of this vault with `coin` reserved (balance saturates at zero).
    pub fn deduct(&self, coin: &Coin) -> Vault {
        let mut vault = self.clone();
        if let Some(existing) = vault.coins.iter_mut().find(|c| c.asset == coin.asset) {
            existing.amount = safe_sub(&existing.amount, &coin.amount);
        }
        vault
    }
}
