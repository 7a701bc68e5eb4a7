//! Vault Selection Policy
//!
//! Chooses which custody vault(s) fund an external-chain outbound. Tiers are
//! searched in order, each filling as much of the remaining amount as it can:
//!
//! 1. A caller-pinned vault (resolved upstream, used as-is)
//! 2. Per-node vaults holding the chain's gas asset whose operator attested
//!    the inbound and is not jailed, ranked by [`VaultSortOrder`]
//! 3. Active pooled vaults, least secure first
//! 4. Retiring pooled vaults, least secure first
//!
//! Every candidate is viewed net of outbounds it has been assigned but not yet
//! signed: those queued within the signing lookback window and those
//! prepared earlier in the same batch.
//!
//! # Critical Invariants
//!
//! - Allocations sum to exactly the requested amount, or the call fails with
//!   `InsufficientBalance` and allocates nothing
//! - A vault whose address on the chain equals the destination is skipped
//! - Vault balances in the store are never modified

use crate::core::math::Amount;
use crate::models::asset::{Address, Chain, Coin};
use crate::models::outbound::TxOutItem;
use crate::models::tx::TxId;
use crate::models::vault::{Vault, VaultPubKey, VaultStatus};
use crate::settlement::error::SettlementError;
use crate::settlement::snapshot::BatchSnapshot;
use crate::store::{NodeRegistry, ObservationProvider, OutboundQueue, PoolStore, VaultStore};
use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::cmp::{min, Ordering};
use tracing::{debug, warn};

/// Ranking of per-node vaults by available target balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VaultSortOrder {
    /// Largest available balance first
    #[default]
    MostAvailableFirst,
    /// Vaults that can cover the remainder alone first, smallest such vault
    /// first; the rest follow largest first
    LeastLeftoverFirst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub order: VaultSortOrder,
    /// Blocks to look back for unsigned outbounds
    pub signing_period: u64,
    /// Blocks to look ahead for throttled outbounds
    pub max_offset: u64,
}

/// One outbound needing funding.
#[derive(Debug, Clone)]
pub struct FundingRequest<'a> {
    pub coin: &'a Coin,
    pub chain: Chain,
    pub to_address: &'a Address,
    pub in_hash: &'a TxId,
    /// Gas-asset balance a vault must still hold
    pub max_gas: &'a Amount,
    /// Vaults holding no more than this of the coin are skipped
    pub asset_fee: &'a Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub vault: VaultPubKey,
    pub amount: Amount,
}

/// Unsigned outbounds that still reserve vault funds.
pub fn pending_outbounds<Q: OutboundQueue>(
    queue: &Q,
    snapshot: &BatchSnapshot,
    policy: &SelectionPolicy,
) -> Vec<TxOutItem> {
    let height = snapshot.height();
    let start = height.saturating_sub(policy.signing_period).max(1);
    let end = height.saturating_add(policy.max_offset);
    let mut pending: Vec<TxOutItem> = queue
        .items_between(start, end)
        .into_iter()
        .filter(TxOutItem::is_pending)
        .collect();
    pending.extend(snapshot.pending().iter().cloned());
    pending
}

/// `vault` with every pending item it funds (coin and max gas) deducted.
pub fn reserved_view(vault: &Vault, pending: &[TxOutItem]) -> Vault {
    pending
        .iter()
        .filter(|item| item.vault_pub_key.as_ref() == Some(&vault.pub_key))
        .fold(vault.clone(), |view, item| {
            let view = view.deduct(&item.coin);
            match &item.max_gas {
                Some(gas) => view.deduct(gas),
                None => view,
            }
        })
}

/// Bond backing the vault minus the rune value it holds.
///
/// Lower scores are less secure and are drained first.
pub fn security_score<L: PoolStore + NodeRegistry>(
    ledger: &L,
    snapshot: &BatchSnapshot,
    vault: &Vault,
) -> BigInt {
    let total_bond = vault
        .membership
        .iter()
        .fold(Amount::zero(), |acc, node| acc + ledger.bond(node));
    let total_value = vault.coins.iter().fold(Amount::zero(), |acc, coin| {
        if coin.asset.is_rune() {
            return acc + &coin.amount;
        }
        match snapshot.peek_pool(ledger, &coin.asset) {
            Some(pool) => acc + pool.asset_value_in_rune(&coin.amount),
            None => acc,
        }
    });
    BigInt::from(total_bond) - BigInt::from(total_value)
}

fn sort_per_node(vaults: &mut [Vault], request: &FundingRequest<'_>, order: VaultSortOrder) {
    let asset = &request.coin.asset;
    let wanted = &request.coin.amount;
    vaults.sort_by(|a, b| {
        let (bal_a, bal_b) = (a.balance(asset), b.balance(asset));
        let ranking = match order {
            VaultSortOrder::MostAvailableFirst => bal_b.cmp(&bal_a),
            VaultSortOrder::LeastLeftoverFirst => {
                match (&bal_a >= wanted, &bal_b >= wanted) {
                    (true, true) => bal_a.cmp(&bal_b),
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => bal_b.cmp(&bal_a),
                }
            }
        };
        ranking.then_with(|| a.pub_key.cmp(&b.pub_key))
    });
}

fn sort_by_security<L: PoolStore + NodeRegistry>(
    ledger: &L,
    snapshot: &BatchSnapshot,
    vaults: Vec<Vault>,
) -> Vec<Vault> {
    let mut scored: Vec<(BigInt, Vault)> = vaults
        .into_iter()
        .map(|vault| (security_score(ledger, snapshot, &vault), vault))
        .collect();
    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_a
            .cmp(score_b)
            .then_with(|| b.status_since.cmp(&a.status_since))
            .then_with(|| a.pub_key.cmp(&b.pub_key))
    });
    scored.into_iter().map(|(_, vault)| vault).collect()
}

/// Ordered candidate list across tiers 2-4.
fn ranked_candidates<L>(
    ledger: &L,
    snapshot: &BatchSnapshot,
    request: &FundingRequest<'_>,
    policy: &SelectionPolicy,
) -> Vec<Vault>
where
    L: PoolStore + VaultStore + ObservationProvider + NodeRegistry + OutboundQueue,
{
    let pending = pending_outbounds(ledger, snapshot, policy);
    let gas_asset = request.chain.gas_asset();
    let signers = ledger
        .observation(request.in_hash)
        .map(|observation| observation.signers)
        .unwrap_or_default();
    let vaults = ledger.vaults();

    let mut per_node: Vec<Vault> = vaults
        .iter()
        .filter(|vault| vault.status != VaultStatus::Inactive && vault.has_asset(&gas_asset))
        .filter(|vault| match vault.operator() {
            Some(operator) => {
                signers.contains(operator) && !ledger.is_jailed(operator, snapshot.height())
            }
            None => false,
        })
        .map(|vault| reserved_view(vault, &pending))
        .collect();
    sort_per_node(&mut per_node, request, policy.order);

    let pooled = |status: VaultStatus| -> Vec<Vault> {
        vaults
            .iter()
            .filter(|vault| vault.is_pooled() && vault.status == status)
            .map(|vault| reserved_view(vault, &pending))
            .collect()
    };
    let active = sort_by_security(ledger, snapshot, pooled(VaultStatus::Active));
    let retiring = sort_by_security(ledger, snapshot, pooled(VaultStatus::Retiring));

    per_node.into_iter().chain(active).chain(retiring).collect()
}

/// Choose vaults to fund `request`.
///
/// # Returns
///
/// - `Ok(allocations)` summing to `request.coin.amount`
/// - `Err(InsufficientBalance)` with no allocations otherwise
pub fn select_funding<L>(
    ledger: &L,
    snapshot: &BatchSnapshot,
    request: &FundingRequest<'_>,
    pinned: Option<&VaultPubKey>,
    policy: &SelectionPolicy,
) -> Result<Vec<Allocation>, SettlementError>
where
    L: PoolStore + VaultStore + ObservationProvider + NodeRegistry + OutboundQueue,
{
    if let Some(vault) = pinned {
        return Ok(vec![Allocation {
            vault: vault.clone(),
            amount: request.coin.amount.clone(),
        }]);
    }

    let gas_asset = request.chain.gas_asset();
    let mut remaining = request.coin.amount.clone();
    let mut allocations = Vec::new();

    for vault in ranked_candidates(ledger, snapshot, request, policy) {
        if remaining.is_zero() {
            break;
        }
        match vault.address(request.chain) {
            Some(address) if address != request.to_address => {}
            _ => continue,
        }
        let available = vault.balance(&request.coin.asset);
        if available <= *request.asset_fee || available.is_zero() {
            continue;
        }
        let gas = vault.balance(&gas_asset);
        if gas.is_zero() || gas < *request.max_gas {
            continue;
        }

        let amount = min(available, remaining.clone());
        remaining -= &amount;
        debug!(
            vault = %vault.pub_key,
            amount = %amount,
            remaining = %remaining,
            "vault allocated"
        );
        allocations.push(Allocation {
            vault: vault.pub_key.clone(),
            amount,
        });
    }

    if !remaining.is_zero() {
        let covered = &request.coin.amount - &remaining;
        warn!(
            coin = %request.coin,
            covered = %covered,
            "insufficient vault funds for outbound"
        );
        return Err(SettlementError::InsufficientBalance {
            asset: request.coin.asset.clone(),
            requested: request.coin.amount.clone(),
            available: covered,
        });
    }
    Ok(allocations)
}
