//! Domain models for the settlement core

pub mod asset;
pub mod event;
pub mod outbound;
pub mod pool;
pub mod state;
pub mod tx;
pub mod vault;

// Re-exports
pub use asset::{Address, Asset, Chain, Coin, ParseAssetError};
pub use event::{EventLog, SettlementEvent, SupplyChange};
pub use outbound::{Memo, MemoError, NetworkFee, OutboundModule, TxOutItem};
pub use pool::{Pool, PoolStatus};
pub use state::{LedgerState, NodeRecord};
pub use tx::{InboundTx, Observation, TxId};
pub use vault::{NodeId, Vault, VaultPubKey, VaultStatus, VaultType};
