//! Settlement events for audit and reward accounting.
//!
//! Events are emitted only after a batch commits. Sinks may fail; the
//! pipeline logs such failures and never unwinds a committed batch for them.
//!
//! # Event Types
//!
//! - **Swap**: one priced swap leg
//! - **Fee**: protocol fee taken from an outbound instruction
//! - **MintBurn**: synthetic supply change
//! - **Scheduled**: outbound instruction enqueued

use crate::core::math::Amount;
use crate::models::asset::{Asset, Coin};
use crate::models::outbound::TxOutItem;
use crate::models::tx::TxId;
use crate::store::{EventSink, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyChange {
    Mint,
    Burn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementEvent {
    Swap {
        height: u64,
        in_hash: TxId,
        pool: Asset,
        source: Coin,
        emitted: Coin,
        trade_target: Amount,
        liquidity_fee: Amount,
        liquidity_fee_in_rune: Amount,
        slip_bps: u64,
    },

    Fee {
        height: u64,
        in_hash: TxId,
        /// Fee taken from the outbound coin, in that coin's asset
        coin: Coin,
        /// Rune removed from the pool and sent to the reserve
        pool_deduct: Amount,
    },

    MintBurn {
        height: u64,
        change: SupplyChange,
        coin: Coin,
    },

    Scheduled {
        height: u64,
        item: TxOutItem,
    },
}

impl SettlementEvent {
    pub fn height(&self) -> u64 {
        match self {
            SettlementEvent::Swap { height, .. }
            | SettlementEvent::Fee { height, .. }
            | SettlementEvent::MintBurn { height, .. }
            | SettlementEvent::Scheduled { height, .. } => *height,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            SettlementEvent::Swap { .. } => "Swap",
            SettlementEvent::Fee { .. } => "Fee",
            SettlementEvent::MintBurn { .. } => "MintBurn",
            SettlementEvent::Scheduled { .. } => "Scheduled",
        }
    }

    pub fn in_hash(&self) -> Option<&TxId> {
        match self {
            SettlementEvent::Swap { in_hash, .. } | SettlementEvent::Fee { in_hash, .. } => {
                Some(in_hash)
            }
            SettlementEvent::Scheduled { item, .. } => Some(&item.in_hash),
            SettlementEvent::MintBurn { .. } => None,
        }
    }
}

/// In-memory event sink.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SettlementEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SettlementEvent] {
        &self.events
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&SettlementEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn events_for_tx(&self, in_hash: &TxId) -> Vec<&SettlementEvent> {
        self.events
            .iter()
            .filter(|e| e.in_hash() == Some(in_hash))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: SettlementEvent) -> Result<(), SinkError> {
        self.events.push(event);
        Ok(())
    }
}
