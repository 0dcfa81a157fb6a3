//! Ledger events and the receipt log
//!
//! Entities push [`LedgerEvent`]s into a caller-provided buffer while an
//! operation runs. The host only moves them into the [`EventLog`] once the
//! operation has committed, so a failed call leaves no events behind.

use serde::{Deserialize, Serialize};

use crate::address::{Address, TagId};

/// Events emitted by tag registries and records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum LedgerEvent {
    /// A registry minted a tag for a content uri
    TagCreated { tag_id: TagId, uri: String },

    /// A record traced a tag of some registry into itself
    TagTraced { tag_id: TagId, tag_registry: Address },

    /// An account attested an immutable record
    RecordSigned { signer: Address },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TagCreated { .. } => "TagCreated",
            Self::TagTraced { .. } => "TagTraced",
            Self::RecordSigned { .. } => "RecordSigned",
        }
    }
}

/// A committed event together with where and when it was emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Position in the ledger-wide log, starting at 0
    pub seq: u64,
    pub emitter: Address,
    pub timestamp: u64,
    pub event: LedgerEvent,
}

/// Append-only, totally ordered event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    receipts: Vec<Receipt>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the events of one committed call, preserving their order
    pub fn commit(&mut self, emitter: Address, timestamp: u64, events: Vec<LedgerEvent>) -> &[Receipt] {
        let start = self.receipts.len();
        for event in events {
            let seq = self.receipts.len() as u64;
            self.receipts.push(Receipt {
                seq,
                emitter,
                timestamp,
                event,
            });
        }
        &self.receipts[start..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts.iter()
    }

    /// Receipts emitted by one entity, in log order
    pub fn by_emitter<'a>(&'a self, emitter: &'a Address) -> impl Iterator<Item = &'a Receipt> + 'a {
        self.receipts.iter().filter(move |r| &r.emitter == emitter)
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}
