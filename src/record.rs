//! Records - phase-gated provenance attestations
//!
//! A record is **building** while `now < immutable_from` and **immutable**
//! afterwards. The phase is never stored; every gated call recomputes it from
//! the call context, so the transition happens exactly once and cannot be
//! undone.
//!
//! | Phase | Allowed |
//! |-------|---------|
//! | Building | `trace_one_tag`, `trace_multi_tags` |
//! | Immutable | `sign`, `has_signed` |
//!
//! Every gated call checks its phase before touching any state.
//!
//! Lineage is plain data: parent records are referenced by address only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::address::{Address, TagId};
use crate::context::CallContext;
use crate::error::{EntityKind, LedgerError};
use crate::events::LedgerEvent;
use crate::guard::NonTransferable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Building,
    Immutable,
}

impl Phase {
    /// Phase of a record with the given `immutable_from` at time `now`
    pub fn at(now: u64, immutable_from: u64) -> Self {
        if now < immutable_from {
            Self::Building
        } else {
            Self::Immutable
        }
    }

    /// Message reported when a call requires this phase but the record is in the other
    pub fn violation_message(&self) -> &'static str {
        match self {
            Self::Building => "called function is only usable during building period.",
            Self::Immutable => "called function is only available when contract is immutable.",
        }
    }
}

/// A tag asserted into a record while it was building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedTag {
    pub tag_registry: Address,
    pub tag_id: TagId,
    pub traced_at: u64,
}

/// A parent record as seen at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRef {
    pub address: Address,
    pub chain_length: u64,
}

/// Chain length of a record with the given parents: 0 for a root,
/// otherwise one more than the longest parent chain
pub fn chain_length_of(parents: &[ParentRef]) -> u64 {
    parents
        .iter()
        .map(|p| p.chain_length.saturating_add(1))
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    address: Address,
    owner: Address,
    name: String,
    symbol: String,
    immutable_from: u64,
    parent_records: Vec<Address>,
    chain_length: u64,
    traced_tags: Vec<TracedTag>,
    /// Signer -> time of first attestation
    signatures: BTreeMap<Address, u64>,
}

impl Record {
    pub fn new(
        address: Address,
        owner: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        immutable_from: u64,
        parents: &[ParentRef],
    ) -> Self {
        Self {
            address,
            owner,
            name: name.into(),
            symbol: symbol.into(),
            immutable_from,
            parent_records: parents.iter().map(|p| p.address).collect(),
            chain_length: chain_length_of(parents),
            traced_tags: Vec::new(),
            signatures: BTreeMap::new(),
        }
    }

    pub fn phase(&self, now: u64) -> Phase {
        Phase::at(now, self.immutable_from)
    }

    pub fn is_building(&self, now: u64) -> bool {
        self.phase(now) == Phase::Building
    }

    /// Fail with the phase violation for `required` unless the record is in it at `now`
    pub fn require_phase(&self, now: u64, required: Phase) -> Result<(), LedgerError> {
        let current = self.phase(now);
        if current != required {
            debug!(record = %self.address, ?current, ?required, "Phase gate rejected call");
            return Err(LedgerError::PhaseViolation(required));
        }
        Ok(())
    }

    /// Trace one tag of `tag_registry` into this record
    pub fn trace_one_tag(
        &mut self,
        ctx: &CallContext,
        tag_registry: Address,
        tag_id: TagId,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), LedgerError> {
        self.require_phase(ctx.now, Phase::Building)?;
        self.push_trace(ctx.now, tag_registry, tag_id, events);
        Ok(())
    }

    /// Trace several tags of one registry, in the order given
    pub fn trace_multi_tags(
        &mut self,
        ctx: &CallContext,
        tag_registry: Address,
        tag_ids: &[TagId],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<(), LedgerError> {
        self.require_phase(ctx.now, Phase::Building)?;
        for tag_id in tag_ids {
            self.push_trace(ctx.now, tag_registry, *tag_id, events);
        }
        Ok(())
    }

    fn push_trace(&mut self, now: u64, tag_registry: Address, tag_id: TagId, events: &mut Vec<LedgerEvent>) {
        self.traced_tags.push(TracedTag {
            tag_registry,
            tag_id,
            traced_at: now,
        });
        events.push(LedgerEvent::TagTraced { tag_id, tag_registry });
        info!(record = %self.address, registry = %tag_registry, tag_id = %tag_id, "Tag traced");
    }

    /// Attest this record as the caller. Returns whether the caller is a new signer.
    ///
    /// `RecordSigned` is emitted on every call, repeated attestations included.
    pub fn sign(&mut self, ctx: &CallContext, events: &mut Vec<LedgerEvent>) -> Result<bool, LedgerError> {
        self.require_phase(ctx.now, Phase::Immutable)?;

        let newly_signed = !self.signatures.contains_key(&ctx.caller);
        self.signatures.entry(ctx.caller).or_insert(ctx.now);
        events.push(LedgerEvent::RecordSigned { signer: ctx.caller });

        info!(record = %self.address, signer = %ctx.caller, newly_signed, "Record signed");
        Ok(newly_signed)
    }

    pub fn has_signed(&self, now: u64, signer: &Address) -> Result<bool, LedgerError> {
        self.require_phase(now, Phase::Immutable)?;
        Ok(self.signatures.contains_key(signer))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Deployer of the record
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn immutable_from(&self) -> u64 {
        self.immutable_from
    }

    pub fn record_chain_length(&self) -> u64 {
        self.chain_length
    }

    pub fn record_parent_records(&self, index: usize) -> Result<Address, LedgerError> {
        self.parent_records
            .get(index)
            .copied()
            .ok_or(LedgerError::ParentIndexOutOfRange {
                index,
                len: self.parent_records.len(),
            })
    }

    pub fn parent_records(&self) -> &[Address] {
        &self.parent_records
    }

    pub fn parent_count(&self) -> usize {
        self.parent_records.len()
    }

    pub fn traced_tags(&self) -> &[TracedTag] {
        &self.traced_tags
    }

    /// Signers in address order
    pub fn signers(&self) -> impl Iterator<Item = &Address> {
        self.signatures.keys()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// When `signer` first attested, if it has
    pub fn signed_at(&self, signer: &Address) -> Option<u64> {
        self.signatures.get(signer).copied()
    }
}

impl NonTransferable for Record {
    const KIND: EntityKind = EntityKind::Record;
}
