//! Tag registry - mints content tags for off-chain URIs
//!
//! A tag binds a collision-resistant id to the URI of some immutable
//! off-chain content. Ids are derived from the registry seed, the mint nonce
//! and the URI:
//!
//! ```text
//! id = SHA256("elohim-provenance/tag" | len(seed) | seed | nonce | len(uri) | uri | salt)
//! ```
//!
//! `salt` starts at 0 and is bumped after every collision with an id the
//! registry already issued, up to `max_attempts` candidates per mint.
//!
//! A call mints into a batch that holds only the advanced counters and the
//! new tags; the registry takes the batch over once every uri has minted, so
//! a failing call changes nothing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::address::{Address, TagId, TokenId};
use crate::context::CallContext;
use crate::error::{EntityKind, LedgerError};
use crate::events::LedgerEvent;
use crate::guard::NonTransferable;

/// Candidate ids tried per mint before giving up
pub const DEFAULT_MAX_TAG_ATTEMPTS: u32 = 16;

/// A minted (id, uri) binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub uri: String,
    /// Account that minted, and therefore owns, the tag
    pub minter: Address,
    pub minted_at: u64,
}

/// Derive the candidate id for one mint attempt
pub fn derive_tag_id(seed: &str, nonce: u64, uri: &str, salt: u32) -> TagId {
    let mut hasher = Sha256::new();
    hasher.update(b"elohim-provenance/tag");
    hasher.update((seed.len() as u64).to_be_bytes());
    hasher.update(seed.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update((uri.len() as u64).to_be_bytes());
    hasher.update(uri.as_bytes());
    hasher.update(salt.to_be_bytes());
    TokenId(hasher.finalize().into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRegistry {
    address: Address,
    deployer: Address,
    seed: String,
    nonce: u64,
    miss_count: u64,
    max_attempts: u32,
    tags: BTreeMap<TagId, Tag>,
}

impl TagRegistry {
    pub fn new(address: Address, deployer: Address, seed: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            address,
            deployer,
            seed: seed.into(),
            nonce: 0,
            miss_count: 0,
            max_attempts: max_attempts.max(1),
            tags: BTreeMap::new(),
        }
    }

    /// Mint a tag for `uri`, owned by the caller
    pub fn tag_one(
        &mut self,
        ctx: &CallContext,
        uri: &str,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<TagId, LedgerError> {
        let ids = self.mint_all(ctx, &[uri], events)?;
        Ok(ids[0])
    }

    /// Mint one tag per uri, in input order
    pub fn tag_multi(
        &mut self,
        ctx: &CallContext,
        uris: &[String],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Vec<TagId>, LedgerError> {
        let uris: Vec<&str> = uris.iter().map(String::as_str).collect();
        self.mint_all(ctx, &uris, events)
    }

    /// Mint every uri into a [`MintBatch`] and apply it only if all succeed
    fn mint_all(
        &mut self,
        ctx: &CallContext,
        uris: &[&str],
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Vec<TagId>, LedgerError> {
        if let Some(pos) = uris.iter().position(|u| u.is_empty()) {
            return Err(LedgerError::InvalidInput(format!(
                "tag uri at position {} must not be empty",
                pos
            )));
        }

        let mut batch = MintBatch::new(self);
        let mut staged_events = Vec::with_capacity(uris.len());
        let ids = uris
            .iter()
            .map(|uri| batch.mint(ctx, uri, &mut staged_events))
            .collect::<Result<Vec<_>, _>>()?;
        let (nonce, miss_count, minted) = batch.finish();

        self.nonce = nonce;
        self.miss_count = miss_count;
        for tag in minted {
            info!(registry = %self.address, tag_id = %tag.id, uri = %tag.uri, "Tag created");
            self.tags.insert(tag.id, tag);
        }
        events.extend(staged_events);
        Ok(ids)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn miss_count(&self) -> u64 {
        self.miss_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn total_tags(&self) -> usize {
        self.tags.len()
    }

    pub fn contains(&self, tag_id: &TagId) -> bool {
        self.tags.contains_key(tag_id)
    }

    pub fn tag(&self, tag_id: &TagId) -> Option<&Tag> {
        self.tags.get(tag_id)
    }

    /// Tags in id order
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    /// Token URI of a minted tag
    pub fn tag_uri(&self, tag_id: &TagId) -> Result<&str, LedgerError> {
        self.tags
            .get(tag_id)
            .map(|t| t.uri.as_str())
            .ok_or(LedgerError::TagNotFound(*tag_id))
    }

    pub fn owner_of(&self, tag_id: &TagId) -> Result<Address, LedgerError> {
        self.tags
            .get(tag_id)
            .map(|t| t.minter)
            .ok_or(LedgerError::TagNotFound(*tag_id))
    }

    pub fn balance_of(&self, owner: &Address) -> usize {
        self.tags.values().filter(|t| &t.minter == owner).count()
    }
}

/// Mints staged against a registry; only the counters and new tags are held
struct MintBatch<'a> {
    registry: &'a TagRegistry,
    nonce: u64,
    miss_count: u64,
    minted: Vec<Tag>,
    minted_ids: BTreeSet<TagId>,
}

impl<'a> MintBatch<'a> {
    fn new(registry: &'a TagRegistry) -> Self {
        Self {
            registry,
            nonce: registry.nonce,
            miss_count: registry.miss_count,
            minted: Vec::new(),
            minted_ids: BTreeSet::new(),
        }
    }

    fn is_taken(&self, id: &TagId) -> bool {
        self.registry.tags.contains_key(id) || self.minted_ids.contains(id)
    }

    fn mint(&mut self, ctx: &CallContext, uri: &str, events: &mut Vec<LedgerEvent>) -> Result<TagId, LedgerError> {
        let registry = self.registry;
        for salt in 0..registry.max_attempts {
            let candidate = derive_tag_id(&registry.seed, self.nonce, uri, salt);
            if self.is_taken(&candidate) {
                self.miss_count += 1;
                debug!(registry = %registry.address, salt, misses = self.miss_count, "Tag id collision");
                continue;
            }

            self.minted_ids.insert(candidate);
            self.minted.push(Tag {
                id: candidate,
                uri: uri.to_string(),
                minter: ctx.caller,
                minted_at: ctx.now,
            });
            self.nonce += 1;
            events.push(LedgerEvent::TagCreated {
                tag_id: candidate,
                uri: uri.to_string(),
            });
            return Ok(candidate);
        }

        Err(LedgerError::TagIdExhausted {
            uri: uri.to_string(),
            attempts: registry.max_attempts,
        })
    }

    fn finish(self) -> (u64, u64, Vec<Tag>) {
        (self.nonce, self.miss_count, self.minted)
    }
}

impl NonTransferable for TagRegistry {
    const KIND: EntityKind = EntityKind::TagRegistry;
}
