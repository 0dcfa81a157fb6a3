//! Error types for elohim-provenance

use thiserror::Error;

use crate::address::{Address, TokenId};
use crate::record::Phase;

/// Which kind of ledger entity rejected a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    TagRegistry,
    Record,
}

impl EntityKind {
    /// Collective noun used in the disabled-transfer message
    pub fn plural(&self) -> &'static str {
        match self {
            Self::TagRegistry => "tagRepos",
            Self::Record => "Records",
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Token-standard ownership transfer is not supported by provenance entities
    #[error("The invoked function of ERC721 is disable for {}.", .0.plural())]
    TransferDisabled(EntityKind),

    /// Operation invoked outside the phase that permits it
    #[error("{}", .0.violation_message())]
    PhaseViolation(Phase),

    #[error("Tag id derivation exhausted after {attempts} attempts for uri {uri}")]
    TagIdExhausted { uri: String, attempts: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parent record index {index} out of range ({len} parents)")]
    ParentIndexOutOfRange { index: usize, len: usize },

    #[error("Tag not found: {0}")]
    TagNotFound(TokenId),

    #[error("Tag {tag_id} is not known to registry {registry}")]
    UntrackedTag { registry: Address, tag_id: TokenId },

    #[error("No tag registry at {0}")]
    UnknownRegistry(Address),

    #[error("No record at {0}")]
    UnknownRecord(Address),

    #[error("No entity deployed at {0}")]
    UnknownAddress(Address),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

impl LedgerError {
    /// True for errors raised by a phase gate
    pub fn is_phase_violation(&self) -> bool {
        matches!(self, Self::PhaseViolation(_))
    }

    /// True for rejected arguments: malformed values, out-of-range parent
    /// indexes, unknown tag ids and tags refused by trace verification
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::ParentIndexOutOfRange { .. }
                | Self::TagNotFound(_)
                | Self::UntrackedTag { .. }
        )
    }

    /// True for errors raised by the non-transferability guard
    pub fn is_transfer_disabled(&self) -> bool {
        matches!(self, Self::TransferDisabled(_))
    }
}
