//! Non-transferability guard
//!
//! Tags and records are provenance anchors, not tradable assets. They still
//! expose the token-standard ownership surface so callers written against
//! that shape keep working, but every entry point goes through
//! [`transfer_disabled`] first and fails with the entity's fixed message.
//! No state is read or written on any of these paths.

use tracing::warn;

use crate::address::{Address, TokenId};
use crate::error::{EntityKind, LedgerError};

/// Shared policy for every transfer-surface entry point
pub fn transfer_disabled<T>(kind: EntityKind, operation: &'static str) -> Result<T, LedgerError> {
    warn!(entity = kind.plural(), operation, "Rejected transfer-surface call");
    Err(LedgerError::TransferDisabled(kind))
}

/// Token-standard ownership surface of a non-transferable entity
pub trait NonTransferable {
    const KIND: EntityKind;

    fn approve(&self, _to: &Address, _token_id: &TokenId) -> Result<(), LedgerError> {
        transfer_disabled(Self::KIND, "approve")
    }

    fn get_approved(&self, _token_id: &TokenId) -> Result<Address, LedgerError> {
        transfer_disabled(Self::KIND, "getApproved")
    }

    fn set_approval_for_all(&self, _operator: &Address, _approved: bool) -> Result<(), LedgerError> {
        transfer_disabled(Self::KIND, "setApprovalForAll")
    }

    fn is_approved_for_all(&self, _owner: &Address, _operator: &Address) -> Result<bool, LedgerError> {
        transfer_disabled(Self::KIND, "isApprovedForAll")
    }

    fn transfer_from(&self, _from: &Address, _to: &Address, _token_id: &TokenId) -> Result<(), LedgerError> {
        transfer_disabled(Self::KIND, "transferFrom")
    }

    fn safe_transfer_from(&self, _from: &Address, _to: &Address, _token_id: &TokenId) -> Result<(), LedgerError> {
        transfer_disabled(Self::KIND, "safeTransferFrom")
    }

    fn safe_transfer_from_with_data(
        &self,
        _from: &Address,
        _to: &Address,
        _token_id: &TokenId,
        _data: &[u8],
    ) -> Result<(), LedgerError> {
        transfer_disabled(Self::KIND, "safeTransferFrom")
    }
}

/// A transfer-surface call addressed to some entity through the ledger host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    Approve { to: Address, token_id: TokenId },
    GetApproved { token_id: TokenId },
    SetApprovalForAll { operator: Address, approved: bool },
    IsApprovedForAll { owner: Address, operator: Address },
    TransferFrom { from: Address, to: Address, token_id: TokenId },
    SafeTransferFrom { from: Address, to: Address, token_id: TokenId },
    SafeTransferFromWithData { from: Address, to: Address, token_id: TokenId, data: Vec<u8> },
}

impl TransferCall {
    /// Invoke this call on `target`; results are discarded since none succeed
    pub fn dispatch<T: NonTransferable>(&self, target: &T) -> Result<(), LedgerError> {
        match self {
            Self::Approve { to, token_id } => target.approve(to, token_id),
            Self::GetApproved { token_id } => target.get_approved(token_id).map(|_| ()),
            Self::SetApprovalForAll { operator, approved } => {
                target.set_approval_for_all(operator, *approved)
            }
            Self::IsApprovedForAll { owner, operator } => {
                target.is_approved_for_all(owner, operator).map(|_| ())
            }
            Self::TransferFrom { from, to, token_id } => target.transfer_from(from, to, token_id),
            Self::SafeTransferFrom { from, to, token_id } => {
                target.safe_transfer_from(from, to, token_id)
            }
            Self::SafeTransferFromWithData { from, to, token_id, data } => {
                target.safe_transfer_from_with_data(from, to, token_id, data)
            }
        }
    }
}
