//! Addresses and token identifiers
//!
//! Both are fixed-width byte strings rendered as `0x`-prefixed lowercase hex,
//! which is also their serialized form.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Identity of an account or a deployed ledger entity (20 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

/// 256-bit token identifier; tag ids are token ids of their registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(pub [u8; 32]);

/// Tags are identified by the token id their registry minted
pub type TagId = TokenId;

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Address from the trailing 20 bytes of a SHA256 digest
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    /// Stable address for a human-readable account label
    pub fn from_label(label: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(label.as_bytes()).into();
        Self::from_digest(&digest)
    }

    /// Address of the entity `deployer` creates with its `nonce`-th deployment
    pub fn for_deployment(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"elohim-provenance/deploy");
        hasher.update(deployer.0);
        hasher.update(nonce.to_be_bytes());
        Self::from_digest(&hasher.finalize().into())
    }
}

impl TokenId {
    pub const ZERO: TokenId = TokenId([0u8; 32]);
}

impl From<u64> for TokenId {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

fn decode_fixed<const N: usize>(s: &str, what: &str) -> Result<[u8; N], LedgerError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let raw = hex::decode(digits)
        .map_err(|e| LedgerError::InvalidInput(format!("{} '{}' is not hex: {}", what, s, e)))?;
    raw.try_into().map_err(|raw: Vec<u8>| {
        LedgerError::InvalidInput(format!(
            "{} '{}' must be {} bytes, got {}",
            what,
            s,
            N,
            raw.len()
        ))
    })
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s, "address").map(Self)
    }
}

impl FromStr for TokenId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s, "token id").map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for TokenId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl From<TokenId> for String {
    fn from(value: TokenId) -> Self {
        value.to_string()
    }
}
