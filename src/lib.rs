//! Elohim Provenance - content-provenance ledger
//!
//! Two cooperating entities make up the ledger:
//!
//! - **Tag registries** mint collision-resistant ids for URIs of immutable
//!   off-chain content (`TagCreated` events).
//! - **Records** collect traced tags while *building*, link to parent records
//!   to form a lineage graph, and once *immutable* accept attestations from
//!   any account (`TagTraced`, `RecordSigned` events).
//!
//! Neither entity can change hands: both expose the token-standard transfer
//! surface and reject every call on it.
//!
//! ## Flow
//!
//! ```text
//! TagRegistry::tag_one(uri) ──► TagId ──► Record::trace_one_tag(registry, id)
//!                                                │ (building)
//!                                                ▼
//!                              immutable_from passes ──► Record::sign()
//! ```
//!
//! The [`Ledger`] host owns deployed entities, supplies caller and time for
//! each call, and commits a call's state and events only if it succeeds.

pub mod address;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod record;
pub mod store;
pub mod tag_registry;

// Re-exports
pub use address::{Address, TagId, TokenId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LedgerConfig};
pub use context::CallContext;
pub use error::{EntityKind, LedgerError};
pub use events::{EventLog, LedgerEvent, Receipt};
pub use guard::{NonTransferable, TransferCall};
pub use ledger::{Entity, Ledger, LedgerState, RecordParams};
pub use record::{Phase, Record, TracedTag};
pub use store::LedgerStore;
pub use tag_registry::{Tag, TagRegistry};
