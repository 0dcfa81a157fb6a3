//! Per-call execution context

use crate::address::Address;

/// Who is calling and when, as supplied by the ledger host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    /// Unix seconds
    pub now: u64,
}

impl CallContext {
    pub fn new(caller: Address, now: u64) -> Self {
        Self { caller, now }
    }
}
