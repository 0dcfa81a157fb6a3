//! On-disk ledger state
//!
//! The whole [`LedgerState`] is kept as one pretty-printed JSON document.
//! Saves write a sibling temp file and rename it over the old state.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::ledger::LedgerState;

pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, or an empty ledger if nothing was saved yet
    pub fn load(&self) -> Result<LedgerState, LedgerError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No ledger state yet, starting empty");
            return Ok(LedgerState::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let state: LedgerState = serde_json::from_str(&content)?;
        debug!(
            path = %self.path.display(),
            registries = state.registries.len(),
            records = state.records.len(),
            "Loaded ledger state"
        );
        Ok(state)
    }

    pub fn save(&self, state: &LedgerState) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), events = state.events.len(), "Saved ledger state");
        Ok(())
    }
}
