//! Optional on-disk copy of the cursor and dedup ledger.
//!
//! Without it the ledger lives only in memory and a restart can re-deliver
//! at most one window's worth of notifications. With `STATE_PATH` set the
//! state is written after every committed cycle and read back at startup.

use crate::ledger::DedupLedger;
use crate::types::{BlockNumber, EventKey};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// JSON format: `{ "last_processed_block": 123, "ledger": ["0x..:0", ...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub last_processed_block: BlockNumber,
    /// Ledger keys, oldest first
    #[serde(default)]
    pub ledger: Vec<String>,
}

impl PersistedState {
    pub fn capture(last_processed_block: BlockNumber, ledger: &DedupLedger) -> Self {
        Self {
            last_processed_block,
            ledger: ledger.iter().map(ToString::to_string).collect(),
        }
    }

    /// Rebuild the ledger, skipping keys that no longer parse.
    pub fn restore_ledger(&self, capacity: usize) -> DedupLedger {
        let keys = self.ledger.iter().filter_map(|raw| match raw.parse::<EventKey>() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(key = %raw, error = %e, "skipping invalid key in persisted ledger");
                None
            }
        });
        DedupLedger::from_keys(keys, capacity)
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no state has been written yet.
    pub fn load(&self) -> Result<Option<PersistedState>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("read {}", self.path.display()));
            }
        };
        let state: PersistedState = serde_json::from_str(&content)
            .wrap_err_with(|| format!("parse {}", self.path.display()))?;
        info!(
            path = %self.path.display(),
            last_processed_block = state.last_processed_block,
            ledger_keys = state.ledger.len(),
            "loaded persisted pipeline state"
        );
        Ok(Some(state))
    }

    /// Atomic write: serialize → write to `.tmp` → rename over target.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).wrap_err("create state dir")?;
            }
        }
        let json = serde_json::to_string_pretty(state).wrap_err("serialize state")?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json).wrap_err("write tmp state")?;
        std::fs::rename(&tmp_path, &self.path).wrap_err("rename state")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "reward_notifier_state_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        path
    }

    #[test]
    fn load_missing_file_is_none() {
        let store = StateStore::new(temp_path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn persistence_roundtrip() {
        let store = StateStore::new(temp_path());
        let mut ledger = DedupLedger::new(10);
        ledger.record(EventKey::TxLog(B256::with_last_byte(1), 0));
        ledger.record(EventKey::Tx(B256::with_last_byte(2)));

        store.save(&PersistedState::capture(105, &ledger)).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.last_processed_block, 105);
        let restored = loaded.restore_ledger(10);
        let keys: Vec<_> = restored.iter().copied().collect();
        let original: Vec<_> = ledger.iter().copied().collect();
        assert_eq!(keys, original);
    }

    #[test]
    fn invalid_keys_are_skipped() {
        let state = PersistedState {
            last_processed_block: 1,
            ledger: vec!["garbage".to_string(), format!("{:#x}:3", B256::ZERO)],
        };
        let ledger = state.restore_ledger(10);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.seen(&EventKey::TxLog(B256::ZERO, 3)));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();
        assert!(StateStore::new(path).load().is_err());
    }
}
