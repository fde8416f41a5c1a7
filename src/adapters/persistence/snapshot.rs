//! Snapshot Store - Atomic JSON Oracle State Persistence
//!
//! Saves oracle store snapshots to `oracle_state.json` using atomic
//! writes (write to tmp file, then rename) so the file is always either
//! the old or the new version, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::usecases::oracle_store::OracleSnapshot;

const STATE_FILE: &str = "oracle_state.json";

/// Atomic JSON snapshot file for the oracle store.
pub struct SnapshotStore {
    /// Path to oracle_state.json.
    state_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl SnapshotStore {
    /// Create a snapshot store in `data_dir`, creating the directory.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        Ok(Self {
            state_path: dir.join(STATE_FILE),
            tmp_path: dir.join(format!("{STATE_FILE}.tmp")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }

    /// Save a snapshot atomically (tmp → rename).
    #[instrument(skip(self, snapshot), fields(ports = snapshot.ports.len()))]
    pub async fn save(&self, snapshot: &OracleSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize oracle snapshot")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .context("Failed to rename snapshot file")?;

        debug!(path = %self.state_path.display(), "Oracle snapshot saved");
        Ok(())
    }

    /// Load the latest snapshot. `None` on first startup.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<OracleSnapshot>> {
        if !fs::try_exists(&self.state_path).await.unwrap_or(false) {
            info!(path = %self.state_path.display(), "No oracle snapshot found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.state_path)
            .await
            .context("Failed to read oracle snapshot")?;
        let snapshot: OracleSnapshot =
            serde_json::from_str(&json).context("Failed to parse oracle snapshot JSON")?;

        info!(
            ports = snapshot.ports.len(),
            saved_at = %snapshot.saved_at,
            "Oracle snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::oracle::PortCode;
    use crate::usecases::oracle_store::OracleStore;
    use alloy::primitives::Address;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("port-exchange-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let store = SnapshotStore::new(scratch_dir()).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = scratch_dir();
        let snapshots = SnapshotStore::new(&dir).await.unwrap();

        let owner = Address::repeat_byte(0xaa);
        let mut oracle = OracleStore::new(owner);
        oracle
            .update_port_data(&PortCode::new("SINGAPORE").unwrap(), 7_500, owner)
            .unwrap();
        snapshots.save(&oracle.snapshot()).await.unwrap();

        let loaded = snapshots.load().await.unwrap().unwrap();
        assert_eq!(loaded.ports.len(), 1);
        assert_eq!(loaded.ports[0].record.performance_index.value(), 7_500);
        assert!(!dir.join("oracle_state.json.tmp").exists());

        let _ = std::fs::remove_dir_all(dir);
    }
}
