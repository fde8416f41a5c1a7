//! Local Oracle Writer - In-process Store Submissions
//!
//! Implements the `OracleWriter` port over a shared `OracleStore`.
//! Each submission takes the store's write lock, applies the update as
//! the feeder identity, and (when configured) persists a snapshot
//! before confirming.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use crate::adapters::persistence::SnapshotStore;
use crate::domain::oracle::{PerformanceIndex, PortCode};
use crate::ports::oracle_writer::OracleWriter;
use crate::usecases::oracle_store::OracleStore;

use super::identity::FeederIdentity;

/// Oracle writer backed by an in-process store.
pub struct LocalOracleWriter {
    store: Arc<RwLock<OracleStore>>,
    identity: Arc<FeederIdentity>,
    snapshots: Option<Arc<SnapshotStore>>,
}

impl LocalOracleWriter {
    pub fn new(store: Arc<RwLock<OracleStore>>, identity: Arc<FeederIdentity>) -> Self {
        Self {
            store,
            identity,
            snapshots: None,
        }
    }

    /// Persist a snapshot after every confirmed write.
    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn store(&self) -> &Arc<RwLock<OracleStore>> {
        &self.store
    }
}

#[async_trait]
impl OracleWriter for LocalOracleWriter {
    #[instrument(skip(self), fields(port = %port, index = %index))]
    async fn update_port_data(&self, port: &PortCode, index: PerformanceIndex) -> Result<()> {
        let snapshot = {
            let mut store = self.store.write().await;
            store
                .update_port_data(port, index.value(), self.identity.address())
                .with_context(|| format!("Oracle store rejected update for {port}"))?;
            self.snapshots.as_ref().map(|_| store.snapshot())
        };

        if let (Some(snapshots), Some(snapshot)) = (&self.snapshots, snapshot) {
            // Already committed in memory; the next save catches up.
            if let Err(e) = snapshots.save(&snapshot).await {
                warn!(error = %e, "Failed to persist oracle snapshot");
            }
        }
        Ok(())
    }

    /// Unhealthy when the feeder is not the store owner, since every
    /// submission would be rejected.
    async fn is_healthy(&self) -> bool {
        self.store.read().await.owner() == self.identity.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    fn port() -> PortCode {
        PortCode::new("SHANGHAI").unwrap()
    }

    #[tokio::test]
    async fn test_owner_identity_writes() {
        let owner = Address::repeat_byte(0xaa);
        let store = Arc::new(RwLock::new(OracleStore::new(owner)));
        let writer = LocalOracleWriter::new(Arc::clone(&store), Arc::new(FeederIdentity::new(owner)));

        writer
            .update_port_data(&port(), PerformanceIndex::new(7_200).unwrap())
            .await
            .unwrap();

        assert!(writer.is_healthy().await);
        let record = store.read().await.get_port_data(&port());
        assert!(record.active);
        assert_eq!(record.performance_index.value(), 7_200);
    }

    #[tokio::test]
    async fn test_foreign_identity_rejected() {
        let store = Arc::new(RwLock::new(OracleStore::new(Address::repeat_byte(0xaa))));
        let writer = LocalOracleWriter::new(
            Arc::clone(&store),
            Arc::new(FeederIdentity::new(Address::repeat_byte(0xbb))),
        );

        let err = writer
            .update_port_data(&port(), PerformanceIndex::new(7_200).unwrap())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("SHANGHAI"));
        assert!(!store.read().await.get_port_data(&port()).active);
        assert!(!writer.is_healthy().await);
    }
}
