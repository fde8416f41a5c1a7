//! Oracle Writer Port - Store Write Confirmation Boundary
//!
//! Defines the trait the feed service uses to submit performance
//! updates to the oracle store. Each call blocks until the store has
//! either committed the write or rejected it; a submission is atomic
//! at the store level.

use async_trait::async_trait;

use crate::domain::oracle::{PerformanceIndex, PortCode};

/// Trait for submitting oracle records.
///
/// The writer signs every submission with the feeder identity it was
/// constructed with; callers never pass credentials per call.
#[async_trait]
pub trait OracleWriter: Send + Sync + 'static {
  /// Submit `index` for `port` and wait for commit or rejection.
  async fn update_port_data(&self, port: &PortCode, index: PerformanceIndex) -> anyhow::Result<()>;

  /// Check if the store would accept this writer's submissions.
  async fn is_healthy(&self) -> bool;
}
