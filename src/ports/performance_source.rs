//! Performance Source Port - External Port Performance Data
//!
//! Defines the trait for obtaining candidate performance indices for
//! tracked ports from an external data provider. Values returned here
//! are untrusted; the feed service validates them before publishing.

use async_trait::async_trait;

use crate::domain::oracle::PortCode;

/// Trait for external port performance providers.
///
/// Implementors may call a REST API, read a file, or simulate data.
/// A failure for one port must not affect other ports.
#[async_trait]
pub trait PerformanceSource: Send + Sync + 'static {
  /// Fetch the current performance index (basis points) for one port.
  async fn fetch_index(&self, port: &PortCode) -> anyhow::Result<u32>;

  /// Short provider name for logs and metrics.
  fn name(&self) -> &'static str;

  /// Check if the provider is reachable.
  async fn is_healthy(&self) -> bool;
}
