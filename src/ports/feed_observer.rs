//! Feed Observer Port - Cycle Telemetry Hooks
//!
//! Callbacks the feed service fires while running a cycle. The
//! Prometheus adapter implements this; tests can leave it unset.

use std::time::Duration;

use crate::domain::oracle::{PerformanceIndex, PortCode};

/// Receives feed cycle events. Implementations must not block.
pub trait FeedObserver: Send + Sync + 'static {
  /// A cycle acquired the run-lock and is starting.
  fn cycle_started(&self);

  /// The store confirmed `index` for `port`.
  fn port_published(&self, port: &PortCode, index: PerformanceIndex);

  /// `port` failed at `stage` ("fetch" or "publish") or was skipped.
  fn port_failed(&self, port: &PortCode, stage: &'static str);

  /// The cycle ended with `outcome` after `elapsed`.
  fn cycle_finished(&self, outcome: &'static str, elapsed: Duration);
}
