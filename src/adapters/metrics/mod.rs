//! Metrics Adapters
//!
//! Prometheus metrics for the oracle feed, exported through the admin
//! server's `/metrics` route.

pub mod prometheus;

pub use self::prometheus::FeedMetrics;
