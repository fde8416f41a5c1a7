//! Performance Source Adapters
//!
//! Implementations of the `PerformanceSource` port: a simulator for
//! local runs and a rate-limited REST client for a real provider.

pub mod http;
pub mod simulated;

pub use http::{HttpPerformanceSource, HttpSourceConfig};
pub use simulated::SimulatedSource;
