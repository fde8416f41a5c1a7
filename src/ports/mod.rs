//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `FungibleAssets`: Token balances, allowances and transfers
//! - `PerformanceSource`: External port performance data
//! - `OracleWriter`: Confirmed writes into the oracle store
//! - `FeedObserver`: Feed cycle telemetry

pub mod feed_observer;
pub mod fungible_asset;
pub mod oracle_writer;
pub mod performance_source;

pub use feed_observer::FeedObserver;
pub use fungible_asset::FungibleAssets;
pub use oracle_writer::OracleWriter;
pub use performance_source::PerformanceSource;
