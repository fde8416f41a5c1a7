//! Oracle Store Adapters
//!
//! The feeder identity and the `OracleWriter` implementation that
//! submits updates to the in-process store.

pub mod identity;
pub mod local;

pub use identity::FeederIdentity;
pub use local::LocalOracleWriter;
