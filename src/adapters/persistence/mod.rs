//! Persistence Adapters
//!
//! Atomic JSON snapshots of the oracle store. The feed service itself
//! keeps no durable state.

pub mod snapshot;

pub use snapshot::SnapshotStore;
