//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! dependencies (HTTP clients, in-memory books, file I/O). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: Admin HTTP server for the feed service
//! - `assets`: In-memory fungible asset bank
//! - `metrics`: Prometheus feed metrics
//! - `persistence`: Atomic JSON oracle snapshots
//! - `sources`: Simulated and HTTP performance sources
//! - `store`: Feeder identity and local oracle writer

pub mod api;
pub mod assets;
pub mod metrics;
pub mod persistence;
pub mod sources;
pub mod store;
