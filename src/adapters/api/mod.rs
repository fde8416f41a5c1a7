//! Admin API Adapter
//!
//! HTTP surface of the oracle feed service: health, oracle data,
//! manual update trigger and metrics.

pub mod admin;

pub use admin::{router, serve, AdminState};
