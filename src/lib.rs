//! Port Exchange - Library Root
//!
//! Constant-product liquidity pools for port tokens plus the oracle
//! store and feed service that publish port performance data.
//! Re-exports all modules for the binary, integration tests and
//! benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
