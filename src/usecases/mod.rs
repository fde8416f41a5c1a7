//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the exchange's core workflows. Each use case owns its state and
//! exposes only its named operations.
//!
//! Use cases:
//! - `LiquidityPoolLedger`: Pool registry, liquidity add/remove
//! - `SwapEngine`: Constant-product swaps on ledger pools
//! - `OracleStore`: Owner-gated port performance records
//! - `OracleFeedService` / `FeedScheduler`: Scheduled oracle updates

pub mod feed_service;
pub mod liquidity_ledger;
pub mod oracle_store;
pub mod swap_engine;

pub use feed_service::{CycleReport, FeedError, FeedPhase, FeedScheduler, OracleFeedService, TriggerPolicy};
pub use liquidity_ledger::{AddLiquidity, LiquidityPoolLedger, RemoveLiquidity};
pub use oracle_store::{OracleSnapshot, OracleStore};
pub use swap_engine::{SwapEngine, SwapRequest};
