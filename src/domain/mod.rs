//! Domain layer - Core exchange and oracle models.
//!
//! Pure types and math for the port token exchange: constant-product
//! pricing, pool records, receipts, and oracle records.
//! No I/O here (hexagonal architecture inner ring).
//! All amounts are 256-bit integers in each asset's smallest unit.

pub mod amm;
pub mod error;
pub mod oracle;
pub mod pool;

// Re-export core types for convenience
pub use error::LedgerError;
pub use oracle::{OracleRecord, PerformanceIndex, PortCode};
pub use pool::{
    AccountId, AssetId, LedgerEvent, LiquidityAction, LiquidityReceipt, Pool, PoolInfo,
    PoolKey, SwapReceipt,
};
