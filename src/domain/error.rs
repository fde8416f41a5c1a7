//! Ledger error taxonomy.
//!
//! Every pool-ledger and oracle-store operation fails with exactly one
//! of these reasons. A failed operation never leaves partial effects.

use alloy::primitives::U256;
use thiserror::Error;

/// Named failure reason for ledger and oracle-store writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Malformed input: identical-asset pool, zero amount, out-of-range index.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Caller is not the registered owner/feeder identity.
    #[error("caller {caller} is not authorized to {action}")]
    Authorization {
        /// Identity that attempted the write.
        caller: String,
        /// Privileged action that was attempted.
        action: &'static str,
    },

    /// Pool is empty or too shallow for the requested trade.
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(&'static str),

    /// Computed amount fell outside the caller-specified bound.
    #[error("slippage exceeded for {what}: got {actual}, minimum {minimum}")]
    SlippageExceeded {
        /// Which amount violated its bound.
        what: &'static str,
        /// Amount the operation would have produced.
        actual: U256,
        /// Caller-supplied minimum.
        minimum: U256,
    },

    /// Balance or allowance precondition of an asset pull was not met.
    #[error("insufficient balance or allowance of {asset} for {owner}: need {amount}")]
    InsufficientBalanceOrAllowance {
        /// Asset being pulled.
        asset: String,
        /// Account the asset was pulled from.
        owner: String,
        /// Amount requested.
        amount: U256,
    },

    /// An asset transfer failed after the operation was partially computed.
    #[error("ledger rejected operation: {0}")]
    LedgerRejected(String),

    /// 256-bit arithmetic would have overflowed.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl LedgerError {
    /// Convenience constructor for validation failures.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
