//! Liquidity pool records, receipts and ledger events.
//!
//! A pool is keyed by an unordered pair of asset identifiers. The key
//! stores the pair in canonical (ascending address) order; callers may
//! name the assets in either order and receive amounts oriented the way
//! they asked.

use std::collections::HashMap;
use std::fmt;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::LedgerError;

/// Account or contract identity (traders, providers, feeders, the ledger).
pub type AccountId = Address;

/// Fungible asset identifier (token contract address).
pub type AssetId = Address;

// ────────────────────────────────────────────
// Pool key
// ────────────────────────────────────────────

/// Unordered asset pair identifying a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    asset0: AssetId,
    asset1: AssetId,
}

impl PoolKey {
    /// Build the canonical key for a pair of distinct assets.
    ///
    /// # Errors
    /// `Validation` when both sides name the same asset.
    pub fn new(asset_a: AssetId, asset_b: AssetId) -> Result<Self, LedgerError> {
        if asset_a == asset_b {
            return Err(LedgerError::validation(format!(
                "pool assets must differ, got {asset_a} twice"
            )));
        }
        let (asset0, asset1) = if asset_a < asset_b {
            (asset_a, asset_b)
        } else {
            (asset_b, asset_a)
        };
        Ok(Self { asset0, asset1 })
    }

    /// Lower-ordered asset of the pair.
    pub fn asset0(&self) -> AssetId {
        self.asset0
    }

    /// Higher-ordered asset of the pair.
    pub fn asset1(&self) -> AssetId {
        self.asset1
    }

    /// Whether `asset` is one side of this pair.
    pub fn contains(&self, asset: AssetId) -> bool {
        self.asset0 == asset || self.asset1 == asset
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset0, self.asset1)
    }
}

// ────────────────────────────────────────────
// Pool state
// ────────────────────────────────────────────

/// Reserves and liquidity-share accounting for one asset pair.
///
/// Invariant: `reserve0 == 0 ⇔ reserve1 == 0 ⇔ total_shares == 0`,
/// and the share balances always sum to `total_shares`. Fields are
/// private; only the ledger mutates a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    key: PoolKey,
    reserve0: U256,
    reserve1: U256,
    total_shares: U256,
    shares: HashMap<AccountId, U256>,
}

impl Pool {
    /// A fresh, empty pool.
    pub fn new(key: PoolKey) -> Self {
        Self {
            key,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            total_shares: U256::ZERO,
            shares: HashMap::new(),
        }
    }

    /// Pool key.
    pub fn key(&self) -> PoolKey {
        self.key
    }

    /// True when the pool holds no reserves and no shares.
    pub fn is_empty(&self) -> bool {
        self.total_shares.is_zero()
    }

    /// Total outstanding liquidity shares.
    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    /// Shares held by `provider`.
    pub fn share_of(&self, provider: &AccountId) -> U256 {
        self.shares.get(provider).copied().unwrap_or(U256::ZERO)
    }

    /// Number of providers holding a non-zero share balance.
    pub fn provider_count(&self) -> usize {
        self.shares.len()
    }

    /// Reserve held for `asset`, `None` if the asset is not in the pair.
    pub fn reserve_of(&self, asset: AssetId) -> Option<U256> {
        if asset == self.key.asset0 {
            Some(self.reserve0)
        } else if asset == self.key.asset1 {
            Some(self.reserve1)
        } else {
            None
        }
    }

    /// Reserves oriented as `(reserve of asset_a, reserve of asset_b)`.
    pub fn oriented_reserves(&self, asset_a: AssetId) -> (U256, U256) {
        if asset_a == self.key.asset0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    /// Overwrite both reserves, oriented by `asset_a`.
    pub(crate) fn set_oriented_reserves(&mut self, asset_a: AssetId, reserve_a: U256, reserve_b: U256) {
        if asset_a == self.key.asset0 {
            self.reserve0 = reserve_a;
            self.reserve1 = reserve_b;
        } else {
            self.reserve0 = reserve_b;
            self.reserve1 = reserve_a;
        }
    }

    /// Credit newly minted shares to `provider`.
    pub(crate) fn mint_shares(&mut self, provider: AccountId, shares: U256) -> Result<(), LedgerError> {
        let total = self
            .total_shares
            .checked_add(shares)
            .ok_or(LedgerError::Overflow("total shares"))?;
        let balance = self
            .share_of(&provider)
            .checked_add(shares)
            .ok_or(LedgerError::Overflow("provider shares"))?;
        self.total_shares = total;
        self.shares.insert(provider, balance);
        Ok(())
    }

    /// Debit and destroy `shares` held by `provider`.
    pub(crate) fn burn_shares(&mut self, provider: AccountId, shares: U256) -> Result<(), LedgerError> {
        let balance = self.share_of(&provider);
        let remaining = balance.checked_sub(shares).ok_or_else(|| {
            LedgerError::validation(format!(
                "provider {provider} holds {balance} shares, cannot remove {shares}"
            ))
        })?;
        self.total_shares = self
            .total_shares
            .checked_sub(shares)
            .ok_or_else(|| LedgerError::LedgerRejected("share supply underflow".to_string()))?;
        if remaining.is_zero() {
            self.shares.remove(&provider);
        } else {
            self.shares.insert(provider, remaining);
        }
        Ok(())
    }

    /// Read-only summary oriented by `asset_a`.
    pub fn info(&self, asset_a: AssetId) -> PoolInfo {
        let asset_b = if asset_a == self.key.asset0 {
            self.key.asset1
        } else {
            self.key.asset0
        };
        let (reserve_a, reserve_b) = self.oriented_reserves(asset_a);
        PoolInfo {
            key: self.key,
            asset_a,
            asset_b,
            reserve_a,
            reserve_b,
            total_shares: self.total_shares,
            provider_count: self.shares.len(),
        }
    }
}

/// Read-only pool summary returned by `get_pool_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    /// Canonical pool key.
    pub key: PoolKey,
    /// First asset as named by the caller.
    pub asset_a: AssetId,
    /// Second asset as named by the caller.
    pub asset_b: AssetId,
    /// Reserve of `asset_a`.
    pub reserve_a: U256,
    /// Reserve of `asset_b`.
    pub reserve_b: U256,
    /// Outstanding liquidity shares.
    pub total_shares: U256,
    /// Providers with a non-zero share balance.
    pub provider_count: usize,
}

// ────────────────────────────────────────────
// Receipts and events
// ────────────────────────────────────────────

/// Final amounts moved by a committed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    /// Receipt identifier.
    pub id: Uuid,
    /// Pool traded against.
    pub pool: PoolKey,
    /// Trader that supplied the input.
    pub trader: AccountId,
    /// Asset paid in.
    pub asset_in: AssetId,
    /// Asset paid out.
    pub asset_out: AssetId,
    /// Amount pulled from the trader.
    pub amount_in: U256,
    /// Amount sent to the trader.
    pub amount_out: U256,
    /// Input-side reserve after the swap.
    pub reserve_in_after: U256,
    /// Output-side reserve after the swap.
    pub reserve_out_after: U256,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
}

/// Direction of a liquidity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityAction {
    Added,
    Removed,
}

/// Final amounts moved by a committed liquidity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityReceipt {
    /// Receipt identifier.
    pub id: Uuid,
    /// Pool changed.
    pub pool: PoolKey,
    /// Liquidity provider.
    pub provider: AccountId,
    /// Added or removed.
    pub action: LiquidityAction,
    /// First asset as named by the caller.
    pub asset_a: AssetId,
    /// Second asset as named by the caller.
    pub asset_b: AssetId,
    /// Amount of `asset_a` deposited or withdrawn.
    pub amount_a: U256,
    /// Amount of `asset_b` deposited or withdrawn.
    pub amount_b: U256,
    /// Shares minted or burned.
    pub shares: U256,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
}

/// Event emitted by the ledger for every committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    PoolCreated { pool: PoolKey },
    LiquidityAdded(LiquidityReceipt),
    LiquidityRemoved(LiquidityReceipt),
    Swap(SwapReceipt),
}
