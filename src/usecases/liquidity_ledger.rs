//! Liquidity Pool Ledger - Reserves and Liquidity Shares
//!
//! Owns every pool keyed by its unordered asset pair and routes all
//! pool mutation through `create_pool`, `add_liquidity`,
//! `remove_liquidity` and `swap` (see `swap_engine`).
//!
//! Every write is staged against a private copy of the touched pool
//! and committed only when every step has succeeded. Asset calls are
//! journaled and compensated in reverse when a later step fails. A
//! failed write leaves no trace: no reserves, shares, balances,
//! allowances or events change, and a lazily created pool is not kept.
//!
//! `&mut self` on every write gives a total order per ledger; share a
//! ledger across tasks behind a mutex.

use std::collections::HashMap;

use alloy::primitives::U256;
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::amm;
use crate::domain::error::LedgerError;
use crate::domain::pool::{
  AccountId, AssetId, LedgerEvent, LiquidityAction, LiquidityReceipt, Pool, PoolInfo, PoolKey,
};
use crate::ports::fungible_asset::FungibleAssets;

/// Deposit request for `add_liquidity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddLiquidity {
  /// First asset of the pair.
  pub asset_a: AssetId,
  /// Second asset of the pair.
  pub asset_b: AssetId,
  /// Maximum amount of `asset_a` to deposit.
  pub amount_a: U256,
  /// Maximum amount of `asset_b` to deposit.
  pub amount_b: U256,
  /// Least acceptable amount of `asset_a` actually consumed.
  pub min_amount_a: U256,
  /// Least acceptable amount of `asset_b` actually consumed.
  pub min_amount_b: U256,
  /// Account supplying the assets and receiving the shares.
  pub provider: AccountId,
}

/// Withdrawal request for `remove_liquidity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveLiquidity {
  /// First asset of the pair.
  pub asset_a: AssetId,
  /// Second asset of the pair.
  pub asset_b: AssetId,
  /// Shares to burn.
  pub shares: U256,
  /// Least acceptable amount of `asset_a` returned.
  pub min_amount_a: U256,
  /// Least acceptable amount of `asset_b` returned.
  pub min_amount_b: U256,
  /// Share holder receiving the assets.
  pub provider: AccountId,
}

/// Constant-product pool ledger over a fungible asset bank.
#[derive(Debug, Clone)]
pub struct LiquidityPoolLedger<B: FungibleAssets> {
  /// Account that holds pooled assets on behalf of the ledger.
  custody: AccountId,
  /// Pricing reference asset (e.g. wrapped native currency).
  reference_asset: AssetId,
  /// Fungible asset bank.
  assets: B,
  /// Pools by canonical pair key.
  pools: HashMap<PoolKey, Pool>,
  /// Committed events not yet drained by the caller.
  events: Vec<LedgerEvent>,
}

impl<B: FungibleAssets> LiquidityPoolLedger<B> {
  /// Create a ledger whose pooled assets are held by `custody`.
  ///
  /// First deposits into a pool that contains `reference_asset` mint
  /// shares equal to the reference-side amount.
  pub fn new(custody: AccountId, reference_asset: AssetId, assets: B) -> Self {
    Self {
      custody,
      reference_asset,
      assets,
      pools: HashMap::new(),
      events: Vec::new(),
    }
  }

  /// Ledger custody account (the spender callers must approve).
  pub fn custody(&self) -> AccountId {
    self.custody
  }

  /// Pricing reference asset.
  pub fn reference_asset(&self) -> AssetId {
    self.reference_asset
  }

  /// Read access to the asset bank.
  pub fn assets(&self) -> &B {
    &self.assets
  }

  /// Mutable access to the asset bank for approvals and transfers
  /// that do not involve pool state.
  pub fn assets_mut(&mut self) -> &mut B {
    &mut self.assets
  }

  /// Number of pools created so far.
  pub fn pool_count(&self) -> usize {
    self.pools.len()
  }

  /// Take all committed events in commit order.
  pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
    std::mem::take(&mut self.events)
  }

  /// Create the pool for a pair, or return the existing one.
  ///
  /// # Errors
  /// `Validation` when both assets are the same.
  pub fn create_pool(&mut self, asset_a: AssetId, asset_b: AssetId) -> Result<PoolKey, LedgerError> {
    let key = PoolKey::new(asset_a, asset_b)?;
    if !self.pools.contains_key(&key) {
      self.pools.insert(key, Pool::new(key));
      self.events.push(LedgerEvent::PoolCreated { pool: key });
      info!(pool = %key, "Pool created");
    }
    Ok(key)
  }

  /// Reserves oriented as `(reserve of asset_a, reserve of asset_b)`.
  ///
  /// A pair without a pool reports zero reserves.
  pub fn get_reserves(&self, asset_a: AssetId, asset_b: AssetId) -> Result<(U256, U256), LedgerError> {
    let key = PoolKey::new(asset_a, asset_b)?;
    Ok(
      self
        .pools
        .get(&key)
        .map(|pool| pool.oriented_reserves(asset_a))
        .unwrap_or((U256::ZERO, U256::ZERO)),
    )
  }

  /// Pool summary oriented by `asset_a`.
  pub fn get_pool_info(&self, asset_a: AssetId, asset_b: AssetId) -> Result<PoolInfo, LedgerError> {
    let key = PoolKey::new(asset_a, asset_b)?;
    Ok(match self.pools.get(&key) {
      Some(pool) => pool.info(asset_a),
      None => Pool::new(key).info(asset_a),
    })
  }

  /// Shares of the pair's pool held by `provider`.
  pub fn share_balance(
    &self,
    asset_a: AssetId,
    asset_b: AssetId,
    provider: AccountId,
  ) -> Result<U256, LedgerError> {
    let key = PoolKey::new(asset_a, asset_b)?;
    Ok(
      self
        .pools
        .get(&key)
        .map(|pool| pool.share_of(&provider))
        .unwrap_or(U256::ZERO),
    )
  }

  pub(crate) fn has_pool(&self, key: &PoolKey) -> bool {
    self.pools.contains_key(key)
  }

  pub(crate) fn pool(&self, key: &PoolKey) -> Option<&Pool> {
    self.pools.get(key)
  }

  /// Deposit both assets and mint liquidity shares.
  ///
  /// An empty pool takes both amounts as given and sets the price.
  /// A funded pool consumes at most the supplied amounts, reduced to
  /// the current reserve ratio, and mints
  /// `min(a * total / reserve_a, b * total / reserve_b)` shares.
  pub fn add_liquidity(&mut self, req: AddLiquidity) -> Result<LiquidityReceipt, LedgerError> {
    let key = PoolKey::new(req.asset_a, req.asset_b)?;
    if req.amount_a.is_zero() || req.amount_b.is_zero() {
      return Err(LedgerError::validation("liquidity amounts must be positive"));
    }
    let reference = self.reference_asset;

    let result = self.transact(key, |pool, assets| {
      let (reserve_a, reserve_b) = pool.oriented_reserves(req.asset_a);

      let (used_a, used_b, shares) = if pool.is_empty() {
        let shares = if req.asset_a == reference {
          req.amount_a
        } else if req.asset_b == reference {
          req.amount_b
        } else {
          amm::geometric_mean_shares(req.amount_a, req.amount_b)?
        };
        (req.amount_a, req.amount_b, shares)
      } else {
        let optimal_b = amm::quote(req.amount_a, reserve_a, reserve_b)?;
        let (used_a, used_b) = if optimal_b <= req.amount_b {
          (req.amount_a, optimal_b)
        } else {
          (amm::quote(req.amount_b, reserve_b, reserve_a)?, req.amount_b)
        };
        let total = pool.total_shares();
        let shares = amm::proportional_shares(used_a, total, reserve_a)?
          .min(amm::proportional_shares(used_b, total, reserve_b)?);
        (used_a, used_b, shares)
      };

      if used_a < req.min_amount_a {
        return Err(LedgerError::SlippageExceeded {
          what: "deposit amount_a",
          actual: used_a,
          minimum: req.min_amount_a,
        });
      }
      if used_b < req.min_amount_b {
        return Err(LedgerError::SlippageExceeded {
          what: "deposit amount_b",
          actual: used_b,
          minimum: req.min_amount_b,
        });
      }
      if shares.is_zero() {
        return Err(LedgerError::InsufficientLiquidity("deposit too small to mint shares"));
      }

      assets.pull(req.asset_a, req.provider, used_a)?;
      assets.pull(req.asset_b, req.provider, used_b)?;

      let new_a = reserve_a
        .checked_add(used_a)
        .ok_or(LedgerError::Overflow("reserve after deposit"))?;
      let new_b = reserve_b
        .checked_add(used_b)
        .ok_or(LedgerError::Overflow("reserve after deposit"))?;
      pool.set_oriented_reserves(req.asset_a, new_a, new_b);
      pool.mint_shares(req.provider, shares)?;

      let receipt = LiquidityReceipt {
        id: Uuid::new_v4(),
        pool: key,
        provider: req.provider,
        action: LiquidityAction::Added,
        asset_a: req.asset_a,
        asset_b: req.asset_b,
        amount_a: used_a,
        amount_b: used_b,
        shares,
        timestamp: Utc::now(),
      };
      Ok((receipt.clone(), LedgerEvent::LiquidityAdded(receipt)))
    });

    match &result {
      Ok(receipt) => info!(
        pool = %key,
        provider = %receipt.provider,
        amount_a = %receipt.amount_a,
        amount_b = %receipt.amount_b,
        shares = %receipt.shares,
        "Liquidity added"
      ),
      Err(e) => warn!(pool = %key, provider = %req.provider, error = %e, "Add liquidity rejected"),
    }
    result
  }

  /// Burn shares and return the proportional reserves to the provider.
  ///
  /// Each asset returned is `floor(reserve * shares / total_shares)`.
  pub fn remove_liquidity(&mut self, req: RemoveLiquidity) -> Result<LiquidityReceipt, LedgerError> {
    let key = PoolKey::new(req.asset_a, req.asset_b)?;
    if req.shares.is_zero() {
      return Err(LedgerError::validation("shares to remove must be positive"));
    }
    if !self.has_pool(&key) {
      return Err(LedgerError::InsufficientLiquidity("no pool for pair"));
    }

    let result = self.transact(key, |pool, assets| {
      if pool.is_empty() {
        return Err(LedgerError::InsufficientLiquidity("pool is empty"));
      }
      let held = pool.share_of(&req.provider);
      if req.shares > held {
        return Err(LedgerError::validation(format!(
          "provider {} holds {held} shares, cannot remove {}",
          req.provider, req.shares
        )));
      }

      let total = pool.total_shares();
      let (reserve_a, reserve_b) = pool.oriented_reserves(req.asset_a);
      let out_a = amm::withdrawal_amount(reserve_a, req.shares, total)?;
      let out_b = amm::withdrawal_amount(reserve_b, req.shares, total)?;

      if out_a < req.min_amount_a {
        return Err(LedgerError::SlippageExceeded {
          what: "withdrawal amount_a",
          actual: out_a,
          minimum: req.min_amount_a,
        });
      }
      if out_b < req.min_amount_b {
        return Err(LedgerError::SlippageExceeded {
          what: "withdrawal amount_b",
          actual: out_b,
          minimum: req.min_amount_b,
        });
      }
      if out_a.is_zero() && out_b.is_zero() {
        return Err(LedgerError::InsufficientLiquidity("shares too small to withdraw anything"));
      }

      // Effects before interactions.
      pool.burn_shares(req.provider, req.shares)?;
      pool.set_oriented_reserves(req.asset_a, reserve_a - out_a, reserve_b - out_b);

      assets.pay_out(req.asset_a, req.provider, out_a)?;
      assets.pay_out(req.asset_b, req.provider, out_b)?;

      let receipt = LiquidityReceipt {
        id: Uuid::new_v4(),
        pool: key,
        provider: req.provider,
        action: LiquidityAction::Removed,
        asset_a: req.asset_a,
        asset_b: req.asset_b,
        amount_a: out_a,
        amount_b: out_b,
        shares: req.shares,
        timestamp: Utc::now(),
      };
      Ok((receipt.clone(), LedgerEvent::LiquidityRemoved(receipt)))
    });

    match &result {
      Ok(receipt) => info!(
        pool = %key,
        provider = %receipt.provider,
        amount_a = %receipt.amount_a,
        amount_b = %receipt.amount_b,
        shares = %receipt.shares,
        "Liquidity removed"
      ),
      Err(e) => warn!(pool = %key, provider = %req.provider, error = %e, "Remove liquidity rejected"),
    }
    result
  }

  /// Run `op` against a staged copy of the pool and a journal over
  /// the asset bank.
  ///
  /// Commits pool and event together on `Ok`. On `Err` the staged pool
  /// is discarded and every asset call `op` made is compensated in
  /// reverse order.
  pub(crate) fn transact<T>(
    &mut self,
    key: PoolKey,
    op: impl FnOnce(&mut Pool, &mut AssetJournal<'_, B>) -> Result<(T, LedgerEvent), LedgerError>,
  ) -> Result<T, LedgerError> {
    let existing = self.pools.get(&key);
    let created = existing.is_none();
    let mut pool = existing.cloned().unwrap_or_else(|| Pool::new(key));
    let mut journal = AssetJournal::new(&mut self.assets, self.custody);

    let (out, event) = match op(&mut pool, &mut journal) {
      Ok(done) => done,
      Err(e) => {
        journal.rollback();
        return Err(e);
      }
    };

    if created {
      self.events.push(LedgerEvent::PoolCreated { pool: key });
      debug!(pool = %key, "Pool created lazily");
    }
    self.pools.insert(key, pool);
    self.events.push(event);
    Ok(out)
  }
}

// ── Asset Journal ───────────────────────────────────────────

/// Compensation for one asset call already applied to the bank.
#[derive(Debug, Clone, Copy)]
enum Undo {
  /// Return pulled funds and restore the allowance they consumed.
  Pull {
    asset: AssetId,
    owner: AccountId,
    amount: U256,
    allowance: U256,
  },
  /// Reclaim funds paid out of custody.
  PayOut {
    asset: AssetId,
    to: AccountId,
    amount: U256,
  },
}

/// Asset calls made by one ledger write.
///
/// Calls go straight to the bank; only the accounts a write touches
/// are recorded, so the cost of a write does not depend on the size
/// of the bank.
pub(crate) struct AssetJournal<'a, B: FungibleAssets> {
  assets: &'a mut B,
  custody: AccountId,
  undo: Vec<Undo>,
}

impl<'a, B: FungibleAssets> AssetJournal<'a, B> {
  fn new(assets: &'a mut B, custody: AccountId) -> Self {
    Self {
      assets,
      custody,
      undo: Vec::new(),
    }
  }

  /// Pull `amount` of `asset` from `owner` into custody.
  pub(crate) fn pull(&mut self, asset: AssetId, owner: AccountId, amount: U256) -> Result<(), LedgerError> {
    let allowance = self.assets.allowance(asset, owner, self.custody);
    if !self.assets.transfer_from(asset, owner, self.custody, amount) {
      return Err(LedgerError::InsufficientBalanceOrAllowance {
        asset: asset.to_string(),
        owner: owner.to_string(),
        amount,
      });
    }
    self.undo.push(Undo::Pull {
      asset,
      owner,
      amount,
      allowance,
    });
    Ok(())
  }

  /// Send `amount` of `asset` from custody to `to`.
  pub(crate) fn pay_out(&mut self, asset: AssetId, to: AccountId, amount: U256) -> Result<(), LedgerError> {
    if amount.is_zero() {
      return Ok(());
    }
    if !self.assets.transfer(asset, self.custody, to, amount) {
      return Err(LedgerError::LedgerRejected(format!(
        "transfer of {amount} {asset} to {to} failed"
      )));
    }
    self.undo.push(Undo::PayOut { asset, to, amount });
    Ok(())
  }

  /// Reverse every recorded call, newest first.
  fn rollback(self) {
    let Self {
      assets,
      custody,
      undo,
    } = self;
    for step in undo.into_iter().rev() {
      let restored = match step {
        Undo::Pull {
          asset,
          owner,
          amount,
          allowance,
        } => assets.transfer(asset, custody, owner, amount) && assets.approve(asset, owner, custody, allowance),
        Undo::PayOut { asset, to, amount } => assets.transfer(asset, to, custody, amount),
      };
      if restored {
        debug!(?step, "Asset call compensated");
      } else {
        error!(?step, "Asset compensation refused; bank no longer matches pool reserves");
      }
    }
  }
}
