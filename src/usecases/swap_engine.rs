//! Swap Engine - Constant-Product Trades Against Ledger Pools
//!
//! Prices exact-input swaps with the 0.3% fee and applies them to the
//! pool ledger as one journaled transaction:
//!
//! 1. Pull `amount_in` from the trader (requires prior allowance)
//! 2. Price against the pre-trade reserves, enforce `min_amount_out`
//! 3. Update reserves
//! 4. Pay `amount_out` to the trader and emit a receipt
//!
//! A failure at any step discards the whole swap.

use alloy::primitives::U256;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::amm;
use crate::domain::error::LedgerError;
use crate::domain::pool::{AccountId, AssetId, LedgerEvent, PoolKey, SwapReceipt};
use crate::ports::fungible_asset::FungibleAssets;

use super::liquidity_ledger::LiquidityPoolLedger;

/// Exact-input swap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
  /// Asset the trader pays.
  pub asset_in: AssetId,
  /// Asset the trader receives.
  pub asset_out: AssetId,
  /// Exact amount of `asset_in` to pay.
  pub amount_in: U256,
  /// Least acceptable amount of `asset_out`.
  pub min_amount_out: U256,
  /// Paying and receiving account.
  pub trader: AccountId,
}

/// Swap operations on the pool ledger.
///
/// Implemented for every ledger so callers reach swaps and liquidity
/// through the same single-writer owner.
pub trait SwapEngine {
  /// Output for swapping `amount_in` of `asset_in` into the pair's pool.
  fn get_amount_out_for(
    &self,
    asset_in: AssetId,
    asset_out: AssetId,
    amount_in: U256,
  ) -> Result<U256, LedgerError>;

  /// Execute an exact-input swap.
  fn swap(&mut self, req: SwapRequest) -> Result<SwapReceipt, LedgerError>;
}

impl<B: FungibleAssets> SwapEngine for LiquidityPoolLedger<B> {
  fn get_amount_out_for(
    &self,
    asset_in: AssetId,
    asset_out: AssetId,
    amount_in: U256,
  ) -> Result<U256, LedgerError> {
    let key = PoolKey::new(asset_in, asset_out)?;
    let pool = self
      .pool(&key)
      .ok_or(LedgerError::InsufficientLiquidity("no pool for pair"))?;
    let (reserve_in, reserve_out) = pool.oriented_reserves(asset_in);
    amm::get_amount_out(amount_in, reserve_in, reserve_out)
  }

  #[instrument(skip(self), fields(asset_in = %req.asset_in, asset_out = %req.asset_out, amount_in = %req.amount_in))]
  fn swap(&mut self, req: SwapRequest) -> Result<SwapReceipt, LedgerError> {
    let key = PoolKey::new(req.asset_in, req.asset_out)?;
    if req.amount_in.is_zero() {
      return Err(LedgerError::validation("swap input amount must be positive"));
    }
    if !self.has_pool(&key) {
      return Err(LedgerError::InsufficientLiquidity("no pool for pair"));
    }

    let result = self.transact(key, |pool, assets| {
      // 1. Pull input.
      assets.pull(req.asset_in, req.trader, req.amount_in)?;

      // 2. Price against pre-trade reserves.
      let (reserve_in, reserve_out) = pool.oriented_reserves(req.asset_in);
      let amount_out = amm::get_amount_out(req.amount_in, reserve_in, reserve_out)?;
      if amount_out.is_zero() {
        return Err(LedgerError::InsufficientLiquidity("trade too small for pool depth"));
      }
      if amount_out < req.min_amount_out {
        return Err(LedgerError::SlippageExceeded {
          what: "swap amount_out",
          actual: amount_out,
          minimum: req.min_amount_out,
        });
      }

      // 3. Effects before the outbound transfer.
      let reserve_in_after = reserve_in
        .checked_add(req.amount_in)
        .ok_or(LedgerError::Overflow("reserve after swap"))?;
      let reserve_out_after = reserve_out
        .checked_sub(amount_out)
        .ok_or(LedgerError::InsufficientLiquidity("output exceeds reserve"))?;
      pool.set_oriented_reserves(req.asset_in, reserve_in_after, reserve_out_after);

      // 4. Interaction.
      assets.pay_out(req.asset_out, req.trader, amount_out)?;

      let receipt = SwapReceipt {
        id: Uuid::new_v4(),
        pool: key,
        trader: req.trader,
        asset_in: req.asset_in,
        asset_out: req.asset_out,
        amount_in: req.amount_in,
        amount_out,
        reserve_in_after,
        reserve_out_after,
        timestamp: Utc::now(),
      };
      Ok((receipt.clone(), LedgerEvent::Swap(receipt)))
    });

    match &result {
      Ok(receipt) => info!(
        pool = %key,
        trader = %receipt.trader,
        amount_in = %receipt.amount_in,
        amount_out = %receipt.amount_out,
        "Swap executed"
      ),
      Err(e) => warn!(pool = %key, trader = %req.trader, error = %e, "Swap rejected"),
    }
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::assets::InMemoryAssetBank;
  use crate::usecases::liquidity_ledger::AddLiquidity;
  use alloy::primitives::Address;

  fn ether(n: u128) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
  }

  const WETH: Address = Address::repeat_byte(0xee);
  const PORT_TOKEN: Address = Address::repeat_byte(0x51);
  const CUSTODY: Address = Address::repeat_byte(0xdd);
  const LP: Address = Address::repeat_byte(0x01);
  const TRADER: Address = Address::repeat_byte(0x02);

  /// Bank that refuses every outbound transfer to one account.
  struct BlockingBank {
    inner: InMemoryAssetBank,
    blocked: Address,
  }

  impl FungibleAssets for BlockingBank {
    fn balance_of(&self, asset: AssetId, account: AccountId) -> U256 {
      self.inner.balance_of(asset, account)
    }
    fn allowance(&self, asset: AssetId, owner: AccountId, spender: AccountId) -> U256 {
      self.inner.allowance(asset, owner, spender)
    }
    fn approve(&mut self, asset: AssetId, owner: AccountId, spender: AccountId, amount: U256) -> bool {
      self.inner.approve(asset, owner, spender, amount)
    }
    fn transfer_from(&mut self, asset: AssetId, owner: AccountId, spender: AccountId, amount: U256) -> bool {
      self.inner.transfer_from(asset, owner, spender, amount)
    }
    fn transfer(&mut self, asset: AssetId, from: AccountId, to: AccountId, amount: U256) -> bool {
      to != self.blocked && self.inner.transfer(asset, from, to, amount)
    }
  }

  fn funded_bank() -> InMemoryAssetBank {
    let mut bank = InMemoryAssetBank::new();
    bank.issue(WETH, LP, ether(10_000)).unwrap();
    bank.issue(PORT_TOKEN, LP, ether(10_000_000)).unwrap();
    bank.transfer(WETH, LP, TRADER, ether(10));
    for who in [LP, TRADER] {
      bank.approve(WETH, who, CUSTODY, U256::MAX);
      bank.approve(PORT_TOKEN, who, CUSTODY, U256::MAX);
    }
    bank
  }

  fn seed<B: FungibleAssets>(ledger: &mut LiquidityPoolLedger<B>) {
    ledger
      .add_liquidity(AddLiquidity {
        asset_a: WETH,
        asset_b: PORT_TOKEN,
        amount_a: ether(1_000),
        amount_b: ether(1_000_000),
        min_amount_a: U256::ZERO,
        min_amount_b: U256::ZERO,
        provider: LP,
      })
      .unwrap();
  }

  fn buy_tokens(min_out: U256) -> SwapRequest {
    SwapRequest {
      asset_in: WETH,
      asset_out: PORT_TOKEN,
      amount_in: ether(1),
      min_amount_out: min_out,
      trader: TRADER,
    }
  }

  #[test]
  fn test_swap_moves_reserves_and_balances() {
    let mut ledger = LiquidityPoolLedger::new(CUSTODY, WETH, funded_bank());
    seed(&mut ledger);

    let quoted = ledger.get_amount_out_for(WETH, PORT_TOKEN, ether(1)).unwrap();
    let receipt = ledger.swap(buy_tokens(ether(996))).unwrap();

    assert_eq!(receipt.amount_out, quoted);
    assert!(receipt.amount_out > ether(996) && receipt.amount_out < ether(997));
    assert_eq!(
      ledger.get_reserves(WETH, PORT_TOKEN).unwrap(),
      (ether(1_001), ether(1_000_000) - receipt.amount_out)
    );
    assert_eq!(ledger.assets().balance_of(PORT_TOKEN, TRADER), receipt.amount_out);
    assert_eq!(ledger.assets().balance_of(WETH, TRADER), ether(9));
  }

  #[test]
  fn test_swap_keeps_product_non_decreasing() {
    let mut ledger = LiquidityPoolLedger::new(CUSTODY, WETH, funded_bank());
    seed(&mut ledger);
    let (r_in, r_out) = ledger.get_reserves(WETH, PORT_TOKEN).unwrap();
    ledger.swap(buy_tokens(U256::ZERO)).unwrap();
    let (a_in, a_out) = ledger.get_reserves(WETH, PORT_TOKEN).unwrap();
    assert!(a_in * a_out >= r_in * r_out);
  }

  #[test]
  fn test_slippage_failure_discards_pull() {
    let mut ledger = LiquidityPoolLedger::new(CUSTODY, WETH, funded_bank());
    seed(&mut ledger);
    ledger.drain_events();
    let reserves = ledger.get_reserves(WETH, PORT_TOKEN).unwrap();

    let err = ledger.swap(buy_tokens(ether(997))).unwrap_err();

    assert!(matches!(err, LedgerError::SlippageExceeded { .. }));
    assert_eq!(ledger.get_reserves(WETH, PORT_TOKEN).unwrap(), reserves);
    assert_eq!(ledger.assets().balance_of(WETH, TRADER), ether(10));
    assert_eq!(ledger.assets().allowance(WETH, TRADER, CUSTODY), U256::MAX);
    assert!(ledger.drain_events().is_empty());
  }

  #[test]
  fn test_missing_allowance_aborts() {
    let mut bank = funded_bank();
    bank.approve(WETH, TRADER, CUSTODY, U256::ZERO);
    let mut ledger = LiquidityPoolLedger::new(CUSTODY, WETH, bank);
    seed(&mut ledger);

    let err = ledger.swap(buy_tokens(U256::ZERO)).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalanceOrAllowance { .. }));
  }

  #[test]
  fn test_failed_payout_rolls_back_everything() {
    let bank = BlockingBank {
      inner: funded_bank(),
      blocked: TRADER,
    };
    let mut ledger = LiquidityPoolLedger::new(CUSTODY, WETH, bank);
    seed(&mut ledger);
    let reserves = ledger.get_reserves(WETH, PORT_TOKEN).unwrap();

    let err = ledger.swap(buy_tokens(U256::ZERO)).unwrap_err();

    assert!(matches!(err, LedgerError::LedgerRejected(_)));
    assert_eq!(ledger.get_reserves(WETH, PORT_TOKEN).unwrap(), reserves);
    assert_eq!(ledger.assets().balance_of(WETH, TRADER), ether(10));
    assert_eq!(ledger.assets().balance_of(WETH, CUSTODY), ether(1_000));
  }

  #[test]
  fn test_swap_without_pool() {
    let mut ledger = LiquidityPoolLedger::new(CUSTODY, WETH, funded_bank());
    let err = ledger.swap(buy_tokens(U256::ZERO)).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientLiquidity(_)));
    assert_eq!(ledger.pool_count(), 0);
  }

  #[test]
  fn test_dust_swap_rejected() {
    let mut ledger = LiquidityPoolLedger::new(CUSTODY, WETH, funded_bank());
    seed(&mut ledger);
    let mut req = buy_tokens(U256::ZERO);
    req.amount_in = U256::from(1u64);
    let err = ledger.swap(req).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientLiquidity(_)));
  }
}
