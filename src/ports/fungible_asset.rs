//! Fungible Asset Port - Token Balance and Transfer Interface
//!
//! Defines the balance/approve/transfer semantics the pool ledger
//! consumes from token contracts. The ledger never implements these;
//! it only checks every call's success flag and aborts the enclosing
//! operation when a call reports failure.
//!
//! The trait is synchronous: ledger writes are serialized through a
//! single writer and each call confirms before the next one starts.

use alloy::primitives::U256;

use crate::domain::pool::{AccountId, AssetId};

/// ERC-20 style fungible asset operations, addressed per asset.
///
/// Implementors only need to apply calls; the ledger reverses the
/// calls of a failed write with opposite transfers and approvals.
pub trait FungibleAssets: Send + Sync + 'static {
  /// Balance of `account` in `asset`.
  fn balance_of(&self, asset: AssetId, account: AccountId) -> U256;

  /// Remaining allowance `owner` granted to `spender` for `asset`.
  fn allowance(&self, asset: AssetId, owner: AccountId, spender: AccountId) -> U256;

  /// Let `spender` pull up to `amount` of `owner`'s `asset`.
  fn approve(
    &mut self,
    asset: AssetId,
    owner: AccountId,
    spender: AccountId,
    amount: U256,
  ) -> bool;

  /// Move `amount` of `asset` from `owner` to `spender`, consuming allowance.
  ///
  /// Returns `false` (and changes nothing) when balance or allowance
  /// is insufficient.
  fn transfer_from(
    &mut self,
    asset: AssetId,
    owner: AccountId,
    spender: AccountId,
    amount: U256,
  ) -> bool;

  /// Move `amount` of `asset` held by `from` to `to`.
  fn transfer(&mut self, asset: AssetId, from: AccountId, to: AccountId, amount: U256) -> bool;
}
