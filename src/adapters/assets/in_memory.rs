//! In-Memory Asset Bank - Fungible Asset Balances for Local Runs
//!
//! Implements the `FungibleAssets` port with plain maps of balances
//! and allowances. Each asset is issued once with a fixed initial
//! supply; there is no later minting or burning.

use std::collections::{HashMap, HashSet};

use alloy::primitives::U256;
use tracing::debug;

use crate::domain::error::LedgerError;
use crate::domain::pool::{AccountId, AssetId};
use crate::ports::fungible_asset::FungibleAssets;

/// Balance and allowance book for any number of fungible assets.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetBank {
    /// Assets that have been issued.
    issued: HashSet<AssetId>,
    /// Balance per (asset, account).
    balances: HashMap<(AssetId, AccountId), U256>,
    /// Allowance per (asset, owner, spender).
    allowances: HashMap<(AssetId, AccountId, AccountId), U256>,
}

impl InMemoryAssetBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `asset` with its whole `initial_supply` credited to `treasury`.
    ///
    /// # Errors
    /// `Validation` if the asset was already issued.
    pub fn issue(
        &mut self,
        asset: AssetId,
        treasury: AccountId,
        initial_supply: U256,
    ) -> Result<(), LedgerError> {
        if !self.issued.insert(asset) {
            return Err(LedgerError::validation(format!(
                "asset {asset} was already issued"
            )));
        }
        self.balances.insert((asset, treasury), initial_supply);
        debug!(%asset, %treasury, supply = %initial_supply, "Asset issued");
        Ok(())
    }

    /// Whether `asset` has been issued.
    pub fn is_issued(&self, asset: AssetId) -> bool {
        self.issued.contains(&asset)
    }

    fn debit(&mut self, asset: AssetId, account: AccountId, amount: U256) -> bool {
        let balance = self.balance_of(asset, account);
        match balance.checked_sub(amount) {
            Some(rest) => {
                self.balances.insert((asset, account), rest);
                true
            }
            None => false,
        }
    }

    fn credit(&mut self, asset: AssetId, account: AccountId, amount: U256) -> bool {
        let balance = self.balance_of(asset, account);
        match balance.checked_add(amount) {
            Some(total) => {
                self.balances.insert((asset, account), total);
                true
            }
            None => false,
        }
    }
}

impl FungibleAssets for InMemoryAssetBank {
    fn balance_of(&self, asset: AssetId, account: AccountId) -> U256 {
        self.balances
            .get(&(asset, account))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn allowance(&self, asset: AssetId, owner: AccountId, spender: AccountId) -> U256 {
        self.allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn approve(&mut self, asset: AssetId, owner: AccountId, spender: AccountId, amount: U256) -> bool {
        if !self.is_issued(asset) {
            return false;
        }
        self.allowances.insert((asset, owner, spender), amount);
        true
    }

    fn transfer_from(
        &mut self,
        asset: AssetId,
        owner: AccountId,
        spender: AccountId,
        amount: U256,
    ) -> bool {
        if !self.is_issued(asset) {
            return false;
        }
        let allowance = self.allowance(asset, owner, spender);
        let Some(remaining) = allowance.checked_sub(amount) else {
            return false;
        };
        if self.balance_of(asset, owner) < amount {
            return false;
        }
        if !self.debit(asset, owner, amount) {
            return false;
        }
        if !self.credit(asset, spender, amount) {
            // Unreachable in practice: supply is fixed so a credit cannot overflow.
            self.credit(asset, owner, amount);
            return false;
        }
        self.allowances.insert((asset, owner, spender), remaining);
        true
    }

    fn transfer(&mut self, asset: AssetId, from: AccountId, to: AccountId, amount: U256) -> bool {
        if !self.is_issued(asset) || self.balance_of(asset, from) < amount {
            return false;
        }
        self.debit(asset, from, amount) && self.credit(asset, to, amount)
    }
}
