//! Current lock per account.

use std::collections::HashMap;

use ebb_core::error::EscrowError;
use ebb_core::types::{AccountId, LockedBalance};
use serde::{Deserialize, Serialize};

/// A checked lock replacement, applied with [`LockStore::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockUpdate {
    pub account: AccountId,
    pub lock: LockedBalance,
    /// Locked supply after the update.
    pub supply: u128,
}

/// Each account's current [`LockedBalance`] and the total locked amount.
///
/// Accounts that never locked (or have withdrawn) read as
/// [`LockedBalance::EMPTY`]; cleared entries are removed from the map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct LockStore {
    locks: HashMap<AccountId, LockedBalance>,
    /// Sum of all locked amounts.
    supply: u128,
}

impl LockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lock of `account`.
    pub fn get(&self, account: &AccountId) -> LockedBalance {
        self.locks
            .get(account)
            .copied()
            .unwrap_or(LockedBalance::EMPTY)
    }

    /// Check a replacement lock for `account` and compute the resulting supply.
    pub fn prepare(&self, account: &AccountId, lock: LockedBalance) -> Result<LockUpdate, EscrowError> {
        let supply = self
            .supply
            .checked_sub(self.get(account).amount)
            .and_then(|s| s.checked_add(lock.amount))
            .ok_or(EscrowError::ArithmeticOverflow)?;
        Ok(LockUpdate {
            account: *account,
            lock,
            supply,
        })
    }

    /// Apply a prepared update.
    pub fn apply(&mut self, update: LockUpdate) {
        if update.lock.is_empty() {
            self.locks.remove(&update.account);
        } else {
            self.locks.insert(update.account, update.lock);
        }
        self.supply = update.supply;
    }

    /// Total amount locked across all accounts.
    pub fn supply(&self) -> u128 {
        self.supply
    }

    /// Number of accounts holding a lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
