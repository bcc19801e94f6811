//! In-memory successor escrow.
//!
//! [`MemoryMigrator`] records every lock handed over by `migrate` and lets
//! its owner release them once they expire. Drivers and tests share it with
//! the engine through an `Arc`.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::traits::Migrator;
use crate::types::{AccountId, LockedBalance};

/// Successor that keeps migrated locks in memory.
#[derive(Debug)]
pub struct MemoryMigrator {
    account: AccountId,
    locks: RwLock<HashMap<AccountId, LockedBalance>>,
}

impl MemoryMigrator {
    /// Create a migrator whose custody lives at `account` in the vault.
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Lock taken over for `owner`, or the empty lock.
    pub fn locked(&self, owner: &AccountId) -> LockedBalance {
        self.locks.read().get(owner).copied().unwrap_or_default()
    }

    /// Total units taken over.
    pub fn custody(&self) -> u128 {
        self.locks.read().values().map(|l| l.amount).sum()
    }

    /// Drop `owner`'s lock if it has expired at `now`. Returns the released
    /// amount, zero when nothing was released.
    pub fn release(&self, owner: &AccountId, now: u64) -> u128 {
        let mut locks = self.locks.write();
        if !locks.get(owner).is_some_and(|l| l.is_expired(now)) {
            return 0;
        }
        locks.remove(owner).map_or(0, |l| l.amount)
    }
}

impl Migrator for MemoryMigrator {
    fn account(&self) -> AccountId {
        self.account
    }

    fn receive(&self, owner: &AccountId, lock: LockedBalance) {
        self.locks.write().insert(*owner, lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(amount: u128, unlock_time: u64) -> LockedBalance {
        LockedBalance {
            amount,
            unlock_time,
            start: 0,
        }
    }

    #[test]
    fn receive_records_lock() {
        let m = MemoryMigrator::new(AccountId::from_label("successor"));
        let alice = AccountId::from_label("alice");
        assert!(m.locked(&alice).is_empty());

        m.receive(&alice, lock(700, 50));
        assert_eq!(m.locked(&alice), lock(700, 50));
        assert_eq!(m.custody(), 700);
        assert_eq!(Migrator::account(&m), AccountId::from_label("successor"));
    }

    #[test]
    fn release_waits_for_expiry() {
        let m = MemoryMigrator::new(AccountId::ZERO);
        let alice = AccountId::from_label("alice");
        m.receive(&alice, lock(300, 100));

        assert_eq!(m.release(&alice, 99), 0);
        assert_eq!(m.custody(), 300);
        assert_eq!(m.release(&alice, 100), 300);
        assert!(m.locked(&alice).is_empty());
        assert_eq!(m.release(&alice, 200), 0);
    }
}
