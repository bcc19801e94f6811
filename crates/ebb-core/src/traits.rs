//! Capability traits injected into the engine.
//!
//! - [`Clock`] — current time and operation position (drivers implement)
//! - [`TokenVault`] — fungible-token custody (token integrations implement)
//! - [`Migrator`] — successor that takes over migrated locks

use std::sync::Arc;

use crate::error::TransferError;
use crate::types::{AccountId, LockedBalance};

/// Source of the current time and the current operation position.
///
/// Positions are external sequence markers (block heights, log offsets).
/// Implementations must never let either value decrease, and two reads that
/// return the same position must return the same time.
pub trait Clock: Send + Sync {
    /// Current time in Unix seconds.
    fn now(&self) -> u64;

    /// Position assigned to the operation being executed.
    fn position(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> u64 {
        (**self).now()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> u64 {
        (**self).now()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }
}

/// Fungible-token custody used by the escrow.
///
/// Both calls either move exactly `amount` or fail without moving anything.
/// No fees, no callbacks, no re-entry into the escrow.
pub trait TokenVault: Send + Sync {
    /// Move `amount` from `from` into escrow custody.
    fn pull(&mut self, from: &AccountId, amount: u128) -> Result<(), TransferError>;

    /// Move `amount` from escrow custody to `to`.
    fn push(&mut self, to: &AccountId, amount: u128) -> Result<(), TransferError>;
}

/// Successor escrow that takes over locks moved by `migrate`.
///
/// The engine first pushes the lock's units from custody to
/// [`Migrator::account`], then hands the lock over with
/// [`Migrator::receive`]. `receive` cannot refuse: the units have already
/// moved.
pub trait Migrator: Send + Sync {
    /// Vault account that receives migrated units.
    fn account(&self) -> AccountId;

    /// Record `lock` as now held on behalf of `owner`.
    fn receive(&self, owner: &AccountId, lock: LockedBalance);
}

impl<T: Migrator + ?Sized> Migrator for Arc<T> {
    fn account(&self) -> AccountId {
        (**self).account()
    }

    fn receive(&self, owner: &AccountId, lock: LockedBalance) {
        (**self).receive(owner, lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(u64, u64);

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }

        fn position(&self) -> u64 {
            self.1
        }
    }

    #[test]
    fn arc_clock_delegates() {
        let clock = Arc::new(FixedClock(42, 7));
        assert_eq!(Clock::now(&clock), 42);
        assert_eq!(Clock::position(&clock), 7);
    }

    #[test]
    fn clock_is_object_safe() {
        let clock = FixedClock(1, 2);
        let dyn_clock: &dyn Clock = &clock;
        assert_eq!(dyn_clock.now(), 1);
        assert_eq!(dyn_clock.position(), 2);
    }

    #[test]
    fn vault_is_object_safe() {
        struct NullVault;
        impl TokenVault for NullVault {
            fn pull(&mut self, _from: &AccountId, _amount: u128) -> Result<(), TransferError> {
                Ok(())
            }
            fn push(&mut self, _to: &AccountId, _amount: u128) -> Result<(), TransferError> {
                Err(TransferError::Overflow)
            }
        }
        let mut v = NullVault;
        let dyn_v: &mut dyn TokenVault = &mut v;
        assert!(dyn_v.pull(&AccountId::ZERO, 1).is_ok());
        assert!(dyn_v.push(&AccountId::ZERO, 1).is_err());
    }

    #[test]
    fn arc_migrator_delegates() {
        use std::sync::atomic::{AtomicU64, Ordering};

        struct Counting(AtomicU64);
        impl Migrator for Counting {
            fn account(&self) -> AccountId {
                AccountId::from_label("successor")
            }
            fn receive(&self, _owner: &AccountId, lock: LockedBalance) {
                self.0.fetch_add(lock.amount as u64, Ordering::SeqCst);
            }
        }

        let inner = Arc::new(Counting(AtomicU64::new(0)));
        let boxed: Box<dyn Migrator> = Box::new(inner.clone());
        let lock = LockedBalance {
            amount: 5,
            unlock_time: 10,
            start: 0,
        };
        boxed.receive(&AccountId::ZERO, lock);
        boxed.receive(&AccountId::ZERO, lock);
        assert_eq!(boxed.account(), AccountId::from_label("successor"));
        assert_eq!(inner.0.load(Ordering::SeqCst), 10);
    }
}
