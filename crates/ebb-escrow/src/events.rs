//! Events emitted by escrow operations.

use ebb_core::types::AccountId;
use serde::{Deserialize, Serialize};

/// Which operation produced a [`EscrowEvent::Deposit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositKind {
    CreateLock,
    IncreaseAmount,
    IncreaseUnlockTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEvent {
    /// Units deposited or a lock extended. `unlock_time` is the resolved
    /// (interval-rounded) release time.
    Deposit {
        account: AccountId,
        value: u128,
        unlock_time: u64,
        kind: DepositKind,
        timestamp: u64,
    },
    Withdraw {
        account: AccountId,
        value: u128,
        timestamp: u64,
    },
    /// A lock ended early; `refund` went back to the account and `penalty`
    /// stayed in custody.
    Cancel {
        account: AccountId,
        refund: u128,
        penalty: u128,
        timestamp: u64,
    },
    /// A lock and its units moved to the migrator's `custodian` account.
    Migrate {
        account: AccountId,
        value: u128,
        unlock_time: u64,
        custodian: AccountId,
        timestamp: u64,
    },
    /// Total locked amount changed.
    Supply { previous: u128, current: u128 },
}
