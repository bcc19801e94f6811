//! Error types for the ebb engine.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("insufficient custody: have {have}, need {need}")] InsufficientCustody { have: u128, need: u128 },
    #[error("balance overflow")] Overflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("interval must be non-zero")] ZeroInterval,
    #[error("max lock duration {max} shorter than interval {interval}")] MaxDurationTooShort { max: u64, interval: u64 },
    #[error("max catch-up steps must be non-zero")] ZeroCatchUpSteps,
}

/// Failures reported by escrow operations.
///
/// Every variant is a caller-input or caller-state error: validation runs
/// before any write, so a failed call leaves the engine unchanged. Use
/// [`EscrowError::code`] for a stable identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error("amount must be non-zero")] InvalidAmount,
    #[error("account already holds a lock; withdraw first")] ExistingLockConflict,
    #[error("unlock time {unlock_time} is not after now ({now})")] PastOrPresentUnlockTime { unlock_time: u64, now: u64 },
    #[error("unlock time {unlock_time} exceeds max {max}")] ExceedsMaxLockDuration { unlock_time: u64, max: u64 },
    #[error("no lock found")] NoLockFound,
    #[error("lock expired")] LockExpired,
    #[error("lock does not expire until {unlock_time} (now {now})")] LockNotExpired { unlock_time: u64, now: u64 },
    #[error("unlock time {requested} does not increase current {current}")] UnlockTimeNotIncreasing { requested: u64, current: u64 },
    #[error("global ledger resting at {resting_at}, behind now ({now}); call checkpoint")] CheckpointRequired { resting_at: u64, now: u64 },
    #[error("position {requested} is ahead of current position {current}")] FuturePosition { requested: u64, current: u64 },
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("no migrator set")] MigratorNotSet,
    #[error("migrator already set")] MigratorAlreadySet,
    #[error("lock migrated")] LockMigrated,
    #[error("transfer failed: {0}")] Transfer(#[from] TransferError),
    #[error("snapshot: {0}")] Snapshot(String),
}

impl EscrowError {
    /// Stable identifier for this failure, independent of the display text.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "InvalidAmount",
            Self::ExistingLockConflict => "ExistingLockConflict",
            Self::PastOrPresentUnlockTime { .. } => "PastOrPresentUnlockTime",
            Self::ExceedsMaxLockDuration { .. } => "ExceedsMaxLockDuration",
            Self::NoLockFound => "NoLockFound",
            Self::LockExpired => "LockExpired",
            Self::LockNotExpired { .. } => "LockNotExpired",
            Self::UnlockTimeNotIncreasing { .. } => "UnlockTimeNotIncreasing",
            Self::CheckpointRequired { .. } => "CheckpointRequired",
            Self::FuturePosition { .. } => "FuturePosition",
            Self::ArithmeticOverflow => "ArithmeticOverflow",
            Self::MigratorNotSet => "MigratorNotSet",
            Self::MigratorAlreadySet => "MigratorAlreadySet",
            Self::LockMigrated => "LockMigrated",
            Self::Transfer(_) => "TransferFailed",
            Self::Snapshot(_) => "SnapshotInvalid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_distinct() {
        let all = [
            EscrowError::InvalidAmount,
            EscrowError::ExistingLockConflict,
            EscrowError::PastOrPresentUnlockTime { unlock_time: 0, now: 0 },
            EscrowError::ExceedsMaxLockDuration { unlock_time: 0, max: 0 },
            EscrowError::NoLockFound,
            EscrowError::LockExpired,
            EscrowError::LockNotExpired { unlock_time: 0, now: 0 },
            EscrowError::UnlockTimeNotIncreasing { requested: 0, current: 0 },
            EscrowError::CheckpointRequired { resting_at: 0, now: 0 },
            EscrowError::FuturePosition { requested: 0, current: 0 },
            EscrowError::ArithmeticOverflow,
            EscrowError::MigratorNotSet,
            EscrowError::MigratorAlreadySet,
            EscrowError::LockMigrated,
            EscrowError::Transfer(TransferError::Overflow),
            EscrowError::Snapshot(String::new()),
        ];
        let codes: HashSet<_> = all.iter().map(EscrowError::code).collect();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn code_ignores_payload() {
        let a = EscrowError::LockNotExpired { unlock_time: 1, now: 0 };
        let b = EscrowError::LockNotExpired { unlock_time: 9, now: 5 };
        assert_eq!(a.code(), b.code());
        assert_ne!(a, b);
    }

    #[test]
    fn transfer_error_converts() {
        let err: EscrowError = TransferError::InsufficientBalance { have: 1, need: 2 }.into();
        assert_eq!(err.code(), "TransferFailed");
        assert!(err.to_string().contains("have 1, need 2"));
    }
}
