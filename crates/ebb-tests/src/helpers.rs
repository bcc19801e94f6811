//! Shared test helpers for scenario and state-machine tests.

use std::sync::Arc;

use ebb_core::clock::ManualClock;
use ebb_core::config::EscrowConfig;
use ebb_core::constants::{DAY, YEAR};
use ebb_core::traits::Clock;
use ebb_core::types::AccountId;
use ebb_core::vault::MemoryVault;
use ebb_escrow::VotingEscrow;

pub type TestEscrow = VotingEscrow<Arc<ManualClock>, MemoryVault>;

/// Account id for a human label.
pub fn account(label: &str) -> AccountId {
    AccountId::from_label(label)
}

/// Three-day interval, two-year maximum.
pub fn short_config() -> EscrowConfig {
    EscrowConfig {
        interval: 3 * DAY,
        max_lock_duration: 2 * YEAR,
        ..EscrowConfig::default()
    }
}

/// One-week interval, four-year maximum.
pub fn weekly_config() -> EscrowConfig {
    EscrowConfig {
        interval: 7 * DAY,
        max_lock_duration: 4 * YEAR,
        ..EscrowConfig::default()
    }
}

/// A clock reading captured during a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub position: u64,
    pub timestamp: u64,
}

/// An escrow plus the handle that moves its clock.
pub struct Harness {
    pub escrow: TestEscrow,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Build an escrow at `(start, 1)` with each listed account funded.
    pub fn new(config: EscrowConfig, start: u64, funded: &[(&str, u128)]) -> Self {
        let clock = Arc::new(ManualClock::new(start, 1));
        let mut vault = MemoryVault::new();
        for (label, amount) in funded {
            vault.mint(&account(label), *amount).unwrap();
        }
        let escrow = VotingEscrow::new(config, clock.clone(), vault).unwrap();
        Self { escrow, clock }
    }

    /// Move time forward by `secs` in a new position.
    pub fn sleep(&self, secs: u64) {
        self.clock.advance(secs);
    }

    /// New position, same time.
    pub fn mine(&self) {
        self.clock.mine();
    }

    /// The escrow, at a fresh position for the next operation.
    pub fn next_op(&mut self) -> &mut TestEscrow {
        self.clock.mine();
        &mut self.escrow
    }

    /// Jump to the start of the next interval.
    pub fn next_interval(&self) {
        self.clock
            .advance_to_next_multiple(self.escrow.config().interval);
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn stage(&self) -> Stage {
        Stage {
            position: self.clock.position(),
            timestamp: self.clock.now(),
        }
    }

    /// Sum of `balance_of` over `labels`.
    pub fn sum_of(&self, labels: &[&str]) -> u128 {
        labels
            .iter()
            .map(|l| self.escrow.balance_of(&account(l)))
            .sum()
    }

    /// Sum of `balance_of_at` over `labels`.
    pub fn sum_at(&self, labels: &[&str], position: u64) -> u128 {
        labels
            .iter()
            .map(|l| self.escrow.balance_of_at(&account(l), position).unwrap())
            .sum()
    }
}

/// Assert `|actual - expected| <= tolerance`.
#[track_caller]
pub fn assert_close(actual: u128, expected: u128, tolerance: u128) {
    let diff = actual.abs_diff(expected);
    assert!(
        diff <= tolerance,
        "expected {expected} ± {tolerance}, got {actual} (off by {diff})"
    );
}
