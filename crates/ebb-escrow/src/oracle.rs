//! Current and historical weight queries.
//!
//! Historical queries map the requested position to a timestamp along the
//! global history once ([`PointHistory::resolve`](crate::ledger::PointHistory::resolve)),
//! and both the per-account and aggregate paths evaluate at that same
//! timestamp. That shared mapping is what keeps
//! `sum(balance_of_at) == total_supply_at` exact.

use ebb_core::error::EscrowError;
use ebb_core::types::AccountId;

use crate::ledger::CheckpointLedger;
use crate::schedule::SlopeSchedule;
use crate::supply;

/// Read-only view over the ledger and schedule at a given clock reading.
#[derive(Debug, Clone, Copy)]
pub struct BalanceOracle<'a> {
    ledger: &'a CheckpointLedger,
    schedule: &'a SlopeSchedule,
    now: u64,
    position: u64,
}

impl<'a> BalanceOracle<'a> {
    pub fn new(
        ledger: &'a CheckpointLedger,
        schedule: &'a SlopeSchedule,
        now: u64,
        position: u64,
    ) -> Self {
        Self {
            ledger,
            schedule,
            now,
            position,
        }
    }

    fn check_position(&self, position: u64) -> Result<(), EscrowError> {
        if position > self.position {
            return Err(EscrowError::FuturePosition {
                requested: position,
                current: self.position,
            });
        }
        Ok(())
    }

    /// Weight of `account` now.
    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.ledger
            .account_head(account)
            .map_or(0, |p| p.value_at(self.now))
    }

    /// Weight of `account` at a past position.
    pub fn balance_of_at(&self, account: &AccountId, position: u64) -> Result<u128, EscrowError> {
        self.check_position(position)?;
        let Some(point) = self
            .ledger
            .account(account)
            .and_then(|h| h.at_or_before(position))
        else {
            return Ok(0);
        };
        let Some(anchor) = self.ledger.global().resolve(position, self.now, self.position) else {
            return Ok(0);
        };
        Ok(point.value_at(anchor.timestamp))
    }

    /// Aggregate weight now, projected from the latest global point.
    pub fn total_supply(&self) -> Result<u128, EscrowError> {
        let head = self.ledger.global_head();
        let projected = supply::project(&head, self.schedule, self.now.max(head.timestamp))?;
        Ok(projected.value_at(projected.timestamp))
    }

    /// Aggregate weight at a past position.
    pub fn total_supply_at(&self, position: u64) -> Result<u128, EscrowError> {
        self.check_position(position)?;
        let global = self.ledger.global();
        let Some(anchor) = global.resolve(position, self.now, self.position) else {
            return Ok(0);
        };
        let Some(point) = global.get(anchor.index) else {
            return Ok(0);
        };
        let projected = supply::project(point, self.schedule, anchor.timestamp)?;
        Ok(projected.value_at(projected.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::types::Point;

    fn pt(bias: i128, slope: i128, timestamp: u64, position: u64) -> Point {
        Point {
            bias,
            slope,
            timestamp,
            position,
        }
    }

    /// One account locked at t=100 (position 2) with slope 1 until t=1100.
    fn fixture() -> (CheckpointLedger, SlopeSchedule, AccountId) {
        let alice = AccountId::from_label("alice");
        let mut ledger = CheckpointLedger::new(Point::zero(0, 0));
        ledger.push_global(pt(1_000, 1, 100, 2));
        ledger.push_account(&alice, pt(1_000, 1, 100, 2));
        let mut schedule = SlopeSchedule::new();
        schedule.adjust(1_100, -1).unwrap();
        (ledger, schedule, alice)
    }

    #[test]
    fn current_balance_and_supply() {
        let (ledger, schedule, alice) = fixture();
        let oracle = BalanceOracle::new(&ledger, &schedule, 400, 5);
        assert_eq!(oracle.balance_of(&alice), 700);
        assert_eq!(oracle.total_supply().unwrap(), 700);
        assert_eq!(oracle.balance_of(&AccountId::from_label("bob")), 0);
    }

    #[test]
    fn expired_lock_reads_zero() {
        let (ledger, schedule, alice) = fixture();
        let oracle = BalanceOracle::new(&ledger, &schedule, 5_000, 9);
        assert_eq!(oracle.balance_of(&alice), 0);
        assert_eq!(oracle.total_supply().unwrap(), 0);
    }

    #[test]
    fn historical_queries_interpolate_time() {
        let (ledger, schedule, alice) = fixture();
        // Position 7 of 12 between t=100 (pos 2) and now t=1100 (pos 12): t=600.
        let oracle = BalanceOracle::new(&ledger, &schedule, 1_100, 12);
        assert_eq!(oracle.balance_of_at(&alice, 7).unwrap(), 500);
        assert_eq!(oracle.total_supply_at(7).unwrap(), 500);
        assert_eq!(oracle.balance_of_at(&alice, 2).unwrap(), 1_000);
        assert_eq!(oracle.total_supply_at(2).unwrap(), 1_000);
    }

    #[test]
    fn before_first_lock_is_zero() {
        let (ledger, schedule, alice) = fixture();
        let oracle = BalanceOracle::new(&ledger, &schedule, 400, 5);
        assert_eq!(oracle.balance_of_at(&alice, 1).unwrap(), 0);
        assert_eq!(oracle.total_supply_at(1).unwrap(), 0);
    }

    #[test]
    fn future_position_rejected() {
        let (ledger, schedule, alice) = fixture();
        let oracle = BalanceOracle::new(&ledger, &schedule, 400, 5);
        assert_eq!(
            oracle.balance_of_at(&alice, 6),
            Err(EscrowError::FuturePosition {
                requested: 6,
                current: 5
            })
        );
        assert!(oracle.total_supply_at(6).is_err());
    }
}
