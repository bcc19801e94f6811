//! The lock manager.
//!
//! [`VotingEscrow`] owns the lock store, checkpoint ledger, and slope
//! schedule, and drives them from the injected [`Clock`] and [`TokenVault`].
//!
//! Every mutating call follows the same shape: read `(now, position)` once,
//! validate, build a [`Plan`] against the current state (catch-up walk,
//! schedule amendments, new lock), move tokens through the vault, then
//! commit the plan. Everything fallible happens before the commit, so an
//! error leaves the engine untouched.

use std::collections::BTreeSet;

use ebb_core::config::EscrowConfig;
use ebb_core::constants::{MIN_PENALTY_RATE, PENALTY_PRECISION};
use ebb_core::error::{ConfigError, EscrowError};
use ebb_core::traits::{Clock, Migrator, TokenVault};
use ebb_core::types::{AccountId, LockedBalance, Point};
use tracing::{debug, info, warn};

use crate::events::{DepositKind, EscrowEvent};
use crate::ledger::CheckpointLedger;
use crate::oracle::BalanceOracle;
use crate::schedule::SlopeSchedule;
use crate::store::{LockStore, LockUpdate};
use crate::supply;

/// Outcome of [`VotingEscrow::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Interval steps walked by this call.
    pub steps: u32,
    /// Whether the global ledger now rests at the current time.
    pub caught_up: bool,
    /// Timestamp of the latest global point.
    pub resting_at: u64,
}

/// Outcome of [`VotingEscrow::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelReceipt {
    /// Units returned to the account.
    pub refund: u128,
    /// Units kept in custody.
    pub penalty: u128,
}

/// Persistent engine state. Events are not part of it.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
struct EscrowState {
    config: EscrowConfig,
    locks: LockStore,
    ledger: CheckpointLedger,
    schedule: SlopeSchedule,
    accrued_penalties: u128,
    /// Accounts whose lock moved to the migrator.
    migrated: BTreeSet<AccountId>,
}

/// A lock replacement requested by an operation.
struct LockChange {
    account: AccountId,
    old: LockedBalance,
    new: LockedBalance,
}

/// Everything a call will write, computed up front.
#[derive(Debug, Default)]
struct Plan {
    global: Vec<Point>,
    account: Option<(LockUpdate, Point)>,
    /// Final values of the schedule entries touched.
    schedule: Vec<(u64, i128)>,
    steps: u32,
    reached: bool,
}

/// Time-weighted lock accounting over an injected clock and token vault.
pub struct VotingEscrow<C, V> {
    state: EscrowState,
    clock: C,
    vault: V,
    /// Set at most once per engine instance; not part of snapshots.
    migrator: Option<Box<dyn Migrator>>,
    events: Vec<EscrowEvent>,
}

impl<C: Clock, V: TokenVault> VotingEscrow<C, V> {
    /// Create an engine whose global history starts at the clock's current
    /// time and position.
    pub fn new(config: EscrowConfig, clock: C, vault: V) -> Result<Self, ConfigError> {
        config.validate()?;
        let genesis = Point::zero(clock.now(), clock.position());
        info!(
            interval = config.interval,
            max_lock_duration = config.max_lock_duration,
            genesis = genesis.timestamp,
            "escrow created"
        );
        Ok(Self {
            state: EscrowState {
                config,
                locks: LockStore::new(),
                ledger: CheckpointLedger::new(genesis),
                schedule: SlopeSchedule::new(),
                accrued_penalties: 0,
                migrated: BTreeSet::new(),
            },
            clock,
            vault,
            migrator: None,
            events: Vec::new(),
        })
    }

    /// Rebuild an engine from [`VotingEscrow::snapshot`] output.
    pub fn restore(bytes: &[u8], clock: C, vault: V) -> Result<Self, EscrowError> {
        let (state, read): (EscrowState, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| EscrowError::Snapshot(e.to_string()))?;
        if read != bytes.len() {
            return Err(EscrowError::Snapshot(format!(
                "{} trailing bytes",
                bytes.len() - read
            )));
        }
        state
            .config
            .validate()
            .map_err(|e| EscrowError::Snapshot(e.to_string()))?;
        if state.ledger.global().epoch() == 0 {
            return Err(EscrowError::Snapshot("empty global history".into()));
        }
        debug!(
            epoch = state.ledger.global().epoch(),
            locks = state.locks.len(),
            "escrow restored"
        );
        Ok(Self {
            state,
            clock,
            vault,
            migrator: None,
            events: Vec::new(),
        })
    }

    /// Encode the persistent state.
    pub fn snapshot(&self) -> Result<Vec<u8>, EscrowError> {
        bincode::encode_to_vec(&self.state, bincode::config::standard())
            .map_err(|e| EscrowError::Snapshot(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Lock `value` units for `account` until `unlock_time` (rounded down to
    /// the interval). Returns the resolved unlock time.
    pub fn create_lock(
        &mut self,
        account: &AccountId,
        value: u128,
        unlock_time: u64,
    ) -> Result<u64, EscrowError> {
        let (now, position) = self.tick();
        self.check_not_migrated(account)?;
        if value == 0 {
            return Err(EscrowError::InvalidAmount);
        }
        let old = self.state.locks.get(account);
        if !old.is_empty() {
            return Err(EscrowError::ExistingLockConflict);
        }
        let unlock_time = self.state.config.round_down(unlock_time);
        if unlock_time <= now {
            return Err(EscrowError::PastOrPresentUnlockTime { unlock_time, now });
        }
        self.check_max_duration(unlock_time, now)?;

        let new = LockedBalance {
            amount: value,
            unlock_time,
            start: now,
        };
        let plan = self.plan(
            Some(LockChange {
                account: *account,
                old,
                new,
            }),
            now,
            position,
        )?;
        self.vault.pull(account, value)?;
        let previous = self.commit(plan);

        info!(account = %account.short(), value, unlock_time, "lock created");
        self.events.push(EscrowEvent::Deposit {
            account: *account,
            value,
            unlock_time,
            kind: DepositKind::CreateLock,
            timestamp: now,
        });
        self.push_supply_event(previous);
        Ok(unlock_time)
    }

    /// Add `value` units to an active lock without changing its unlock time.
    pub fn increase_amount(&mut self, account: &AccountId, value: u128) -> Result<(), EscrowError> {
        let (now, position) = self.tick();
        self.check_not_migrated(account)?;
        if value == 0 {
            return Err(EscrowError::InvalidAmount);
        }
        let old = self.state.locks.get(account);
        if old.is_empty() {
            return Err(EscrowError::NoLockFound);
        }
        if old.is_expired(now) {
            return Err(EscrowError::LockExpired);
        }

        let amount = old
            .amount
            .checked_add(value)
            .ok_or(EscrowError::ArithmeticOverflow)?;
        let new = LockedBalance { amount, ..old };
        let plan = self.plan(
            Some(LockChange {
                account: *account,
                old,
                new,
            }),
            now,
            position,
        )?;
        self.vault.pull(account, value)?;
        let previous = self.commit(plan);

        debug!(account = %account.short(), value, amount, "lock amount increased");
        self.events.push(EscrowEvent::Deposit {
            account: *account,
            value,
            unlock_time: old.unlock_time,
            kind: DepositKind::IncreaseAmount,
            timestamp: now,
        });
        self.push_supply_event(previous);
        Ok(())
    }

    /// Move the unlock time of an active lock later. Returns the resolved
    /// unlock time.
    pub fn increase_unlock_time(
        &mut self,
        account: &AccountId,
        unlock_time: u64,
    ) -> Result<u64, EscrowError> {
        let (now, position) = self.tick();
        self.check_not_migrated(account)?;
        let unlock_time = self.state.config.round_down(unlock_time);
        let old = self.state.locks.get(account);
        // An absent lock has unlock_time 0, so it reports LockExpired here.
        if old.is_expired(now) {
            return Err(EscrowError::LockExpired);
        }
        if old.is_empty() {
            return Err(EscrowError::NoLockFound);
        }
        if unlock_time <= old.unlock_time {
            return Err(EscrowError::UnlockTimeNotIncreasing {
                requested: unlock_time,
                current: old.unlock_time,
            });
        }
        self.check_max_duration(unlock_time, now)?;

        let new = LockedBalance { unlock_time, ..old };
        let plan = self.plan(
            Some(LockChange {
                account: *account,
                old,
                new,
            }),
            now,
            position,
        )?;
        self.commit(plan);

        debug!(account = %account.short(), from = old.unlock_time, to = unlock_time, "lock extended");
        self.events.push(EscrowEvent::Deposit {
            account: *account,
            value: 0,
            unlock_time,
            kind: DepositKind::IncreaseUnlockTime,
            timestamp: now,
        });
        Ok(unlock_time)
    }

    /// Release an expired lock. Returns the units sent back to `account`.
    pub fn withdraw(&mut self, account: &AccountId) -> Result<u128, EscrowError> {
        let (now, position) = self.tick();
        let old = self.state.locks.get(account);
        if old.is_empty() {
            return Err(EscrowError::NoLockFound);
        }
        if !old.is_expired(now) {
            return Err(EscrowError::LockNotExpired {
                unlock_time: old.unlock_time,
                now,
            });
        }

        let plan = self.plan(
            Some(LockChange {
                account: *account,
                old,
                new: LockedBalance::EMPTY,
            }),
            now,
            position,
        )?;
        self.vault.push(account, old.amount)?;
        let previous = self.commit(plan);

        info!(account = %account.short(), value = old.amount, "lock withdrawn");
        self.events.push(EscrowEvent::Withdraw {
            account: *account,
            value: old.amount,
            timestamp: now,
        });
        self.push_supply_event(previous);
        Ok(old.amount)
    }

    /// End an active lock early. Part of the amount is refunded and the
    /// rest stays in custody as a penalty.
    ///
    /// The penalty rate is the unserved share of the lock's duration, never
    /// below one half.
    pub fn cancel(&mut self, account: &AccountId) -> Result<CancelReceipt, EscrowError> {
        let (now, position) = self.tick();
        let old = self.state.locks.get(account);
        if old.is_empty() {
            return Err(EscrowError::NoLockFound);
        }
        if old.is_expired(now) {
            return Err(EscrowError::LockExpired);
        }

        let rate = penalty_rate(&old, now);
        let refund = scale(old.amount, PENALTY_PRECISION - rate);
        let penalty = old.amount - refund;
        let accrued = self
            .state
            .accrued_penalties
            .checked_add(penalty)
            .ok_or(EscrowError::ArithmeticOverflow)?;

        let plan = self.plan(
            Some(LockChange {
                account: *account,
                old,
                new: LockedBalance::EMPTY,
            }),
            now,
            position,
        )?;
        if refund > 0 {
            self.vault.push(account, refund)?;
        }
        let previous = self.commit(plan);
        self.state.accrued_penalties = accrued;

        warn!(account = %account.short(), refund, penalty, "lock cancelled early");
        self.events.push(EscrowEvent::Cancel {
            account: *account,
            refund,
            penalty,
            timestamp: now,
        });
        self.push_supply_event(previous);
        Ok(CancelReceipt { refund, penalty })
    }

    /// Attach the successor escrow that [`VotingEscrow::migrate`] hands
    /// locks to. Only one migrator can ever be attached.
    pub fn set_migrator<M: Migrator + 'static>(&mut self, migrator: M) -> Result<(), EscrowError> {
        if self.migrator.is_some() {
            return Err(EscrowError::MigratorAlreadySet);
        }
        info!(custodian = %migrator.account().short(), "migrator set");
        self.migrator = Some(Box::new(migrator));
        Ok(())
    }

    /// Move an active lock and its units to the migrator. Returns the lock
    /// as handed over.
    ///
    /// The account's weight drops to zero and the account can no longer
    /// create, grow, extend, or migrate a lock here.
    pub fn migrate(&mut self, account: &AccountId) -> Result<LockedBalance, EscrowError> {
        let (now, position) = self.tick();
        self.check_not_migrated(account)?;
        let custodian = self
            .migrator
            .as_ref()
            .map(|m| m.account())
            .ok_or(EscrowError::MigratorNotSet)?;
        let old = self.state.locks.get(account);
        if old.is_empty() {
            return Err(EscrowError::NoLockFound);
        }
        if old.is_expired(now) {
            return Err(EscrowError::LockExpired);
        }

        let plan = self.plan(
            Some(LockChange {
                account: *account,
                old,
                new: LockedBalance::EMPTY,
            }),
            now,
            position,
        )?;
        self.vault.push(&custodian, old.amount)?;
        let previous = self.commit(plan);
        self.state.migrated.insert(*account);
        if let Some(migrator) = &self.migrator {
            migrator.receive(account, old);
        }

        info!(
            account = %account.short(),
            value = old.amount,
            unlock_time = old.unlock_time,
            "lock migrated"
        );
        self.events.push(EscrowEvent::Migrate {
            account: *account,
            value: old.amount,
            unlock_time: old.unlock_time,
            custodian,
            timestamp: now,
        });
        self.push_supply_event(previous);
        Ok(old)
    }

    /// Advance the global ledger by at most `max_catch_up_steps` intervals.
    pub fn checkpoint(&mut self) -> Result<CatchUpReport, EscrowError> {
        let (now, position) = self.tick();
        let plan = self.plan(None, now, position)?;
        let (steps, caught_up) = (plan.steps, plan.reached);
        self.commit(plan);
        let resting_at = self.state.ledger.global_head().timestamp;
        if caught_up {
            debug!(steps, resting_at, "checkpoint");
        } else {
            warn!(steps, resting_at, now, "checkpoint stopped at step bound");
        }
        Ok(CatchUpReport {
            steps,
            caught_up,
            resting_at,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn oracle(&self) -> BalanceOracle<'_> {
        let (now, position) = self.tick();
        BalanceOracle::new(&self.state.ledger, &self.state.schedule, now, position)
    }

    /// Current weight of `account`.
    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.oracle().balance_of(account)
    }

    /// Weight of `account` at a past `position`.
    pub fn balance_of_at(&self, account: &AccountId, position: u64) -> Result<u128, EscrowError> {
        self.oracle().balance_of_at(account, position)
    }

    /// Current aggregate weight.
    pub fn total_supply(&self) -> Result<u128, EscrowError> {
        self.oracle().total_supply()
    }

    /// Aggregate weight at a past `position`.
    pub fn total_supply_at(&self, position: u64) -> Result<u128, EscrowError> {
        self.oracle().total_supply_at(position)
    }

    pub fn locked(&self, account: &AccountId) -> LockedBalance {
        self.state.locks.get(account)
    }

    pub fn unlock_time(&self, account: &AccountId) -> u64 {
        self.state.locks.get(account).unlock_time
    }

    /// Number of global points recorded, genesis included.
    pub fn epoch(&self) -> usize {
        self.state.ledger.global().epoch()
    }

    /// Number of points recorded for `account`.
    pub fn account_epoch(&self, account: &AccountId) -> usize {
        self.state.ledger.account(account).map_or(0, |h| h.epoch())
    }

    /// Global point at `index` (0 is genesis).
    pub fn point_history(&self, index: usize) -> Option<Point> {
        self.state.ledger.global().get(index).copied()
    }

    /// Point `index` of `account`'s history (0 is its first operation).
    pub fn account_point_history(&self, account: &AccountId, index: usize) -> Option<Point> {
        self.state
            .ledger
            .account(account)
            .and_then(|h| h.get(index))
            .copied()
    }

    /// Accounts with at least one recorded point, in id order.
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.state.ledger.accounts().copied().collect();
        ids.sort();
        ids
    }

    pub fn last_account_slope(&self, account: &AccountId) -> i128 {
        self.state.ledger.account_head(account).map_or(0, |p| p.slope)
    }

    /// Slope delta scheduled at `timestamp`.
    pub fn slope_change(&self, timestamp: u64) -> i128 {
        self.state.schedule.get(timestamp)
    }

    /// Units currently held in locks.
    pub fn locked_supply(&self) -> u128 {
        self.state.locks.supply()
    }

    /// Units kept from cancelled locks.
    pub fn accrued_penalties(&self) -> u128 {
        self.state.accrued_penalties
    }

    /// Whether `account`'s lock has moved to the migrator.
    pub fn is_migrated(&self, account: &AccountId) -> bool {
        self.state.migrated.contains(account)
    }

    pub fn has_migrator(&self) -> bool {
        self.migrator.is_some()
    }

    /// Whether the global ledger rests at the current time.
    pub fn is_caught_up(&self) -> bool {
        self.state.ledger.global_head().timestamp >= self.clock.now()
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.state.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    /// Take the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<EscrowEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Clock reading, never behind the latest global point.
    fn tick(&self) -> (u64, u64) {
        let head = self.state.ledger.global_head();
        (
            self.clock.now().max(head.timestamp),
            self.clock.position().max(head.position),
        )
    }

    fn check_not_migrated(&self, account: &AccountId) -> Result<(), EscrowError> {
        if self.state.migrated.contains(account) {
            return Err(EscrowError::LockMigrated);
        }
        Ok(())
    }

    fn check_max_duration(&self, unlock_time: u64, now: u64) -> Result<(), EscrowError> {
        let max = self.state.config.max_unlock_time(now);
        if unlock_time > max {
            return Err(EscrowError::ExceedsMaxLockDuration { unlock_time, max });
        }
        Ok(())
    }

    /// Compute every write for a call without performing any.
    ///
    /// With a lock change the ledger must reach `now` within the step bound.
    fn plan(&self, change: Option<LockChange>, now: u64, position: u64) -> Result<Plan, EscrowError> {
        let last = self.state.ledger.global_head();
        let walk = supply::catch_up(&last, &self.state.schedule, &self.state.config, now, position)?;
        let mut plan = Plan {
            global: walk.points,
            steps: walk.steps,
            reached: walk.reached,
            ..Plan::default()
        };

        let Some(change) = change else {
            if let [only] = plan.global.as_slice() {
                if only.same_state(&last) {
                    plan.global.clear();
                }
            }
            return Ok(plan);
        };

        if !plan.reached {
            let resting_at = plan.global.last().map_or(last.timestamp, |p| p.timestamp);
            return Err(EscrowError::CheckpointRequired { resting_at, now });
        }

        let max = self.state.config.max_lock_duration;
        let old_point = Point::for_lock(&change.old, max, now, position)?;
        let new_point = Point::for_lock(&change.new, max, now, position)?;

        if let Some(head) = plan.global.last_mut() {
            head.slope = shift(head.slope, new_point.slope, old_point.slope)?;
            head.bias = shift(head.bias, new_point.bias, old_point.bias)?;
        }

        let schedule = &self.state.schedule;
        if change.old.unlock_time > now {
            let mut delta = old_point.slope;
            if change.new.unlock_time == change.old.unlock_time {
                delta = delta
                    .checked_sub(new_point.slope)
                    .ok_or(EscrowError::ArithmeticOverflow)?;
            }
            let t = change.old.unlock_time;
            plan.schedule.push((t, schedule.adjusted(t, delta)?));
        }
        if change.new.unlock_time > now && change.new.unlock_time > change.old.unlock_time {
            let t = change.new.unlock_time;
            plan.schedule.push((t, schedule.adjusted(t, -new_point.slope)?));
        }

        let update = self.state.locks.prepare(&change.account, change.new)?;
        plan.account = Some((update, new_point));
        Ok(plan)
    }

    /// Apply a plan. Returns the locked supply before it.
    fn commit(&mut self, plan: Plan) -> u128 {
        let previous = self.state.locks.supply();
        for (t, value) in plan.schedule {
            self.state.schedule.set(t, value);
        }
        for point in plan.global {
            self.state.ledger.push_global(point);
        }
        if let Some((update, point)) = plan.account {
            self.state.ledger.push_account(&update.account, point);
            self.state.locks.apply(update);
        }
        previous
    }

    fn push_supply_event(&mut self, previous: u128) {
        self.events.push(EscrowEvent::Supply {
            previous,
            current: self.state.locks.supply(),
        });
    }
}

/// `value + add - sub`, floored at zero.
fn shift(value: i128, add: i128, sub: i128) -> Result<i128, EscrowError> {
    add.checked_sub(sub)
        .and_then(|d| value.checked_add(d))
        .map(|v| v.max(0))
        .ok_or(EscrowError::ArithmeticOverflow)
}

/// Penalty rate for cancelling `lock` at `now`, in `PENALTY_PRECISION` units.
/// Requires `start <= now < unlock_time`.
fn penalty_rate(lock: &LockedBalance, now: u64) -> u128 {
    let remaining = (lock.unlock_time - now) as u128;
    let duration = lock.unlock_time.saturating_sub(lock.start).max(1) as u128;
    (remaining * PENALTY_PRECISION / duration)
        .clamp(MIN_PENALTY_RATE, PENALTY_PRECISION)
}

/// `amount * factor / PENALTY_PRECISION` rounded down, for `factor <= PENALTY_PRECISION`.
fn scale(amount: u128, factor: u128) -> u128 {
    let whole = amount / PENALTY_PRECISION;
    let rest = amount % PENALTY_PRECISION;
    whole * factor + rest * factor / PENALTY_PRECISION
}
