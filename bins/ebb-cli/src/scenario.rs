//! Scripted scenario replay and snapshot inspection.
//!
//! A scenario is a JSON document with a start time and a list of steps:
//!
//! ```json
//! { "start": 1700000000,
//!   "steps": [
//!     { "op": "mint", "account": "alice", "units": 1000 },
//!     { "op": "create_lock", "account": "alice", "units": 1000, "unlock_in": 2592000 },
//!     { "op": "advance", "secs": 86400 },
//!     { "op": "query", "account": "alice" } ] }
//! ```
//!
//! Amounts are whole units; accounts are labels hashed into ids. Every step
//! that writes to the ledger runs at a fresh position. A failing step is
//! recorded with its error code and the replay continues.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use ebb_core::clock::ManualClock;
use ebb_core::config::EscrowConfig;
use ebb_core::constants::UNIT;
use ebb_core::error::EscrowError;
use ebb_core::migrator::MemoryMigrator;
use ebb_core::traits::Clock;
use ebb_core::types::{AccountId, Point};
use ebb_core::vault::MemoryVault;
use ebb_escrow::VotingEscrow;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

type Engine = VotingEscrow<Arc<ManualClock>, MemoryVault>;

fn default_start() -> u64 {
    1_700_000_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Clock time when the engine is created.
    #[serde(default = "default_start")]
    pub start: u64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("malformed scenario")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Move time forward and open a new position.
    Advance { secs: u64 },
    /// Open a new position without moving time.
    Mine,
    /// Credit free units to an account.
    Mint { account: String, units: u64 },
    CreateLock { account: String, units: u64, unlock_in: u64 },
    IncreaseAmount { account: String, units: u64 },
    IncreaseUnlockTime { account: String, unlock_in: u64 },
    Withdraw { account: String },
    Cancel { account: String },
    /// Attach a migrator whose custody lives at `account`.
    SetMigrator { account: String },
    Migrate { account: String },
    Checkpoint,
    /// Account weight, or aggregate weight when no account is given, at
    /// `position` or now.
    Query {
        account: Option<String>,
        position: Option<u64>,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Mine => "mine",
            Self::Mint { .. } => "mint",
            Self::CreateLock { .. } => "create_lock",
            Self::IncreaseAmount { .. } => "increase_amount",
            Self::IncreaseUnlockTime { .. } => "increase_unlock_time",
            Self::Withdraw { .. } => "withdraw",
            Self::Cancel { .. } => "cancel",
            Self::SetMigrator { .. } => "set_migrator",
            Self::Migrate { .. } => "migrate",
            Self::Checkpoint => "checkpoint",
            Self::Query { .. } => "query",
        }
    }

    fn account(&self) -> Option<&str> {
        match self {
            Self::Mint { account, .. }
            | Self::CreateLock { account, .. }
            | Self::IncreaseAmount { account, .. }
            | Self::IncreaseUnlockTime { account, .. }
            | Self::Withdraw { account }
            | Self::Cancel { account }
            | Self::Migrate { account } => Some(account.as_str()),
            Self::Query { account, .. } => account.as_deref(),
            _ => None,
        }
    }

    /// Whether the step appends to the ledger.
    fn writes(&self) -> bool {
        matches!(
            self,
            Self::CreateLock { .. }
                | Self::IncreaseAmount { .. }
                | Self::IncreaseUnlockTime { .. }
                | Self::Withdraw { .. }
                | Self::Cancel { .. }
                | Self::Migrate { .. }
                | Self::Checkpoint
        )
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub step: usize,
    pub op: &'static str,
    pub timestamp: u64,
    pub position: u64,
    /// Returned value: unlock time, amount moved, weight, or steps walked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u128>,
    /// Error code if the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account: String,
    pub amount: u128,
    pub unlock_time: u64,
    pub balance: u128,
    pub migrated: bool,
}

/// Engine state after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub timestamp: u64,
    pub position: u64,
    pub epoch: usize,
    pub caught_up: bool,
    pub total_supply: u128,
    pub locked_supply: u128,
    pub accrued_penalties: u128,
    /// Units held by the migrator, if one is attached.
    pub migrated_supply: u128,
    pub accounts: Vec<AccountSummary>,
}

fn units(n: u64) -> u128 {
    u128::from(n) * UNIT
}

/// An engine driven by a manual clock and an in-memory vault.
pub struct Replay {
    escrow: Engine,
    clock: Arc<ManualClock>,
    migrator: Option<Arc<MemoryMigrator>>,
    labels: BTreeSet<String>,
}

impl Replay {
    pub fn new(config: EscrowConfig, start: u64) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(start, 0));
        let escrow = VotingEscrow::new(config, clock.clone(), MemoryVault::new())
            .context("invalid escrow configuration")?;
        Ok(Self {
            escrow,
            clock,
            migrator: None,
            labels: BTreeSet::new(),
        })
    }

    pub fn escrow(&self) -> &Engine {
        &self.escrow
    }

    /// Apply every step in order.
    pub fn run(&mut self, steps: &[Step]) -> Vec<Outcome> {
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| self.apply(i, step))
            .collect()
    }

    fn apply(&mut self, index: usize, step: &Step) -> Outcome {
        if let Some(label) = step.account() {
            self.labels.insert(label.to_string());
        }
        let result = self.execute(step);
        for event in self.escrow.drain_events() {
            debug!(step = index, ?event, "event");
        }
        let (value, error) = match result {
            Ok(value) => (value, None),
            Err(e) => {
                warn!(step = index, op = step.name(), code = e.code(), "step failed: {e}");
                (None, Some(e.code()))
            }
        };
        Outcome {
            step: index,
            op: step.name(),
            timestamp: self.clock.now(),
            position: self.clock.position(),
            value,
            error,
        }
    }

    fn execute(&mut self, step: &Step) -> Result<Option<u128>, EscrowError> {
        if step.writes() {
            self.clock.mine();
        }
        let now = self.clock.now();
        match step {
            Step::Advance { secs } => {
                self.clock.advance(*secs);
                Ok(None)
            }
            Step::Mine => {
                self.clock.mine();
                Ok(None)
            }
            Step::Mint { account, units: n } => {
                self.escrow
                    .vault_mut()
                    .mint(&AccountId::from_label(account), units(*n))?;
                Ok(None)
            }
            Step::CreateLock {
                account,
                units: n,
                unlock_in,
            } => self
                .escrow
                .create_lock(
                    &AccountId::from_label(account),
                    units(*n),
                    now.saturating_add(*unlock_in),
                )
                .map(|t| Some(u128::from(t))),
            Step::IncreaseAmount { account, units: n } => self
                .escrow
                .increase_amount(&AccountId::from_label(account), units(*n))
                .map(|()| None),
            Step::IncreaseUnlockTime { account, unlock_in } => self
                .escrow
                .increase_unlock_time(
                    &AccountId::from_label(account),
                    now.saturating_add(*unlock_in),
                )
                .map(|t| Some(u128::from(t))),
            Step::Withdraw { account } => self
                .escrow
                .withdraw(&AccountId::from_label(account))
                .map(Some),
            Step::Cancel { account } => self
                .escrow
                .cancel(&AccountId::from_label(account))
                .map(|receipt| Some(receipt.refund)),
            Step::SetMigrator { account } => {
                let migrator = Arc::new(MemoryMigrator::new(AccountId::from_label(account)));
                self.escrow.set_migrator(migrator.clone())?;
                self.migrator = Some(migrator);
                Ok(None)
            }
            Step::Migrate { account } => self
                .escrow
                .migrate(&AccountId::from_label(account))
                .map(|lock| Some(lock.amount)),
            Step::Checkpoint => self
                .escrow
                .checkpoint()
                .map(|report| Some(u128::from(report.steps))),
            Step::Query { account, position } => {
                let id = account.as_deref().map(AccountId::from_label);
                let weight = match (id, position) {
                    (Some(id), None) => Ok(self.escrow.balance_of(&id)),
                    (Some(id), Some(p)) => self.escrow.balance_of_at(&id, *p),
                    (None, None) => self.escrow.total_supply(),
                    (None, Some(p)) => self.escrow.total_supply_at(*p),
                };
                weight.map(Some)
            }
        }
    }

    pub fn summary(&self) -> Result<Summary> {
        let accounts = self
            .labels
            .iter()
            .map(|label| {
                let id = AccountId::from_label(label);
                let lock = self.escrow.locked(&id);
                AccountSummary {
                    account: label.clone(),
                    amount: lock.amount,
                    unlock_time: lock.unlock_time,
                    balance: self.escrow.balance_of(&id),
                    migrated: self.escrow.is_migrated(&id),
                }
            })
            .collect();
        Ok(Summary {
            timestamp: self.clock.now(),
            position: self.clock.position(),
            epoch: self.escrow.epoch(),
            caught_up: self.escrow.is_caught_up(),
            total_supply: self.escrow.total_supply()?,
            locked_supply: self.escrow.locked_supply(),
            accrued_penalties: self.escrow.accrued_penalties(),
            migrated_supply: self.migrator.as_ref().map_or(0, |m| m.custody()),
            accounts,
        })
    }
}

/// Decoded snapshot contents, evaluated at the latest recorded point.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    /// BLAKE3 digest of the snapshot bytes.
    pub digest: String,
    pub size: usize,
    pub config: EscrowConfig,
    pub epoch: usize,
    pub head: Option<Point>,
    pub total_supply: u128,
    pub locked_supply: u128,
    pub accrued_penalties: u128,
    pub accounts: Vec<AccountSummary>,
}

pub fn inspect(bytes: &[u8]) -> Result<Inspection> {
    // A zero clock reads as the head of the history.
    let clock = ManualClock::new(0, 0);
    let escrow = VotingEscrow::restore(bytes, &clock, MemoryVault::new())
        .context("failed to decode snapshot")?;
    let accounts = escrow
        .accounts()
        .into_iter()
        .map(|id| {
            let lock = escrow.locked(&id);
            AccountSummary {
                account: id.to_string(),
                amount: lock.amount,
                unlock_time: lock.unlock_time,
                balance: escrow.balance_of(&id),
                migrated: escrow.is_migrated(&id),
            }
        })
        .collect();
    let epoch = escrow.epoch();
    Ok(Inspection {
        digest: hex::encode(blake3::hash(bytes).as_bytes()),
        size: bytes.len(),
        config: *escrow.config(),
        epoch,
        head: epoch.checked_sub(1).and_then(|i| escrow.point_history(i)),
        total_supply: escrow.total_supply()?,
        locked_supply: escrow.locked_supply(),
        accrued_penalties: escrow.accrued_penalties(),
        accounts,
    })
}
