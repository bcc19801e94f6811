//! # ebb-escrow — Time-weighted lock accounting engine.
//!
//! All calculations use checked integer arithmetic.
//!
//! Accounts lock fungible units until an interval-aligned unlock time and
//! receive a weight that decays linearly to zero at that time:
//! - **Checkpoints**: every mutation appends a point to the account history
//!   and to the global history, which are never rewritten.
//! - **Slope schedule**: each lock books its slope as a negative delta at its
//!   unlock time; the global aggregate applies deltas as it passes them.
//! - **Bounded catch-up**: the global point advances at most
//!   `max_catch_up_steps` intervals per call, so long idle gaps are walked
//!   over several [`VotingEscrow::checkpoint`] calls.
//! - **Historical queries**: positions resolve to timestamps along the
//!   global history, so per-account and aggregate answers agree exactly.

pub mod escrow;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod schedule;
pub mod store;
pub mod supply;

pub use escrow::{CancelReceipt, CatchUpReport, VotingEscrow};
pub use events::{DepositKind, EscrowEvent};
pub use ledger::{CheckpointLedger, PointHistory};
pub use oracle::BalanceOracle;
pub use schedule::SlopeSchedule;
pub use store::LockStore;
