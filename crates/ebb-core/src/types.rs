//! Core engine types: account identifiers, decay points, locks.
//!
//! Amounts are `u128` base units. Bias and slope are signed (`i128`) so that
//! deltas between two points can be folded into the aggregate directly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EscrowError;

/// A 32-byte account identifier.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The zero identifier.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create an AccountId from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an identifier from a human-readable label (BLAKE3 of its bytes).
    ///
    /// Scenario files and tests name accounts ("alice", "bob"); this maps
    /// each name to a stable identifier.
    pub fn from_label(label: &str) -> Self {
        Self(blake3::hash(label.as_bytes()).into())
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Linear decay state recorded at a ledger position.
///
/// The value at any time `t >= timestamp` is
/// `max(0, bias - slope * (t - timestamp))`.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Point {
    /// Value at `timestamp`.
    pub bias: i128,
    /// Decay per second.
    pub slope: i128,
    /// Unix seconds at which `bias` holds.
    pub timestamp: u64,
    /// Clock position of the operation that recorded this point.
    pub position: u64,
}

impl Point {
    /// A zero-valued point.
    pub fn zero(timestamp: u64, position: u64) -> Self {
        Self {
            bias: 0,
            slope: 0,
            timestamp,
            position,
        }
    }

    /// Decay point for a lock observed at `now`.
    ///
    /// `slope = amount / max_lock_duration` and `bias = slope * (unlock_time - now)`,
    /// so the value reaches exactly zero at the unlock time. Empty or
    /// already-expired locks yield a zero point.
    pub fn for_lock(
        lock: &LockedBalance,
        max_lock_duration: u64,
        now: u64,
        position: u64,
    ) -> Result<Self, EscrowError> {
        if lock.amount == 0 || lock.unlock_time <= now {
            return Ok(Self::zero(now, position));
        }
        let slope = i128::try_from(lock.amount / max_lock_duration as u128)
            .map_err(|_| EscrowError::ArithmeticOverflow)?;
        let bias = slope
            .checked_mul((lock.unlock_time - now) as i128)
            .ok_or(EscrowError::ArithmeticOverflow)?;
        Ok(Self {
            bias,
            slope,
            timestamp: now,
            position,
        })
    }

    /// Value at time `t`, floored at zero.
    ///
    /// Times before `timestamp` evaluate to the recorded bias.
    pub fn value_at(&self, t: u64) -> u128 {
        let dt = t.saturating_sub(self.timestamp) as i128;
        let value = self.bias.saturating_sub(self.slope.saturating_mul(dt));
        value.max(0) as u128
    }

    /// Whether bias, slope, and timestamp match `other` (position ignored).
    pub fn same_state(&self, other: &Point) -> bool {
        self.bias == other.bias && self.slope == other.slope && self.timestamp == other.timestamp
    }
}

/// An account's current lock.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct LockedBalance {
    /// Locked base units. Zero means no lock.
    pub amount: u128,
    /// Release time, a multiple of the configured interval. Zero when unlocked.
    pub unlock_time: u64,
    /// Time the lock was created. Used for the early-cancellation penalty.
    pub start: u64,
}

impl LockedBalance {
    /// The cleared lock.
    pub const EMPTY: Self = Self {
        amount: 0,
        unlock_time: 0,
        start: 0,
    };

    /// Whether no units are locked.
    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// Whether the release time has been reached at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.unlock_time <= now
    }
}
