//! Slope changes scheduled at future unlock times.

use std::collections::BTreeMap;
use std::ops::Bound;

use ebb_core::error::EscrowError;
use serde::{Deserialize, Serialize};

/// Interval-aligned timestamp → signed slope delta.
///
/// A lock with slope `s` ending at `t` contributes `-s` at `t`. When the
/// global ledger reaches `t` the delta is added to the aggregate slope.
/// Entries that sum back to zero are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct SlopeSchedule {
    changes: BTreeMap<u64, i128>,
}

impl SlopeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta scheduled at `timestamp` (zero if none).
    pub fn get(&self, timestamp: u64) -> i128 {
        self.changes.get(&timestamp).copied().unwrap_or(0)
    }

    /// Value the entry at `timestamp` would hold after adding `delta`.
    pub fn adjusted(&self, timestamp: u64, delta: i128) -> Result<i128, EscrowError> {
        self.get(timestamp)
            .checked_add(delta)
            .ok_or(EscrowError::ArithmeticOverflow)
    }

    /// Overwrite the entry at `timestamp`; zero removes it.
    pub fn set(&mut self, timestamp: u64, value: i128) {
        if value == 0 {
            self.changes.remove(&timestamp);
        } else {
            self.changes.insert(timestamp, value);
        }
    }

    /// Add `delta` to the entry at `timestamp`.
    pub fn adjust(&mut self, timestamp: u64, delta: i128) -> Result<(), EscrowError> {
        let value = self.adjusted(timestamp, delta)?;
        self.set(timestamp, value);
        Ok(())
    }

    /// Entries with `after < timestamp <= until`, in time order.
    pub fn between(&self, after: u64, until: u64) -> impl Iterator<Item = (u64, i128)> + '_ {
        let range = if after < until {
            Some((Bound::Excluded(after), Bound::Included(until)))
        } else {
            None
        };
        range
            .into_iter()
            .flat_map(|r| self.changes.range(r))
            .map(|(t, d)| (*t, *d))
    }

    /// Number of timestamps with a pending delta.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
