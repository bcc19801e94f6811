//! Append-only checkpoint histories.
//!
//! The global history and each account history are `Vec<Point>` arenas kept
//! in position order by construction. Lookups binary-search by position; a
//! position that falls between recorded points is mapped to a timestamp by
//! interpolating along the global history ([`PointHistory::resolve`]).

use std::collections::HashMap;

use ebb_core::types::{AccountId, Point};
use serde::{Deserialize, Serialize};

/// Ordered sequence of points for one entity. Epoch = number of points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct PointHistory {
    points: Vec<Point>,
}

/// Global point chosen to answer a historical query, and the timestamp the
/// queried position maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub index: usize,
    pub timestamp: u64,
}

impl PointHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point. Positions and timestamps must not decrease.
    pub fn push(&mut self, point: Point) {
        debug_assert!(self.points.last().is_none_or(|last| {
            last.position <= point.position && last.timestamp <= point.timestamp
        }));
        self.points.push(point);
    }

    pub fn epoch(&self) -> usize {
        self.points.len()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Latest point recorded at or before `position`.
    pub fn at_or_before(&self, position: u64) -> Option<&Point> {
        let upper = self.points.partition_point(|p| p.position <= position);
        upper.checked_sub(1).map(|i| &self.points[i])
    }

    /// Map `position` to a timestamp and pick the point to evaluate from.
    ///
    /// When points were recorded at exactly `position`, the timestamp is that
    /// of the first of them and the anchor is the last one sharing that
    /// timestamp. Otherwise the timestamp is interpolated between the
    /// surrounding points, or between the last point and
    /// `(now, current_position)`. Returns `None` before the first point.
    pub fn resolve(&self, position: u64, now: u64, current_position: u64) -> Option<Anchor> {
        let upper = self.points.partition_point(|p| p.position <= position);
        let last = upper.checked_sub(1)?;
        let anchor = &self.points[last];

        if anchor.position == position {
            let first = self.points[..upper].partition_point(|p| p.position < position);
            let timestamp = self.points[first].timestamp;
            let same_time = self.points[first..upper].partition_point(|p| p.timestamp <= timestamp);
            return Some(Anchor {
                index: first + same_time - 1,
                timestamp,
            });
        }

        let timestamp = match self.points.get(upper) {
            Some(next) => interpolate(anchor, next.timestamp, next.position, position),
            None if current_position > anchor.position => {
                interpolate(anchor, now.max(anchor.timestamp), current_position, position)
            }
            None => anchor.timestamp,
        };
        Some(Anchor {
            index: last,
            timestamp,
        })
    }
}

/// Timestamp at `position` on the line from `from` to `(to_ts, to_pos)`.
/// Requires `from.position < position <= to_pos`.
fn interpolate(from: &Point, to_ts: u64, to_pos: u64, position: u64) -> u64 {
    let dt = to_ts.saturating_sub(from.timestamp) as u128;
    let dp = (position - from.position) as u128;
    let span = (to_pos - from.position) as u128;
    from.timestamp + (dt * dp / span) as u64
}

/// Global and per-account histories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct CheckpointLedger {
    global: PointHistory,
    accounts: HashMap<AccountId, PointHistory>,
}

impl CheckpointLedger {
    /// Ledger whose global history starts at `genesis`.
    pub fn new(genesis: Point) -> Self {
        let mut global = PointHistory::new();
        global.push(genesis);
        Self {
            global,
            accounts: HashMap::new(),
        }
    }

    pub fn global(&self) -> &PointHistory {
        &self.global
    }

    /// History of `account`, if it ever recorded a point.
    pub fn account(&self, account: &AccountId) -> Option<&PointHistory> {
        self.accounts.get(account)
    }

    /// Latest global point. The genesis point guarantees one exists.
    pub fn global_head(&self) -> Point {
        self.global.last().copied().unwrap_or_default()
    }

    /// Latest point of `account`, if any.
    pub fn account_head(&self, account: &AccountId) -> Option<&Point> {
        self.account(account).and_then(PointHistory::last)
    }

    pub fn push_global(&mut self, point: Point) {
        self.global.push(point);
    }

    pub fn push_account(&mut self, account: &AccountId, point: Point) {
        self.accounts.entry(*account).or_default().push(point);
    }

    /// Every account that has recorded at least one point.
    pub fn accounts(&self) -> impl Iterator<Item = &AccountId> {
        self.accounts.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(timestamp: u64, position: u64) -> Point {
        Point {
            bias: 0,
            slope: 0,
            timestamp,
            position,
        }
    }

    fn history(points: &[(u64, u64)]) -> PointHistory {
        let mut h = PointHistory::new();
        for &(ts, pos) in points {
            h.push(pt(ts, pos));
        }
        h
    }

    #[test]
    fn at_or_before_binary_search() {
        let h = history(&[(100, 10), (200, 20), (300, 30)]);
        assert!(h.at_or_before(9).is_none());
        assert_eq!(h.at_or_before(10).unwrap().timestamp, 100);
        assert_eq!(h.at_or_before(25).unwrap().timestamp, 200);
        assert_eq!(h.at_or_before(99).unwrap().timestamp, 300);
    }

    #[test]
    fn at_or_before_picks_last_of_equal_positions() {
        let h = history(&[(100, 10), (150, 10), (200, 20)]);
        assert_eq!(h.at_or_before(10).unwrap().timestamp, 150);
    }

    #[test]
    fn resolve_before_history_is_none() {
        let h = history(&[(100, 10)]);
        assert!(h.resolve(9, 500, 50).is_none());
    }

    #[test]
    fn resolve_exact_position() {
        let h = history(&[(100, 10), (200, 20)]);
        assert_eq!(
            h.resolve(20, 1_000, 50),
            Some(Anchor {
                index: 1,
                timestamp: 200
            })
        );
    }

    #[test]
    fn resolve_interpolates_between_points() {
        let h = history(&[(100, 10), (200, 20)]);
        assert_eq!(
            h.resolve(15, 1_000, 50),
            Some(Anchor {
                index: 0,
                timestamp: 150
            })
        );
        assert_eq!(h.resolve(13, 1_000, 50).unwrap().timestamp, 130);
    }

    #[test]
    fn resolve_interpolates_past_last_point_to_now() {
        let h = history(&[(100, 10)]);
        assert_eq!(
            h.resolve(15, 200, 20),
            Some(Anchor {
                index: 0,
                timestamp: 150
            })
        );
        assert_eq!(h.resolve(20, 200, 20).unwrap().timestamp, 200);
    }

    #[test]
    fn resolve_exact_uses_first_time_and_last_point_at_that_time() {
        // Two operations at position 10 (t=100), then boundary points
        // interpolated to position 10 at later times.
        let h = history(&[(50, 5), (100, 10), (100, 10), (259_200, 10), (300_000, 11)]);
        assert_eq!(
            h.resolve(10, 400_000, 12),
            Some(Anchor {
                index: 2,
                timestamp: 100
            })
        );
    }

    #[test]
    fn resolve_is_monotonic() {
        let h = history(&[(100, 10), (150, 10), (400, 14), (1_000, 30)]);
        let mut prev = 0;
        for pos in 10..=40 {
            let ts = h.resolve(pos, 2_000, 40).unwrap().timestamp;
            assert!(ts >= prev, "timestamp went backwards at position {pos}");
            prev = ts;
        }
    }

    #[test]
    fn ledger_genesis_and_accounts() {
        let mut ledger = CheckpointLedger::new(pt(100, 1));
        assert_eq!(ledger.global().epoch(), 1);
        assert_eq!(ledger.global_head(), pt(100, 1));

        let a = AccountId::from_label("a");
        assert!(ledger.account_head(&a).is_none());
        ledger.push_account(&a, pt(120, 2));
        ledger.push_account(&a, pt(130, 3));
        assert_eq!(ledger.account(&a).unwrap().epoch(), 2);
        assert_eq!(ledger.account_head(&a), Some(&pt(130, 3)));
        assert_eq!(ledger.accounts().count(), 1);
    }
}
