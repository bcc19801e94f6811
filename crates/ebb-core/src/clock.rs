//! Controllable clock for drivers and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::traits::Clock;

/// A clock advanced explicitly by its owner.
///
/// Every advance also bumps the position, mirroring a chain where each new
/// block carries a later timestamp and the next height. Share it with the
/// engine through an `Arc` and keep a handle to move time forward.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    position: AtomicU64,
}

impl ManualClock {
    /// Create a clock at the given time and position.
    pub fn new(now: u64, position: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
            position: AtomicU64::new(position),
        }
    }

    /// Move time forward by `secs` and advance to the next position.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
        self.position.fetch_add(1, Ordering::SeqCst);
    }

    /// Advance to the next position without moving time.
    pub fn mine(&self) {
        self.position.fetch_add(1, Ordering::SeqCst);
    }

    /// Jump to the next multiple of `interval` strictly after now.
    pub fn advance_to_next_multiple(&self, interval: u64) {
        let now = self.now.load(Ordering::SeqCst);
        let next = (now / interval + 1) * interval;
        self.advance(next - now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_time_and_position() {
        let clock = ManualClock::new(1_000, 5);
        clock.advance(60);
        assert_eq!(clock.now(), 1_060);
        assert_eq!(clock.position(), 6);
    }

    #[test]
    fn mine_keeps_time() {
        let clock = ManualClock::new(1_000, 5);
        clock.mine();
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.position(), 6);
    }

    #[test]
    fn next_multiple_is_strictly_after() {
        let clock = ManualClock::new(300, 0);
        clock.advance_to_next_multiple(100);
        assert_eq!(clock.now(), 400);
        clock.advance_to_next_multiple(100);
        assert_eq!(clock.now(), 500);
        clock.advance(1);
        clock.advance_to_next_multiple(100);
        assert_eq!(clock.now(), 600);
    }
}
