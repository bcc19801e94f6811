//! Engine constants. All durations are in seconds, all amounts in base units
//! (1 token = 10^18 base units).

pub const UNIT: u128 = 1_000_000_000_000_000_000;

pub const HOUR: u64 = 3_600;
pub const DAY: u64 = 24 * HOUR;
pub const YEAR: u64 = 365 * DAY;

/// Default rounding granularity for unlock times.
///
/// Every unlock time is rounded down to a multiple of this value, and the
/// global ledger records a checkpoint at each multiple it walks across.
pub const DEFAULT_INTERVAL: u64 = 3 * DAY;

/// Default maximum lock duration (MAXTIME).
///
/// A lock of `amount` decays at `amount / MAXTIME` per second regardless of
/// its own duration, so a maximal lock starts at roughly `amount` weight.
pub const DEFAULT_MAX_LOCK_DURATION: u64 = 4 * YEAR;

/// Default upper bound on INTERVAL steps walked by one global catch-up.
pub const DEFAULT_MAX_CATCH_UP_STEPS: u32 = 255;

/// Fixed-point denominator for early-cancellation penalty rates.
pub const PENALTY_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Minimum penalty rate applied on cancellation (50%).
pub const MIN_PENALTY_RATE: u128 = PENALTY_PRECISION / 2;
