//! Global decay aggregation.
//!
//! [`catch_up`] walks the global point forward one interval at a time,
//! applying scheduled slope changes at each boundary and recording a point
//! there. The walk is capped at `max_catch_up_steps` per call; a ledger left
//! behind is moved on by further calls. [`project`] evaluates the same
//! trajectory read-only, visiting only the scheduled entries in range.
//!
//! All arithmetic is integer-only and checked.

use ebb_core::config::EscrowConfig;
use ebb_core::error::EscrowError;
use ebb_core::types::Point;

use crate::schedule::SlopeSchedule;

/// Result of one bounded catch-up walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUp {
    /// Points to append, in order. The last one is the new head.
    pub points: Vec<Point>,
    /// Interval steps taken.
    pub steps: u32,
    /// Whether the walk reached `now`.
    pub reached: bool,
}

impl CatchUp {
    /// The point the walk stopped at.
    pub fn head(&self) -> Option<&Point> {
        self.points.last()
    }
}

/// Decay `point` linearly to `t`, then add `d_slope` to its slope.
/// Bias and slope are clamped at zero.
fn decay_to(point: &mut Point, t: u64, d_slope: i128) -> Result<(), EscrowError> {
    let dt = t.saturating_sub(point.timestamp) as i128;
    let decayed = point
        .slope
        .checked_mul(dt)
        .and_then(|d| point.bias.checked_sub(d))
        .ok_or(EscrowError::ArithmeticOverflow)?;
    let slope = point
        .slope
        .checked_add(d_slope)
        .ok_or(EscrowError::ArithmeticOverflow)?;
    point.bias = decayed.max(0);
    point.slope = slope.max(0);
    point.timestamp = point.timestamp.max(t);
    Ok(())
}

/// Walk the global state from `last` toward `(now, position)`.
///
/// Boundary points get positions interpolated between `last.position` and
/// `position`; the final point, if `now` is reached, carries `position`.
pub fn catch_up(
    last: &Point,
    schedule: &SlopeSchedule,
    config: &EscrowConfig,
    now: u64,
    position: u64,
) -> Result<CatchUp, EscrowError> {
    let now = now.max(last.timestamp);
    let position = position.max(last.position);
    let elapsed = (now - last.timestamp) as u128;
    let advanced = (position - last.position) as u128;

    let mut point = *last;
    let mut t = config.round_down(last.timestamp);
    let mut points = Vec::new();
    let mut steps = 0;

    while steps < config.max_catch_up_steps {
        steps += 1;
        t = t.saturating_add(config.interval);
        let d_slope = if t > now {
            t = now;
            0
        } else {
            schedule.get(t)
        };
        decay_to(&mut point, t, d_slope)?;

        if t == now {
            point.position = position;
            points.push(point);
            return Ok(CatchUp {
                points,
                steps,
                reached: true,
            });
        }

        // t < now here, so elapsed > 0.
        let offset = advanced * (t - last.timestamp) as u128 / elapsed;
        point.position = last.position + offset as u64;
        points.push(point);
    }

    Ok(CatchUp {
        points,
        steps,
        reached: false,
    })
}

/// State of `point` carried forward to `target` without recording anything.
pub fn project(point: &Point, schedule: &SlopeSchedule, target: u64) -> Result<Point, EscrowError> {
    let mut p = *point;
    for (t, d_slope) in schedule.between(point.timestamp, target) {
        decay_to(&mut p, t, d_slope)?;
    }
    decay_to(&mut p, target, 0)?;
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(interval: u64, steps: u32) -> EscrowConfig {
        EscrowConfig {
            interval,
            max_lock_duration: interval * 1_000,
            max_catch_up_steps: steps,
        }
    }

    fn point(bias: i128, slope: i128, timestamp: u64, position: u64) -> Point {
        Point {
            bias,
            slope,
            timestamp,
            position,
        }
    }

    #[test]
    fn no_elapsed_time_is_single_step() {
        let last = point(1_000, 10, 150, 4);
        let walk = catch_up(&last, &SlopeSchedule::new(), &config(100, 255), 150, 5).unwrap();
        assert!(walk.reached);
        assert_eq!(walk.steps, 1);
        assert_eq!(walk.points, vec![point(1_000, 10, 150, 5)]);
    }

    #[test]
    fn boundary_applies_scheduled_change() {
        let mut schedule = SlopeSchedule::new();
        schedule.adjust(200, -4).unwrap();
        let last = point(1_000, 10, 150, 1);
        let walk = catch_up(&last, &schedule, &config(100, 255), 250, 3).unwrap();
        assert!(walk.reached);
        assert_eq!(walk.steps, 2);
        assert_eq!(
            walk.points,
            vec![point(500, 6, 200, 2), point(200, 6, 250, 3)]
        );
    }

    #[test]
    fn landing_on_boundary_applies_change_once() {
        let mut schedule = SlopeSchedule::new();
        schedule.adjust(300, -10).unwrap();
        let last = point(1_000, 10, 200, 0);
        let walk = catch_up(&last, &schedule, &config(100, 255), 300, 1).unwrap();
        assert_eq!(walk.points, vec![point(0, 0, 300, 1)]);
    }

    #[test]
    fn stops_at_step_bound() {
        let last = point(0, 0, 100, 0);
        let walk = catch_up(&last, &SlopeSchedule::new(), &config(100, 3), 450, 9).unwrap();
        assert!(!walk.reached);
        assert_eq!(walk.steps, 3);
        let times: Vec<u64> = walk.points.iter().map(|p| p.timestamp).collect();
        assert_eq!(times, vec![200, 300, 400]);

        let resumed = catch_up(walk.head().unwrap(), &SlopeSchedule::new(), &config(100, 3), 450, 9)
            .unwrap();
        assert!(resumed.reached);
        assert_eq!(resumed.steps, 1);
        assert_eq!(resumed.head().unwrap().timestamp, 450);
    }

    #[test]
    fn exact_step_bound_reaches_now() {
        let last = point(0, 0, 100, 0);
        let walk = catch_up(&last, &SlopeSchedule::new(), &config(100, 3), 400, 9).unwrap();
        assert!(walk.reached);
        assert_eq!(walk.steps, 3);
        assert_eq!(walk.points.len(), 3);
    }

    #[test]
    fn boundary_positions_are_interpolated() {
        let last = point(0, 0, 0, 10);
        let walk = catch_up(&last, &SlopeSchedule::new(), &config(100, 255), 400, 14).unwrap();
        let positions: Vec<u64> = walk.points.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![11, 12, 13, 14]);
    }

    #[test]
    fn clamps_at_zero() {
        let last = point(10, 1, 0, 0);
        let walk = catch_up(&last, &SlopeSchedule::new(), &config(1_000, 255), 100, 1).unwrap();
        assert_eq!(walk.head().unwrap().bias, 0);
    }

    #[test]
    fn project_does_not_need_boundaries() {
        let mut schedule = SlopeSchedule::new();
        schedule.adjust(200, -4).unwrap();
        let p = project(&point(1_000, 10, 150, 1), &schedule, 250).unwrap();
        assert_eq!((p.bias, p.slope, p.timestamp), (200, 6, 250));
        assert_eq!(p.position, 1);
    }

    #[test]
    fn project_to_own_time_is_identity() {
        let p = point(77, 3, 500, 2);
        assert_eq!(project(&p, &SlopeSchedule::new(), 500).unwrap(), p);
    }

    #[test]
    fn overflow_reported() {
        let last = point(0, i128::MAX, 0, 0);
        assert_eq!(
            catch_up(&last, &SlopeSchedule::new(), &config(100, 255), 50, 1),
            Err(EscrowError::ArithmeticOverflow)
        );
    }

    proptest! {
        /// For a consistent set of locks, the stepped walk and the
        /// read-only projection both equal the closed-form sum.
        #[test]
        fn walk_and_projection_agree(
            locks in prop::collection::vec((1i128..1_000_000, 1u64..40), 1..8),
            elapsed in 0u64..5_000,
        ) {
            let interval = 100;
            let start = 1_050;
            let mut schedule = SlopeSchedule::new();
            let mut last = point(0, 0, start, 0);
            for &(slope, intervals) in &locks {
                let end = (start / interval + intervals) * interval;
                last.slope += slope;
                last.bias += slope * (end - start) as i128;
                schedule.adjust(end, -slope).unwrap();
            }
            let now = start + elapsed;
            let expected: i128 = locks
                .iter()
                .map(|&(slope, intervals)| {
                    let end = (start / interval + intervals) * interval;
                    slope * end.saturating_sub(now) as i128
                })
                .sum();

            let walk = catch_up(&last, &schedule, &config(interval, 1_000), now, 1).unwrap();
            prop_assert!(walk.reached);
            let head = walk.head().unwrap();
            let projected = project(&last, &schedule, now).unwrap();
            prop_assert_eq!(head.bias, expected);
            prop_assert_eq!(projected.bias, expected);
            prop_assert_eq!(head.slope, projected.slope);
        }
    }
}
