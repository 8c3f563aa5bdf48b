//! Message-rate trend detection for the time-offset gutter.
//!
//! Points are fed newest-first while walking up the view. The collector
//! keeps accepting points while the gap between consecutive messages keeps
//! trending the same way; a sign change in the trend ends the window. The
//! resulting direction colors the offset-bar column.

/// How many rows back the trend window may reach.
const MAX_POINTS: usize = 10;

/// Minimum gap change, in milliseconds, before a trend is called.
const THRESHOLD_MILLIS: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Steady,
    /// Messages are arriving faster toward the newest point.
    Accel,
    /// Messages are arriving slower toward the newest point.
    Decel,
}

#[derive(Debug, Default)]
pub struct LogAccel {
    last_point: Option<i64>,
    /// Gaps between consecutive points; index 0 is the newest gap.
    deltas: Vec<i64>,
    trend_sign: i64,
}

impl LogAccel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next (older) point. Returns false when the window is
    /// closed: the trend reversed or enough points were collected.
    pub fn add_point(&mut self, millis: i64) -> bool {
        let Some(last) = self.last_point else {
            self.last_point = Some(millis);
            return true;
        };

        let delta = last - millis;
        if let Some(&prev_delta) = self.deltas.last() {
            let change = (delta - prev_delta).signum();
            if change != 0 {
                if self.trend_sign == 0 {
                    self.trend_sign = change;
                } else if change != self.trend_sign {
                    return false;
                }
            }
        }

        self.deltas.push(delta);
        self.last_point = Some(millis);
        self.deltas.len() < MAX_POINTS
    }

    pub fn get_direction(&self) -> Direction {
        if self.deltas.len() < 2 {
            return Direction::Steady;
        }

        let newest = self.deltas[0];
        let oldest = self.deltas[self.deltas.len() - 1];
        let diff = oldest - newest;
        if diff.abs() < THRESHOLD_MILLIS {
            Direction::Steady
        } else if diff > 0 {
            Direction::Accel
        } else {
            Direction::Decel
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(points: &[i64]) -> LogAccel {
        let mut accel = LogAccel::new();
        for &p in points {
            if !accel.add_point(p) {
                break;
            }
        }
        accel
    }

    #[test]
    fn too_few_points_is_steady() {
        assert_eq!(feed(&[1_000]).get_direction(), Direction::Steady);
        assert_eq!(feed(&[1_000, 900]).get_direction(), Direction::Steady);
    }

    #[test]
    fn shrinking_gaps_toward_now_is_accel() {
        // Newest first: gaps of 100, 400, 1600 going back in time.
        let accel = feed(&[10_000, 9_900, 9_500, 7_900]);
        assert_eq!(accel.get_direction(), Direction::Accel);
    }

    #[test]
    fn growing_gaps_toward_now_is_decel() {
        // Newest first: gaps of 1600, 400, 100 going back in time.
        let accel = feed(&[10_000, 8_400, 8_000, 7_900]);
        assert_eq!(accel.get_direction(), Direction::Decel);
    }

    #[test]
    fn uniform_cadence_is_steady() {
        let accel = feed(&[5_000, 4_000, 3_000, 2_000, 1_000]);
        assert_eq!(accel.get_direction(), Direction::Steady);
    }

    #[test]
    fn trend_reversal_closes_the_window() {
        let mut accel = LogAccel::new();
        assert!(accel.add_point(10_000));
        assert!(accel.add_point(9_900)); // gap 100
        assert!(accel.add_point(9_500)); // gap 400, trend set
        assert!(!accel.add_point(9_450)); // gap 50, reversal
    }

    #[test]
    fn window_is_bounded() {
        let mut accel = LogAccel::new();
        let mut t = 1_000_000;
        let mut accepted = 0;
        loop {
            if !accel.add_point(t) {
                break;
            }
            accepted += 1;
            t -= 1_000;
            assert!(accepted < 50, "window never closed");
        }
        assert_eq!(accel.get_direction(), Direction::Steady);
    }
}
