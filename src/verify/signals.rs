//! Derived behavioral signals
//!
//! Raw measurements computed from collected telemetry. Each function is pure
//! and tolerates sparse input by returning 0.0; the minimum-sample gates that
//! decide whether a signal is scored at all live in the scoring engine.

use std::f64::consts::PI;

use crate::verify::types::TelemetrySample;

/// Mean absolute turning-angle change across consecutive point triplets.
///
/// Angle differences are wrapped into [0, π] so a heading change from just
/// below +π to just above -π counts as a small turn.
pub fn path_jitter<'a, I>(samples: I) -> f64
where
    I: IntoIterator<Item = &'a TelemetrySample>,
{
    let points: Vec<&TelemetrySample> = samples.into_iter().collect();
    if points.len() < 3 {
        return 0.0;
    }

    let headings: Vec<f64> = points
        .windows(2)
        .map(|w| (w[1].y - w[0].y).atan2(w[1].x - w[0].x))
        .collect();

    let turns: Vec<f64> = headings
        .windows(2)
        .map(|w| {
            let diff = (w[1] - w[0]).abs() % (2.0 * PI);
            if diff > PI {
                2.0 * PI - diff
            } else {
                diff
            }
        })
        .collect();

    turns.iter().sum::<f64>() / turns.len() as f64
}

/// Population standard deviation of intervals between consecutive timestamps
pub fn interval_std_dev(timestamps: &[f64]) -> f64 {
    if timestamps.len() < 2 {
        return 0.0;
    }

    let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    let variance = intervals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Micro-movements per accepted pointer sample
pub fn micro_movement_ratio(micro_movements: u32, sample_count: u64) -> f64 {
    if sample_count == 0 {
        return 0.0;
    }
    micro_movements as f64 / sample_count as f64
}

/// Fraction of consecutive velocity deltas whose sign flips.
///
/// Natural pointer motion accelerates and decelerates constantly; scripted
/// motion tends to hold a constant (or monotonic) velocity.
pub fn velocity_naturalness<'a, I>(velocities: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let velocities: Vec<f64> = velocities.into_iter().copied().collect();
    if velocities.len() < 3 {
        return 0.0;
    }

    let deltas: Vec<f64> = velocities.windows(2).map(|w| w[1] - w[0]).collect();
    let reversals = deltas.windows(2).filter(|w| w[0] * w[1] < 0.0).count();
    reversals as f64 / (deltas.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64, t: f64) -> TelemetrySample {
        TelemetrySample {
            x,
            y,
            timestamp_ms: t,
        }
    }

    #[test]
    fn test_straight_line_has_no_jitter() {
        let points: Vec<_> = (0..12).map(|i| sample(i as f64 * 5.0, 0.0, i as f64)).collect();
        assert!(path_jitter(&points).abs() < 1e-12);
    }

    #[test]
    fn test_right_angle_turns() {
        // Square walk: every triplet turns by π/2
        let points = vec![
            sample(0.0, 0.0, 0.0),
            sample(10.0, 0.0, 1.0),
            sample(10.0, 10.0, 2.0),
            sample(0.0, 10.0, 3.0),
            sample(0.0, 0.0, 4.0),
        ];
        assert!((path_jitter(&points) - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_jitter_wraps_across_pi() {
        // Headings just above and just below the ±π seam
        let points = vec![
            sample(0.0, 0.0, 0.0),
            sample(-10.0, 0.1, 1.0),
            sample(-20.0, 0.0, 2.0),
        ];
        let jitter = path_jitter(&points);
        assert!(jitter < 0.05, "expected small wrapped turn, got {jitter}");
    }

    #[test]
    fn test_jitter_sparse_input() {
        assert_eq!(path_jitter(&[sample(0.0, 0.0, 0.0), sample(1.0, 1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_interval_std_dev() {
        // Regular intervals have zero spread
        assert_eq!(interval_std_dev(&[0.0, 100.0, 200.0, 300.0]), 0.0);

        // Intervals 100, 300 -> mean 200, std dev 100
        assert!((interval_std_dev(&[0.0, 100.0, 400.0]) - 100.0).abs() < 1e-9);

        assert_eq!(interval_std_dev(&[42.0]), 0.0);
        assert_eq!(interval_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_micro_movement_ratio() {
        assert_eq!(micro_movement_ratio(0, 0), 0.0);
        assert!((micro_movement_ratio(5, 50) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_naturalness() {
        // Alternating speeds: every delta pair flips sign
        let zigzag = [1.0, 2.0, 1.0, 2.0, 1.0, 2.0];
        assert!((velocity_naturalness(&zigzag) - 1.0).abs() < 1e-12);

        // Constant acceleration never flips
        let ramp = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(velocity_naturalness(&ramp), 0.0);

        // Flat velocity has zero deltas, which are not reversals
        let flat = [3.0; 8];
        assert_eq!(velocity_naturalness(&flat), 0.0);

        assert_eq!(velocity_naturalness(&[1.0, 2.0]), 0.0);
    }
}
