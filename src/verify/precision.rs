//! Precision timing challenge
//!
//! Five rings appear one at a time and shrink away. The user should click
//! each ring when it is about 70% through its shrink; early and late clicks
//! are penalized symmetrically.

use serde::Serialize;

use crate::verify::types::RoundOutcome;

/// Number of rings per precision challenge
pub const RING_COUNT: usize = 5;

/// Fraction of the shrink duration that earns full accuracy
const SWEET_SPOT: f64 = 0.7;

/// Distance from the sweet spot at which accuracy reaches zero
const FALLOFF: f64 = 0.4;

/// Clicks scoring above this count as hits
const HIT_THRESHOLD: f64 = 0.3;

const BASE_DURATION_MS: u64 = 2200;
const DURATION_STEP_MS: u64 = 150;
const BASE_RING_SIZE: f64 = 90.0;
const RING_SIZE_STEP: f64 = 6.0;

/// Ring positions as percentages of the interaction surface
const RING_POSITIONS: [(f64, f64); RING_COUNT] = [
    (25.0, 30.0),
    (70.0, 25.0),
    (50.0, 60.0),
    (20.0, 70.0),
    (75.0, 70.0),
];

/// One shrinking ring
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrecisionTarget {
    pub index: usize,
    pub x_pct: f64,
    pub y_pct: f64,
    /// Shrink duration; the ring expires once it elapses
    pub duration_ms: u64,
    pub size: f64,
}

/// Target for round `index`, or `None` past the last ring
pub fn target(index: usize) -> Option<PrecisionTarget> {
    let (x_pct, y_pct) = *RING_POSITIONS.get(index)?;
    Some(PrecisionTarget {
        index,
        x_pct,
        y_pct,
        duration_ms: BASE_DURATION_MS - index as u64 * DURATION_STEP_MS,
        size: BASE_RING_SIZE - index as f64 * RING_SIZE_STEP,
    })
}

/// All targets in presentation order
pub fn targets() -> Vec<PrecisionTarget> {
    (0..RING_COUNT).filter_map(target).collect()
}

/// `1 - min(1, |progress - 0.7| / 0.4)`
pub fn click_accuracy(progress: f64) -> f64 {
    1.0 - ((progress - SWEET_SPOT).abs() / FALLOFF).min(1.0)
}

/// Whether a click accuracy counts as a hit (strictly above 0.3)
pub fn is_hit(accuracy: f64) -> bool {
    accuracy > HIT_THRESHOLD
}

/// Outcome of a click `elapsed_ms` into a ring of `duration_ms`
pub fn score_click(elapsed_ms: f64, duration_ms: u64) -> RoundOutcome {
    let progress = if duration_ms > 0 {
        elapsed_ms / duration_ms as f64
    } else {
        1.0
    };
    let accuracy = click_accuracy(progress);
    RoundOutcome {
        hit: is_hit(accuracy),
        timing: progress,
        accuracy,
    }
}

/// `0.5 * hits/5 + 0.5 * mean accuracy`
pub fn aggregate_rounds(rounds: &[RoundOutcome]) -> f64 {
    if rounds.is_empty() {
        return 0.0;
    }
    let hits = rounds.iter().filter(|r| r.hit).count();
    let mean_accuracy = rounds.iter().map(|r| r.accuracy).sum::<f64>() / rounds.len() as f64;
    0.5 * (hits as f64 / RING_COUNT as f64) + 0.5 * mean_accuracy
}
