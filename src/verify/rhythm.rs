//! Rhythm reproduction challenge
//!
//! A beat pattern is played back, then the user taps it from memory. Taps are
//! matched to their nearest beat and blended into a task accuracy.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A fixed sequence of beat offsets (ms from pattern start)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RhythmPattern {
    pub name: &'static str,
    pub beats: &'static [f64],
}

impl RhythmPattern {
    pub fn beat_count(&self) -> usize {
        self.beats.len()
    }

    /// Offset of the final beat
    pub fn duration_ms(&self) -> f64 {
        self.beats.last().copied().unwrap_or(0.0)
    }
}

/// Pattern catalog; one is drawn at random per listen phase
pub const RHYTHM_PATTERNS: &[RhythmPattern] = &[
    RhythmPattern {
        name: "steady",
        beats: &[0.0, 600.0, 1200.0, 1800.0],
    },
    RhythmPattern {
        name: "gallop",
        beats: &[0.0, 300.0, 600.0, 1200.0, 1500.0],
    },
    RhythmPattern {
        name: "syncopated",
        beats: &[0.0, 400.0, 600.0, 1000.0, 1400.0],
    },
    RhythmPattern {
        name: "heartbeat",
        beats: &[0.0, 250.0, 1000.0, 1250.0],
    },
];

/// Weight of the matched-beat ratio in the blended accuracy
const MATCH_WEIGHT: f64 = 0.6;

/// Weight of timing quality in the blended accuracy
const TIMING_WEIGHT: f64 = 0.4;

/// Draw a pattern from the catalog
pub fn choose_pattern<R: Rng + ?Sized>(rng: &mut R) -> &'static RhythmPattern {
    RHYTHM_PATTERNS
        .choose(rng)
        .unwrap_or(&RHYTHM_PATTERNS[0])
}

/// Breakdown of a rhythm evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmEvaluation {
    /// Taps within tolerance of their nearest beat
    pub matched: usize,
    pub total_beats: usize,
    /// Mean distance of matched taps to their beats (ms)
    pub mean_error_ms: f64,
    /// `max(0, 1 - mean_error / tolerance)`, 0 with no matches
    pub timing_quality: f64,
    /// `0.6 * matched/total_beats + 0.4 * timing_quality`
    pub accuracy: f64,
}

/// Score taps (offsets, ms) against a beat pattern.
///
/// Each tap is matched independently to its nearest beat; several taps may
/// land on the same beat.
pub fn evaluate_taps(beats: &[f64], taps: &[f64], tolerance_ms: f64) -> RhythmEvaluation {
    let errors: Vec<f64> = taps
        .iter()
        .filter_map(|&tap| {
            beats
                .iter()
                .map(|&beat| (tap - beat).abs())
                .min_by(|a, b| a.total_cmp(b))
        })
        .filter(|&error| error < tolerance_ms)
        .collect();

    let matched = errors.len();
    let total_beats = beats.len();

    let mean_error_ms = if matched > 0 {
        errors.iter().sum::<f64>() / matched as f64
    } else {
        0.0
    };
    let timing_quality = if matched > 0 {
        (1.0 - mean_error_ms / tolerance_ms).max(0.0)
    } else {
        0.0
    };
    let match_ratio = if total_beats > 0 {
        matched as f64 / total_beats as f64
    } else {
        0.0
    };

    RhythmEvaluation {
        matched,
        total_beats,
        mean_error_ms,
        timing_quality,
        accuracy: MATCH_WEIGHT * match_ratio + TIMING_WEIGHT * timing_quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_close_taps_all_match() {
        let eval = evaluate_taps(&[0.0, 600.0, 1200.0], &[10.0, 590.0, 1250.0], 250.0);

        assert_eq!(eval.matched, 3);
        let mean_error = (10.0 + 10.0 + 50.0) / 3.0;
        assert!((eval.mean_error_ms - mean_error).abs() < 1e-9);

        let timing_quality = 1.0 - mean_error / 250.0;
        assert!((eval.timing_quality - 0.9067).abs() < 0.001);
        assert!((eval.accuracy - (0.6 + 0.4 * timing_quality)).abs() < 1e-9);
        assert!((eval.accuracy - 0.963).abs() < 0.001);
    }

    #[test]
    fn test_far_taps_score_zero() {
        let eval = evaluate_taps(&[0.0, 600.0, 1200.0], &[300.0, 900.0, 1500.0], 250.0);
        assert_eq!(eval.matched, 0);
        assert_eq!(eval.timing_quality, 0.0);
        assert_eq!(eval.accuracy, 0.0);
    }

    #[test]
    fn test_tolerance_is_exclusive() {
        let eval = evaluate_taps(&[0.0, 1000.0], &[250.0, 1249.0], 250.0);
        assert_eq!(eval.matched, 1);
        assert!((eval.mean_error_ms - 249.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_match_blend() {
        // Two perfect taps out of four beats
        let eval = evaluate_taps(&[0.0, 600.0, 1200.0, 1800.0], &[0.0, 600.0], 250.0);
        assert_eq!(eval.matched, 2);
        assert!((eval.accuracy - (0.6 * 0.5 + 0.4 * 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(evaluate_taps(&[0.0, 500.0], &[], 250.0).accuracy, 0.0);
        assert_eq!(evaluate_taps(&[], &[0.0], 250.0).accuracy, 0.0);
    }

    #[test]
    fn test_catalog_is_well_formed() {
        for pattern in RHYTHM_PATTERNS {
            assert!(pattern.beat_count() >= 3, "{} too short", pattern.name);
            assert_eq!(pattern.beats[0], 0.0);
            assert!(pattern.beats.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_choose_pattern_is_seeded() {
        let a = choose_pattern(&mut StdRng::seed_from_u64(7));
        let b = choose_pattern(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.name, b.name);
    }
}
