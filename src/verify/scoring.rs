//! Verification scoring
//!
//! Turns collected telemetry plus a task-accuracy scalar into five bounded
//! sub-scores, a 0-100 total, and a human/bot verdict.
//!
//! | Sub-score          | Max | Signal                               |
//! |--------------------|-----|--------------------------------------|
//! | path naturalness   | 25  | mean turning-angle change (radians)  |
//! | timing humanness   | 25  | std dev of tap/click intervals (ms)  |
//! | bio signal         | 15  | micro-movement ratio                 |
//! | velocity profile   | 15  | acceleration sign-reversal fraction  |
//! | task accuracy      | 20  | challenge accuracy in [0, 1]         |

use tracing::debug;

use crate::config::DEFAULT_HUMAN_THRESHOLD;
use crate::verify::signals::{
    interval_std_dev, micro_movement_ratio, path_jitter, velocity_naturalness,
};
use crate::verify::telemetry::TelemetryCollector;
use crate::verify::types::{
    ChallengeKind, ScoreBreakdown, VerificationDetails, VerificationResult,
};

/// Minimum pointer samples before path naturalness is scored
const MIN_PATH_SAMPLES: usize = 10;

/// Minimum tap/click timestamps before timing is scored
const MIN_TIMING_EVENTS: usize = 3;

/// Minimum velocity samples before the velocity profile is scored
const MIN_VELOCITY_SAMPLES: usize = 5;

/// Confidence never reaches certainty
const MAX_CONFIDENCE: u32 = 99;

/// Scoring engine; stateless apart from its verdict threshold
#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine {
    human_threshold: u32,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(DEFAULT_HUMAN_THRESHOLD)
    }
}

impl ScoringEngine {
    pub fn new(human_threshold: u32) -> Self {
        Self { human_threshold }
    }

    /// Verdict for a total score
    pub fn is_human_total(&self, total: u32) -> bool {
        total >= self.human_threshold
    }

    /// Score one session.
    ///
    /// Deterministic for identical inputs and never mutates the telemetry.
    /// `now_ms` is only used for the reported elapsed time.
    pub fn score(
        &self,
        telemetry: &TelemetryCollector,
        challenge: ChallengeKind,
        task_accuracy: f64,
        now_ms: f64,
    ) -> VerificationResult {
        let samples = telemetry.samples();
        let velocities = telemetry.velocities();
        let timestamps = match challenge {
            ChallengeKind::Rhythm => telemetry.taps(),
            ChallengeKind::Precision => telemetry.clicks(),
        };

        let jitter = path_jitter(samples);
        let timing_variance = interval_std_dev(timestamps);
        let micro_ratio =
            micro_movement_ratio(telemetry.micro_movements(), telemetry.accepted_samples());
        let velocity_nat = velocity_naturalness(velocities);

        let scores = ScoreBreakdown {
            path_naturalness: score_path_naturalness(samples.len(), jitter),
            timing_humanness: score_timing_humanness(timestamps.len(), timing_variance),
            bio_signal: score_bio_signal(micro_ratio),
            velocity_profile: score_velocity_profile(velocities.len(), velocity_nat),
            task_accuracy: score_task_accuracy(task_accuracy),
        };

        let total = scores.total();
        let is_human = self.is_human_total(total);
        let confidence = compute_confidence(total);

        debug!(
            challenge = %challenge,
            path = scores.path_naturalness,
            timing = scores.timing_humanness,
            bio = scores.bio_signal,
            velocity = scores.velocity_profile,
            task = scores.task_accuracy,
            total,
            "scored session"
        );

        VerificationResult {
            scores,
            total,
            is_human,
            confidence,
            total_time_ms: telemetry.elapsed_ms(now_ms),
            details: VerificationDetails {
                sample_count: samples.len(),
                micro_movements: telemetry.micro_movements(),
                hesitations: telemetry.hesitations(),
                jitter,
                timing_variance,
                velocity_naturalness: velocity_nat,
            },
        }
    }
}

fn score_path_naturalness(sample_count: usize, jitter: f64) -> u32 {
    if sample_count < MIN_PATH_SAMPLES {
        return 0;
    }
    if jitter > 0.05 && jitter < 1.5 {
        ScoreBreakdown::MAX_PATH_NATURALNESS
    } else if jitter > 0.02 {
        15
    } else {
        5
    }
}

fn score_timing_humanness(event_count: usize, variance: f64) -> u32 {
    if event_count < MIN_TIMING_EVENTS {
        return 0;
    }
    if variance > 15.0 && variance < 300.0 {
        ScoreBreakdown::MAX_TIMING_HUMANNESS
    } else if variance > 5.0 {
        15
    } else {
        0
    }
}

fn score_bio_signal(micro_ratio: f64) -> u32 {
    if micro_ratio > 0.02 && micro_ratio < 0.5 {
        ScoreBreakdown::MAX_BIO_SIGNAL
    } else if micro_ratio > 0.01 {
        8
    } else {
        0
    }
}

fn score_velocity_profile(velocity_count: usize, naturalness: f64) -> u32 {
    if velocity_count < MIN_VELOCITY_SAMPLES {
        return 0;
    }
    if naturalness > 0.15 {
        ScoreBreakdown::MAX_VELOCITY_PROFILE
    } else if naturalness > 0.05 {
        8
    } else {
        2
    }
}

fn score_task_accuracy(accuracy: f64) -> u32 {
    let accuracy = if accuracy.is_finite() {
        accuracy.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (accuracy * ScoreBreakdown::MAX_TASK_ACCURACY as f64).round() as u32
}

/// `min(99, round(total * 1.1))`
pub fn compute_confidence(total: u32) -> u32 {
    ((total as f64 * 1.1).round() as u32).min(MAX_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationConfig;
    use pretty_assertions::assert_eq;

    fn empty_telemetry() -> TelemetryCollector {
        TelemetryCollector::new(&VerificationConfig::default(), 0.0)
    }

    /// Wobbly human-ish path: alternating small turns, uneven speeds, some tremor
    fn humanlike_telemetry() -> TelemetryCollector {
        let mut telemetry = empty_telemetry();
        let mut x = 0.0;
        let mut t = 0.0;
        for i in 0..40 {
            let step = if i % 2 == 0 { 6.0 } else { 2.0 };
            x += step;
            let y = if i % 3 == 0 { 1.5 } else { -1.0 };
            t += if i % 4 == 0 { 55.0 } else { 35.0 };
            telemetry.track_pointer(x, y, t);
        }
        for tap in [1000.0, 1420.0, 1790.0, 2260.0, 2600.0] {
            telemetry.track_tap(tap);
        }
        telemetry
    }

    #[test]
    fn test_path_band_edges() {
        assert_eq!(score_path_naturalness(9, 0.5), 0);
        assert_eq!(score_path_naturalness(10, 0.5), 25);
        assert_eq!(score_path_naturalness(10, 0.05), 15);
        assert_eq!(score_path_naturalness(10, 1.5), 15);
        assert_eq!(score_path_naturalness(10, 0.02), 5);
        assert_eq!(score_path_naturalness(10, 0.0), 5);
    }

    #[test]
    fn test_timing_band_edges() {
        assert_eq!(score_timing_humanness(2, 100.0), 0);
        assert_eq!(score_timing_humanness(3, 100.0), 25);
        assert_eq!(score_timing_humanness(3, 15.0), 15);
        assert_eq!(score_timing_humanness(3, 300.0), 15);
        assert_eq!(score_timing_humanness(3, 5.0), 0);
    }

    #[test]
    fn test_bio_band_edges() {
        assert_eq!(score_bio_signal(0.1), 15);
        assert_eq!(score_bio_signal(0.02), 8);
        assert_eq!(score_bio_signal(0.5), 8);
        assert_eq!(score_bio_signal(0.01), 0);
        assert_eq!(score_bio_signal(0.0), 0);
    }

    #[test]
    fn test_velocity_band_edges() {
        assert_eq!(score_velocity_profile(4, 0.9), 0);
        assert_eq!(score_velocity_profile(5, 0.9), 15);
        assert_eq!(score_velocity_profile(5, 0.15), 8);
        assert_eq!(score_velocity_profile(5, 0.05), 2);
    }

    #[test]
    fn test_task_accuracy_rounding() {
        assert_eq!(score_task_accuracy(1.0), 20);
        assert_eq!(score_task_accuracy(0.0), 0);
        assert_eq!(score_task_accuracy(0.963), 19);
        assert_eq!(score_task_accuracy(1.7), 20);
        assert_eq!(score_task_accuracy(-0.2), 0);
        assert_eq!(score_task_accuracy(f64::NAN), 0);
    }

    #[test]
    fn test_confidence_formula() {
        for total in 0..=100 {
            let expected = ((total as f64 * 1.1).round() as u32).min(99);
            assert_eq!(compute_confidence(total), expected);
        }
        assert_eq!(compute_confidence(50), 55);
        assert_eq!(compute_confidence(90), 99);
        assert_eq!(compute_confidence(100), 99);
    }

    #[test]
    fn test_empty_session_scores_only_task() {
        let engine = ScoringEngine::default();
        let result = engine.score(&empty_telemetry(), ChallengeKind::Rhythm, 1.0, 500.0);

        assert_eq!(
            result.scores,
            ScoreBreakdown {
                task_accuracy: 20,
                ..Default::default()
            }
        );
        assert_eq!(result.total, 20);
        assert!(!result.is_human);
        assert_eq!(result.total_time_ms, 500.0);
    }

    #[test]
    fn test_few_samples_never_score_path() {
        let mut telemetry = empty_telemetry();
        for i in 0..9 {
            telemetry.track_pointer(i as f64 * 3.0, (i % 2) as f64 * 4.0, i as f64 * 40.0);
        }
        let result = ScoringEngine::default().score(&telemetry, ChallengeKind::Precision, 0.5, 0.0);
        assert_eq!(result.scores.path_naturalness, 0);
    }

    #[test]
    fn test_timing_uses_series_for_challenge() {
        let mut telemetry = empty_telemetry();
        for tap in [0.0, 300.0, 700.0, 950.0] {
            telemetry.track_tap(tap);
        }
        let engine = ScoringEngine::default();

        let rhythm = engine.score(&telemetry, ChallengeKind::Rhythm, 0.0, 0.0);
        assert_eq!(rhythm.scores.timing_humanness, 25);

        // No clicks recorded, so the precision challenge has no timing signal
        let precision = engine.score(&telemetry, ChallengeKind::Precision, 0.0, 0.0);
        assert_eq!(precision.scores.timing_humanness, 0);
    }

    #[test]
    fn test_humanlike_session_passes() {
        let telemetry = humanlike_telemetry();
        let result = ScoringEngine::default().score(&telemetry, ChallengeKind::Rhythm, 0.9, 3000.0);

        assert_eq!(result.total, result.scores.total());
        assert!(result.total <= 100);
        assert!(result.is_human, "expected human verdict, got {result:?}");
        assert_eq!(result.confidence, compute_confidence(result.total));
        assert_eq!(result.details.sample_count, 40);
    }

    #[test]
    fn test_scoring_is_deterministic_and_pure() {
        let telemetry = humanlike_telemetry();
        let before = telemetry.samples().clone();
        let engine = ScoringEngine::default();

        let a = engine.score(&telemetry, ChallengeKind::Rhythm, 0.7, 2000.0);
        let b = engine.score(&telemetry, ChallengeKind::Rhythm, 0.7, 2000.0);
        assert_eq!(a, b);
        assert_eq!(telemetry.samples(), &before);
    }

    #[test]
    fn test_verdict_threshold_boundary() {
        let engine = ScoringEngine::default();
        assert!(!engine.is_human_total(54));
        assert!(engine.is_human_total(55));
        assert!(engine.is_human_total(100));
        assert!(!engine.is_human_total(0));
    }

    #[test]
    fn test_custom_threshold() {
        let mut telemetry = empty_telemetry();
        for tap in [0.0, 300.0, 700.0, 950.0] {
            telemetry.track_tap(tap);
        }
        // timing 25 + task 20
        let result = ScoringEngine::default().score(&telemetry, ChallengeKind::Rhythm, 1.0, 0.0);
        assert_eq!(result.total, 45);
        assert!(!result.is_human);

        let lenient = ScoringEngine::new(45);
        assert!(lenient.score(&telemetry, ChallengeKind::Rhythm, 1.0, 0.0).is_human);
    }
}
