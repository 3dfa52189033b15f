//! Verification data types
//!
//! This module defines the telemetry, scoring and state-machine types that flow
//! through the verification engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Challenge variants offered in the `select` phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Listen to a beat pattern, then tap it back
    Rhythm,
    /// Click shrinking rings at the right moment
    Precision,
}

impl ChallengeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::Rhythm => "rhythm",
            ChallengeKind::Precision => "precision",
        }
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeKind {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rhythm" => Ok(ChallengeKind::Rhythm),
            "precision" => Ok(ChallengeKind::Precision),
            other => Err(VerifyError::UnknownChallenge(other.to_string())),
        }
    }
}

/// Orchestrator phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Awaiting user opt-in
    Idle,
    /// Choosing a challenge variant
    Select,
    /// Rhythm pattern is being played back
    Listen,
    /// Precision rings are being presented
    Target,
    /// Rhythm taps are being collected
    Play,
    /// Simulated analysis delay before scoring
    Checking,
    /// Verdict available
    Result,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Select => "select",
            Phase::Listen => "listen",
            Phase::Target => "target",
            Phase::Play => "play",
            Phase::Checking => "checking",
            Phase::Result => "result",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short audio cue requested from the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Low cue played for each pattern beat
    Kick,
    /// Higher cue played for each user tap
    Beep,
}

/// A single throttled pointer position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub x: f64,
    pub y: f64,
    /// Timestamp in milliseconds
    pub timestamp_ms: f64,
}

/// Outcome of one precision ring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Whether the click landed close enough to the sweet spot
    pub hit: bool,
    /// Fraction of the ring duration elapsed at click time (1.0 when expired)
    pub timing: f64,
    /// Per-click accuracy in [0, 1] (0.0 when expired)
    pub accuracy: f64,
}

impl RoundOutcome {
    /// Outcome recorded for a ring that shrank away unclicked
    pub fn expired() -> Self {
        Self {
            hit: false,
            timing: 1.0,
            accuracy: 0.0,
        }
    }
}

/// Per-signal sub-scores; each is bounded independently
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Pointer path curvature (max 25)
    pub path_naturalness: u32,
    /// Inter-event timing spread (max 25)
    pub timing_humanness: u32,
    /// Micro-movement tremor ratio (max 15)
    pub bio_signal: u32,
    /// Acceleration direction reversals (max 15)
    pub velocity_profile: u32,
    /// Challenge task accuracy (max 20)
    pub task_accuracy: u32,
}

impl ScoreBreakdown {
    pub const MAX_PATH_NATURALNESS: u32 = 25;
    pub const MAX_TIMING_HUMANNESS: u32 = 25;
    pub const MAX_BIO_SIGNAL: u32 = 15;
    pub const MAX_VELOCITY_PROFILE: u32 = 15;
    pub const MAX_TASK_ACCURACY: u32 = 20;

    /// Arithmetic sum of the five sub-scores
    pub fn total(&self) -> u32 {
        self.path_naturalness
            + self.timing_humanness
            + self.bio_signal
            + self.velocity_profile
            + self.task_accuracy
    }
}

/// Raw diagnostic counters; explanatory only, never part of the verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationDetails {
    /// Pointer samples currently held in the window
    pub sample_count: usize,
    pub micro_movements: u32,
    pub hesitations: u32,
    /// Mean absolute turning-angle change (radians)
    pub jitter: f64,
    /// Standard deviation of inter-event intervals (ms)
    pub timing_variance: f64,
    /// Fraction of acceleration sign reversals
    pub velocity_naturalness: f64,
}

/// Final verdict for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub scores: ScoreBreakdown,
    /// Sum of sub-scores, 0-100
    pub total: u32,
    pub is_human: bool,
    /// Confidence percentage, capped at 99
    pub confidence: u32,
    /// Wall-clock milliseconds since the session started
    pub total_time_ms: f64,
    pub details: VerificationDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_kind_serialization() {
        let json = serde_json::to_string(&ChallengeKind::Precision).unwrap();
        assert_eq!(json, "\"precision\"");

        let parsed: ChallengeKind = serde_json::from_str("\"rhythm\"").unwrap();
        assert_eq!(parsed, ChallengeKind::Rhythm);
    }

    #[test]
    fn test_challenge_kind_from_str() {
        assert_eq!("Rhythm".parse::<ChallengeKind>().unwrap(), ChallengeKind::Rhythm);
        assert_eq!(
            " precision ".parse::<ChallengeKind>().unwrap(),
            ChallengeKind::Precision
        );
        assert!(matches!(
            "drawing".parse::<ChallengeKind>(),
            Err(VerifyError::UnknownChallenge(_))
        ));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Checking.to_string(), "checking");
        assert_eq!(serde_json::to_string(&Phase::Target).unwrap(), "\"target\"");
    }

    #[test]
    fn test_breakdown_total() {
        let scores = ScoreBreakdown {
            path_naturalness: 25,
            timing_humanness: 15,
            bio_signal: 8,
            velocity_profile: 2,
            task_accuracy: 20,
        };
        assert_eq!(scores.total(), 70);
        assert_eq!(ScoreBreakdown::default().total(), 0);
    }

    #[test]
    fn test_expired_round() {
        let round = RoundOutcome::expired();
        assert!(!round.hit);
        assert_eq!(round.timing, 1.0);
    }
}
