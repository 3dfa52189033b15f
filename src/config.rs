//! Engine configuration
//!
//! Timing and windowing knobs for the telemetry collector and the challenge
//! orchestrator. The defaults match the documented behavior; the
//! sub-score bands in [`crate::verify::scoring`] are fixed and not tunable.

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Default minimum interval between accepted pointer samples (ms)
pub const DEFAULT_SAMPLE_INTERVAL_MS: f64 = 30.0;

/// Default number of pointer samples retained in the sliding window
pub const DEFAULT_TELEMETRY_WINDOW: usize = 150;

/// Default total score at or above which a session is judged human
pub const DEFAULT_HUMAN_THRESHOLD: u32 = 55;

/// Tunable engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Pointer events closer than this to the last accepted sample are dropped
    pub sample_interval_ms: f64,
    /// Maximum pointer/velocity samples kept (oldest evicted first)
    pub telemetry_window: usize,
    /// Displacements in (0, this) count as micro-movements
    pub micro_movement_max_distance: f64,
    /// A gap longer than this followed by a deliberate move is a hesitation
    pub hesitation_pause_ms: f64,
    /// Minimum displacement for a post-pause move to count as a hesitation
    pub hesitation_min_distance: f64,
    /// Pause after the last listen beat before tapping opens (ms)
    pub listen_grace_ms: u64,
    /// Delay between the final rhythm tap and its evaluation (ms)
    pub tap_settle_ms: u64,
    /// A tap within this distance of a beat counts as matched (ms)
    pub rhythm_tolerance_ms: f64,
    /// Presentational analysis delay before scoring (ms)
    pub checking_delay_ms: u64,
    /// Pause between precision rings (ms)
    pub ring_gap_ms: u64,
    /// Verdict threshold on the 0-100 total
    pub human_threshold: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            telemetry_window: DEFAULT_TELEMETRY_WINDOW,
            micro_movement_max_distance: 3.0,
            hesitation_pause_ms: 200.0,
            hesitation_min_distance: 5.0,
            listen_grace_ms: 800,
            tap_settle_ms: 300,
            rhythm_tolerance_ms: 250.0,
            checking_delay_ms: 2200,
            ring_gap_ms: 400,
            human_threshold: DEFAULT_HUMAN_THRESHOLD,
        }
    }
}

impl VerificationConfig {
    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, VerifyError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, VerifyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.telemetry_window == 0 {
            return Err(VerifyError::InvalidConfig(
                "telemetry_window must be at least 1".to_string(),
            ));
        }
        let floats = [
            ("sample_interval_ms", self.sample_interval_ms),
            ("micro_movement_max_distance", self.micro_movement_max_distance),
            ("hesitation_pause_ms", self.hesitation_pause_ms),
            ("hesitation_min_distance", self.hesitation_min_distance),
            ("rhythm_tolerance_ms", self.rhythm_tolerance_ms),
        ];
        for (name, value) in floats {
            if !value.is_finite() || value < 0.0 {
                return Err(VerifyError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.rhythm_tolerance_ms == 0.0 {
            return Err(VerifyError::InvalidConfig(
                "rhythm_tolerance_ms must be positive".to_string(),
            ));
        }
        if self.human_threshold > 100 {
            return Err(VerifyError::InvalidConfig(format!(
                "human_threshold must be within 0-100, got {}",
                self.human_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = VerificationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.telemetry_window, 150);
        assert_eq!(config.human_threshold, 55);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = VerificationConfig::from_json(r#"{ "checking_delay_ms": 0 }"#).unwrap();
        assert_eq!(config.checking_delay_ms, 0);
        assert_eq!(config.ring_gap_ms, 400);
        assert_eq!(config.sample_interval_ms, 30.0);
    }

    #[test]
    fn test_rejects_zero_window() {
        let result = VerificationConfig::from_json(r#"{ "telemetry_window": 0 }"#);
        assert!(matches!(result, Err(VerifyError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_negative_interval() {
        let config = VerificationConfig {
            sample_interval_ms: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_threshold_above_max() {
        let config = VerificationConfig {
            human_threshold: 101,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_values() {
        let config = VerificationConfig {
            ring_gap_ms: 250,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(VerificationConfig::from_json(&json).unwrap(), config);
    }
}
