//! Verification report encoder
//!
//! Wraps a finished verification in a self-describing JSON report with
//! producer metadata, so results can be logged or shipped to a backend.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VerifyError;
use crate::verify::replay::ReplayOutcome;
use crate::verify::rhythm::RhythmEvaluation;
use crate::verify::types::{ChallengeKind, RoundOutcome, VerificationResult};
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Current report format version
pub const REPORT_VERSION: &str = "1.0.0";

/// Who produced the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Challenge-specific evidence behind the task-accuracy score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeEvidence {
    Rhythm {
        pattern: Option<String>,
        evaluation: Option<RhythmEvaluation>,
    },
    Precision {
        rounds: Vec<RoundOutcome>,
    },
}

/// A verification report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub challenge: ChallengeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<ChallengeEvidence>,
    pub result: VerificationResult,
}

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a scored result
    pub fn encode(
        &self,
        challenge: ChallengeKind,
        result: &VerificationResult,
        evidence: Option<ChallengeEvidence>,
    ) -> VerificationReport {
        VerificationReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            challenge,
            evidence,
            result: result.clone(),
        }
    }

    /// Encode a replay that reached a verdict
    pub fn encode_outcome(
        &self,
        outcome: &ReplayOutcome,
    ) -> Result<VerificationReport, VerifyError> {
        let (Some(challenge), Some(result)) = (outcome.challenge, outcome.result.as_ref()) else {
            return Err(VerifyError::EncodingError(format!(
                "session ended in phase '{}' without a verdict",
                outcome.final_phase
            )));
        };
        Ok(self.encode(challenge, result, outcome.evidence.clone()))
    }

    /// Encode to pretty JSON
    pub fn encode_to_json(
        &self,
        challenge: ChallengeKind,
        result: &VerificationResult,
        evidence: Option<ChallengeEvidence>,
    ) -> Result<String, VerifyError> {
        let report = self.encode(challenge, result, evidence);
        serde_json::to_string_pretty(&report).map_err(VerifyError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::types::{Phase, ScoreBreakdown, VerificationDetails};
    use pretty_assertions::assert_eq;

    fn sample_result() -> VerificationResult {
        let scores = ScoreBreakdown {
            path_naturalness: 25,
            timing_humanness: 15,
            bio_signal: 8,
            velocity_profile: 8,
            task_accuracy: 12,
        };
        VerificationResult {
            scores,
            total: scores.total(),
            is_human: true,
            confidence: 75,
            total_time_ms: 9_400.0,
            details: VerificationDetails::default(),
        }
    }

    #[test]
    fn test_encode_report() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(ChallengeKind::Precision, &sample_result(), None);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, ENGINE_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.result.total, 68);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.computed_at_utc).is_ok());
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = ReportEncoder::new();
        let evidence = ChallengeEvidence::Precision {
            rounds: vec![RoundOutcome::expired()],
        };
        let json = encoder
            .encode_to_json(ChallengeKind::Precision, &sample_result(), Some(evidence))
            .unwrap();

        assert!(json.contains("\"report_version\": \"1.0.0\""));
        assert!(json.contains("\"challenge\": \"precision\""));
        assert!(json.contains("\"kind\": \"precision\""));
        assert!(json.contains("\"path_naturalness\": 25"));

        let parsed: VerificationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.result, sample_result());
    }

    #[test]
    fn test_unique_instance_ids() {
        assert_ne!(
            ReportEncoder::new().instance_id(),
            ReportEncoder::new().instance_id()
        );
    }

    #[test]
    fn test_outcome_without_verdict_is_rejected() {
        let outcome = ReplayOutcome {
            final_phase: Phase::Target,
            challenge: Some(ChallengeKind::Precision),
            result: None,
            evidence: None,
            verdicts: vec![],
            tones: vec![],
            rejected: vec![],
            finished_at_ms: 100,
        };
        assert!(matches!(
            ReportEncoder::new().encode_outcome(&outcome),
            Err(VerifyError::EncodingError(_))
        ));
    }
}
