//! Error types for humancheck

use thiserror::Error;

use crate::verify::types::Phase;

/// Errors that can occur while driving or configuring a verification.
///
/// Sparse telemetry is never an error: each sub-score has its own fallback.
/// These variants cover misuse of the state machine and malformed input.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Action '{action}' is not valid in phase '{phase}'")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("Unknown challenge: {0}")]
    UnknownChallenge(String),

    #[error("Evaluation already scheduled for this attempt")]
    EvaluationPending,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid session script: {0}")]
    InvalidScript(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
