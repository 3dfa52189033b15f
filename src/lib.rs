//! Humancheck - behavioral human/bot verification engine
//!
//! Humancheck decides whether an interaction comes from a human by watching
//! how a challenge is completed rather than whether it is solved: pointer
//! telemetry → signal extraction → banded scoring → verdict.
//!
//! ## Modules
//!
//! - **Telemetry**: Throttled pointer sampling with micro-movement and hesitation counters
//! - **Scoring**: Five bounded sub-scores summed into a 0-100 total
//! - **Challenges**: Rhythm reproduction and precision-timing rings, driven by a
//!   clock-advanced phase state machine

pub mod config;
pub mod error;
pub mod verify;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::VerificationConfig;
pub use error::VerifyError;

pub use verify::{
    replay_script, ChallengeKind, ChallengeOrchestrator, Phase, ReportEncoder, ScoringEngine,
    SessionScript, TelemetryCollector, VerificationResult,
};

/// Engine version embedded in all reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "humancheck";
