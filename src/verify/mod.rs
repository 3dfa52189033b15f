//! Behavioral verification
//!
//! Collects pointer and input-timing telemetry while the user completes a
//! short interactive challenge, then scores the telemetry on five independent
//! signals to decide human or bot.
//!
//! Flow: start → select challenge → rhythm (listen, play) or precision (target)
//! → checking → scored result

pub mod audio;
pub mod encoder;
pub mod orchestrator;
pub mod precision;
pub mod replay;
pub mod rhythm;
pub mod scheduler;
pub mod scoring;
pub mod signals;
pub mod telemetry;
pub mod types;

pub use audio::{RecordedTones, SilentTones, ToneSink};
pub use encoder::{ChallengeEvidence, ReportEncoder, VerificationReport};
pub use orchestrator::{ChallengeOrchestrator, ChallengeSession};
pub use replay::{
    replay_json, replay_script, ReplayOutcome, ScriptAction, ScriptEvent, SessionScript,
    TelemetryRecording,
};
pub use scoring::ScoringEngine;
pub use telemetry::TelemetryCollector;
pub use types::{
    ChallengeKind, Phase, RoundOutcome, ScoreBreakdown, TelemetrySample, Tone,
    VerificationDetails, VerificationResult,
};
