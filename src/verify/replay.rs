//! Scripted session replay
//!
//! This module provides the public one-shot API: feed a recorded or synthetic
//! interaction script through a fresh orchestrator and collect the outcome.
//! It is the deterministic counterpart of wiring the orchestrator to a live UI.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::VerificationConfig;
use crate::error::VerifyError;
use crate::verify::audio::{RecordedTones, ToneSink};
use crate::verify::encoder::ChallengeEvidence;
use crate::verify::orchestrator::ChallengeOrchestrator;
use crate::verify::scoring::ScoringEngine;
use crate::verify::telemetry::TelemetryCollector;
use crate::verify::types::{ChallengeKind, Phase, TelemetrySample, Tone, VerificationResult};

/// Extra time granted after the last scripted event for pending continuations
const DRAIN_HORIZON_MS: u64 = 60_000;

/// One user-level action in a session script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    Start,
    Select { challenge: ChallengeKind },
    Pointer { x: f64, y: f64 },
    Tap,
    Click,
    Replay,
    Retry,
    /// Abandon the attempt (enclosing flow closed)
    Close,
}

/// A timestamped action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

/// A complete interaction script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionScript {
    /// Seed for rhythm pattern selection; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    pub events: Vec<ScriptEvent>,
}

impl SessionScript {
    pub fn from_json(json: &str) -> Result<Self, VerifyError> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    /// Events must be in non-decreasing time order
    pub fn validate(&self) -> Result<(), VerifyError> {
        if let Some(pos) = self
            .events
            .windows(2)
            .position(|w| w[1].at_ms < w[0].at_ms)
        {
            return Err(VerifyError::InvalidScript(format!(
                "event {} at {}ms precedes event {} at {}ms",
                pos + 1,
                self.events[pos + 1].at_ms,
                pos,
                self.events[pos].at_ms
            )));
        }
        Ok(())
    }
}

/// An action the orchestrator refused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedAction {
    pub index: usize,
    pub at_ms: u64,
    pub reason: String,
}

/// Everything observed while replaying a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub final_phase: Phase,
    pub challenge: Option<ChallengeKind>,
    pub result: Option<VerificationResult>,
    /// Challenge-specific evidence from the final session
    pub evidence: Option<ChallengeEvidence>,
    /// Verdicts delivered to the result callback, in order
    pub verdicts: Vec<bool>,
    pub tones: Vec<(u64, Tone)>,
    pub rejected: Vec<RejectedAction>,
    pub finished_at_ms: u64,
}

/// Replay a script against a fresh orchestrator.
///
/// Rejected actions are recorded rather than aborting the replay. After the
/// last event the clock runs until no continuation is left (bounded).
pub fn replay_script(
    script: &SessionScript,
    config: VerificationConfig,
) -> Result<ReplayOutcome, VerifyError> {
    script.validate()?;
    let rng = match script.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut orch = ChallengeOrchestrator::with_parts(config, RecordedTones::default(), rng)?;

    let verdicts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&verdicts);
    orch.on_result(move |is_human| sink.borrow_mut().push(is_human));

    let mut rejected = Vec::new();
    for (index, event) in script.events.iter().enumerate() {
        orch.advance_to(event.at_ms);
        if let Err(e) = apply(&mut orch, &event.action) {
            debug!(index, at_ms = event.at_ms, error = %e, "scripted action rejected");
            rejected.push(RejectedAction {
                index,
                at_ms: event.at_ms,
                reason: e.to_string(),
            });
        }
    }

    let horizon = orch.now_ms().saturating_add(DRAIN_HORIZON_MS);
    while let Some(deadline) = orch.next_deadline() {
        if deadline > horizon {
            warn!(deadline, horizon, "continuations left beyond drain horizon");
            break;
        }
        orch.advance_to(deadline);
    }

    let session = orch.session();
    let evidence = session.challenge().map(|challenge| match challenge {
        ChallengeKind::Rhythm => ChallengeEvidence::Rhythm {
            pattern: session.pattern().map(|p| p.name.to_string()),
            evaluation: session.rhythm_evaluation().copied(),
        },
        ChallengeKind::Precision => ChallengeEvidence::Precision {
            rounds: session.rounds().to_vec(),
        },
    });
    let verdicts = verdicts.borrow().clone();
    Ok(ReplayOutcome {
        final_phase: orch.phase(),
        challenge: orch.session().challenge(),
        result: orch.result().cloned(),
        evidence,
        verdicts,
        tones: orch.tones().played.clone(),
        rejected,
        finished_at_ms: orch.now_ms(),
    })
}

/// Replay a JSON script (stateless, one-shot)
pub fn replay_json(
    script_json: &str,
    config: VerificationConfig,
) -> Result<ReplayOutcome, VerifyError> {
    let script = SessionScript::from_json(script_json)?;
    replay_script(&script, config)
}

fn apply<S: ToneSink>(
    orch: &mut ChallengeOrchestrator<S>,
    action: &ScriptAction,
) -> Result<(), VerifyError> {
    match action {
        ScriptAction::Start => orch.start(),
        ScriptAction::Select { challenge } => orch.select(*challenge),
        ScriptAction::Pointer { x, y } => {
            orch.pointer_move(*x, *y);
            Ok(())
        }
        ScriptAction::Tap => orch.tap(),
        ScriptAction::Click => orch.click().map(|_| ()),
        ScriptAction::Replay => orch.replay(),
        ScriptAction::Retry => orch.retry(),
        ScriptAction::Close => {
            orch.reset();
            Ok(())
        }
    }
}

/// Raw telemetry captured elsewhere, for direct scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecording {
    /// Session start (ms); defaults to the first event
    #[serde(default)]
    pub started_at_ms: Option<f64>,
    #[serde(default)]
    pub pointer: Vec<TelemetrySample>,
    #[serde(default)]
    pub taps: Vec<f64>,
    #[serde(default)]
    pub clicks: Vec<f64>,
}

impl TelemetryRecording {
    fn first_timestamp(&self) -> f64 {
        self.pointer
            .iter()
            .map(|s| s.timestamp_ms)
            .chain(self.taps.iter().copied())
            .chain(self.clicks.iter().copied())
            .fold(f64::INFINITY, f64::min)
    }

    fn last_timestamp(&self) -> f64 {
        self.pointer
            .iter()
            .map(|s| s.timestamp_ms)
            .chain(self.taps.iter().copied())
            .chain(self.clicks.iter().copied())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Run the recording through a collector (applying throttle and window)
    pub fn collect(&self, config: &VerificationConfig) -> TelemetryCollector {
        let first = self.first_timestamp();
        let started_at = self
            .started_at_ms
            .unwrap_or(if first.is_finite() { first } else { 0.0 });
        let mut telemetry = TelemetryCollector::new(config, started_at);
        for sample in &self.pointer {
            telemetry.track_pointer(sample.x, sample.y, sample.timestamp_ms);
        }
        for &tap in &self.taps {
            telemetry.track_tap(tap);
        }
        for &click in &self.clicks {
            telemetry.track_click(click);
        }
        telemetry
    }

    /// Score the recording with an externally supplied task accuracy
    pub fn score(
        &self,
        config: &VerificationConfig,
        challenge: ChallengeKind,
        task_accuracy: f64,
    ) -> Result<VerificationResult, VerifyError> {
        config.validate()?;
        let telemetry = self.collect(config);
        let last = self.last_timestamp();
        let now = if last.is_finite() {
            last
        } else {
            telemetry.started_at_ms()
        };
        let engine = ScoringEngine::new(config.human_threshold);
        Ok(engine.score(&telemetry, challenge, task_accuracy, now))
    }
}
