//! Challenge orchestration
//!
//! Drives one verification attempt through its phases:
//!
//! ```text
//! idle -> select -> listen -> play -> checking -> result
//!                \-> target ------/
//! result -> idle (retry, only after a failed verdict)
//! ```
//!
//! The orchestrator is single-threaded and clock-driven. The embedder reports
//! the current time with [`ChallengeOrchestrator::advance_to`] and forwards
//! input events; every timed step (beat playback, ring expiry, settle and
//! checking delays) is a queued continuation tagged with the session
//! generation, so a reset can never be observed by a callback from the
//! attempt it replaced.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::VerificationConfig;
use crate::error::VerifyError;
use crate::verify::audio::{SilentTones, ToneSink};
use crate::verify::precision::{self, PrecisionTarget, RING_COUNT};
use crate::verify::rhythm::{self, RhythmEvaluation, RhythmPattern};
use crate::verify::scheduler::{TaskId, TaskQueue};
use crate::verify::scoring::ScoringEngine;
use crate::verify::telemetry::TelemetryCollector;
use crate::verify::types::{ChallengeKind, Phase, RoundOutcome, Tone, VerificationResult};

/// Timed steps queued by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    /// Play beat `index` of the current pattern
    Beat { index: usize },
    /// Listening is over; start accepting taps
    OpenPlay,
    /// Settle delay after the final tap has elapsed
    EvaluateTaps,
    /// Present ring `index`
    SpawnRing { index: usize },
    /// Ring `index` shrank away unclicked
    ExpireRing { index: usize },
    /// Analysis delay has elapsed; produce the verdict
    FinishCheck,
}

/// The ring currently on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveRing {
    pub target: PrecisionTarget,
    pub spawned_at_ms: u64,
    expiry: TaskId,
}

/// State owned by one verification attempt.
///
/// Never mutated field-by-field on reset: the orchestrator replaces it.
#[derive(Debug)]
pub struct ChallengeSession {
    generation: u64,
    telemetry: TelemetryCollector,
    challenge: Option<ChallengeKind>,
    pattern: Option<&'static RhythmPattern>,
    first_tap_ms: Option<u64>,
    tap_offsets: Vec<f64>,
    evaluation_pending: bool,
    rhythm_evaluation: Option<RhythmEvaluation>,
    active_ring: Option<ActiveRing>,
    rounds: Vec<RoundOutcome>,
    task_accuracy: Option<f64>,
    result: Option<VerificationResult>,
    verdict_reported: bool,
}

impl ChallengeSession {
    fn new(generation: u64, config: &VerificationConfig, started_at_ms: u64) -> Self {
        Self {
            generation,
            telemetry: TelemetryCollector::new(config, started_at_ms as f64),
            challenge: None,
            pattern: None,
            first_tap_ms: None,
            tap_offsets: Vec::new(),
            evaluation_pending: false,
            rhythm_evaluation: None,
            active_ring: None,
            rounds: Vec::with_capacity(RING_COUNT),
            task_accuracy: None,
            result: None,
            verdict_reported: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn challenge(&self) -> Option<ChallengeKind> {
        self.challenge
    }

    /// Pattern being listened to or reproduced
    pub fn pattern(&self) -> Option<&'static RhythmPattern> {
        self.pattern
    }

    /// Rhythm taps as offsets from the first tap of the current attempt
    pub fn tap_offsets(&self) -> &[f64] {
        &self.tap_offsets
    }

    pub fn rhythm_evaluation(&self) -> Option<&RhythmEvaluation> {
        self.rhythm_evaluation.as_ref()
    }

    pub fn active_ring(&self) -> Option<&ActiveRing> {
        self.active_ring.as_ref()
    }

    pub fn rounds(&self) -> &[RoundOutcome] {
        &self.rounds
    }

    pub fn task_accuracy(&self) -> Option<f64> {
        self.task_accuracy
    }

    pub fn result(&self) -> Option<&VerificationResult> {
        self.result.as_ref()
    }
}

type VerdictCallback = Box<dyn FnMut(bool)>;

/// Phase state machine for rhythm and precision challenges
pub struct ChallengeOrchestrator<S: ToneSink = SilentTones> {
    config: VerificationConfig,
    engine: ScoringEngine,
    rng: StdRng,
    tones: S,
    phase: Phase,
    session: ChallengeSession,
    tasks: TaskQueue<Continuation>,
    now_ms: u64,
    next_generation: u64,
    on_result: Option<VerdictCallback>,
}

impl ChallengeOrchestrator<SilentTones> {
    /// Orchestrator with silent audio and an entropy-seeded pattern picker
    pub fn new(config: VerificationConfig) -> Result<Self, VerifyError> {
        Self::with_parts(config, SilentTones, StdRng::from_entropy())
    }

    /// Orchestrator with silent audio and a deterministic pattern picker
    pub fn with_seed(config: VerificationConfig, seed: u64) -> Result<Self, VerifyError> {
        Self::with_parts(config, SilentTones, StdRng::seed_from_u64(seed))
    }
}

impl<S: ToneSink> ChallengeOrchestrator<S> {
    pub fn with_parts(
        config: VerificationConfig,
        tones: S,
        rng: StdRng,
    ) -> Result<Self, VerifyError> {
        config.validate()?;
        let engine = ScoringEngine::new(config.human_threshold);
        let session = ChallengeSession::new(0, &config, 0);
        Ok(Self {
            config,
            engine,
            rng,
            tones,
            phase: Phase::Idle,
            session,
            tasks: TaskQueue::new(),
            now_ms: 0,
            next_generation: 1,
            on_result: None,
        })
    }

    /// Register the verdict callback; fired once per session reaching `result`
    pub fn on_result<F>(&mut self, callback: F)
    where
        F: FnMut(bool) + 'static,
    {
        self.on_result = Some(Box::new(callback));
    }

    /// Drop the verdict callback
    pub fn clear_on_result(&mut self) {
        self.on_result = None;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn session(&self) -> &ChallengeSession {
        &self.session
    }

    pub fn result(&self) -> Option<&VerificationResult> {
        self.session.result.as_ref()
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn tones(&self) -> &S {
        &self.tones
    }

    /// Continuations still waiting to run
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Deadline of the next queued continuation
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.next_due()
    }

    /// Move the clock forward, running every continuation that comes due.
    ///
    /// Each continuation observes the clock at its own deadline. Time never
    /// moves backwards; an earlier `now_ms` is ignored.
    pub fn advance_to(&mut self, now_ms: u64) {
        if now_ms < self.now_ms {
            debug!(now_ms, current = self.now_ms, "ignoring backwards clock");
            return;
        }
        while let Some(due) = self.tasks.pop_due(now_ms) {
            self.now_ms = due.due_ms.max(self.now_ms);
            if due.generation != self.session.generation {
                debug!(
                    stale = due.generation,
                    current = self.session.generation,
                    "dropping stale continuation"
                );
                continue;
            }
            self.run(due.task);
        }
        self.now_ms = now_ms;
    }

    /// Opt in: `idle -> select`. Opens a fresh session.
    pub fn start(&mut self) -> Result<(), VerifyError> {
        self.expect_phase(Phase::Idle, "start")?;
        self.replace_session();
        self.transition(Phase::Select);
        Ok(())
    }

    /// Pick a challenge: `select -> listen` (rhythm) or `select -> target` (precision)
    pub fn select(&mut self, challenge: ChallengeKind) -> Result<(), VerifyError> {
        self.expect_phase(Phase::Select, "select")?;
        self.session.challenge = Some(challenge);
        match challenge {
            ChallengeKind::Rhythm => self.begin_listen(),
            ChallengeKind::Precision => {
                self.transition(Phase::Target);
                self.spawn_ring(0);
            }
        }
        Ok(())
    }

    /// Forward a pointer position; returns whether a sample was recorded
    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        match self.phase {
            Phase::Select | Phase::Listen | Phase::Target | Phase::Play => {
                self.session.telemetry.track_pointer(x, y, self.now_ms as f64)
            }
            Phase::Idle | Phase::Checking | Phase::Result => false,
        }
    }

    /// Record a rhythm tap during `play`
    pub fn tap(&mut self) -> Result<(), VerifyError> {
        self.expect_phase(Phase::Play, "tap")?;
        if self.session.evaluation_pending {
            return Err(VerifyError::EvaluationPending);
        }
        let now = self.now_ms;
        self.tones.play(Tone::Beep, now);
        self.session.telemetry.track_tap(now as f64);

        let first = *self.session.first_tap_ms.get_or_insert(now);
        self.session.tap_offsets.push(now.saturating_sub(first) as f64);

        let beats = self.session.pattern.map_or(0, |p| p.beat_count());
        if self.session.tap_offsets.len() >= beats {
            // Not cancellable: pattern length is fixed once tapping starts
            self.session.evaluation_pending = true;
            self.schedule(self.config.tap_settle_ms, Continuation::EvaluateTaps);
        }
        Ok(())
    }

    /// Restart listening with a freshly drawn pattern; allowed during `play`
    pub fn replay(&mut self) -> Result<(), VerifyError> {
        self.expect_phase(Phase::Play, "replay")?;
        if self.session.evaluation_pending {
            return Err(VerifyError::EvaluationPending);
        }
        self.begin_listen();
        Ok(())
    }

    /// Click the active ring during `target`.
    ///
    /// Returns `None` when no ring is on screen (between rings).
    pub fn click(&mut self) -> Result<Option<RoundOutcome>, VerifyError> {
        self.expect_phase(Phase::Target, "click")?;
        let Some(ring) = self.session.active_ring.take() else {
            debug!(now_ms = self.now_ms, "click with no active ring");
            return Ok(None);
        };
        self.tasks.cancel(ring.expiry);

        let now = self.now_ms;
        let elapsed = now.saturating_sub(ring.spawned_at_ms) as f64;
        let outcome = precision::score_click(elapsed, ring.target.duration_ms);
        self.session.telemetry.track_click(now as f64);

        debug!(
            ring = ring.target.index,
            progress = outcome.timing,
            accuracy = outcome.accuracy,
            hit = outcome.hit,
            "ring clicked"
        );
        self.complete_round(outcome);
        Ok(Some(outcome))
    }

    /// Start over after a failed verdict: `result -> idle`
    pub fn retry(&mut self) -> Result<(), VerifyError> {
        self.expect_phase(Phase::Result, "retry")?;
        if self.session.result.as_ref().is_some_and(|r| r.is_human) {
            return Err(VerifyError::InvalidTransition {
                phase: self.phase,
                action: "retry",
            });
        }
        self.reset();
        Ok(())
    }

    /// Abandon the current attempt from any phase and return to `idle`.
    ///
    /// Cancels every outstanding continuation and replaces the session.
    pub fn reset(&mut self) {
        let cancelled = self.tasks.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "cancelled pending continuations");
        }
        self.replace_session();
        self.transition(Phase::Idle);
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), VerifyError> {
        if self.phase == expected {
            Ok(())
        } else {
            debug!(phase = %self.phase, action, "rejected action");
            Err(VerifyError::InvalidTransition {
                phase: self.phase,
                action,
            })
        }
    }

    fn transition(&mut self, to: Phase) {
        debug!(
            from = %self.phase,
            to = %to,
            generation = self.session.generation,
            at_ms = self.now_ms,
            "phase transition"
        );
        self.phase = to;
    }

    fn replace_session(&mut self) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.session = ChallengeSession::new(generation, &self.config, self.now_ms);
    }

    /// Deadlines saturate at `u64::MAX`; the clock is caller-supplied
    fn schedule(&mut self, delay_ms: u64, task: Continuation) -> TaskId {
        let due_ms = self.now_ms.saturating_add(delay_ms);
        self.tasks.schedule(due_ms, self.session.generation, task)
    }

    fn run(&mut self, task: Continuation) {
        match task {
            Continuation::Beat { index } => {
                if self.phase == Phase::Listen {
                    self.tones.play(Tone::Kick, self.now_ms);
                    debug!(beat = index, at_ms = self.now_ms, "beat");
                }
            }
            Continuation::OpenPlay => {
                if self.phase == Phase::Listen {
                    self.session.first_tap_ms = None;
                    self.session.tap_offsets.clear();
                    self.transition(Phase::Play);
                }
            }
            Continuation::EvaluateTaps => self.evaluate_taps(),
            Continuation::SpawnRing { index } => {
                if self.phase == Phase::Target {
                    self.spawn_ring(index);
                }
            }
            Continuation::ExpireRing { index } => self.expire_ring(index),
            Continuation::FinishCheck => self.finish_check(),
        }
    }

    fn begin_listen(&mut self) {
        let pattern = rhythm::choose_pattern(&mut self.rng);
        self.session.pattern = Some(pattern);
        self.session.first_tap_ms = None;
        self.session.tap_offsets.clear();
        self.transition(Phase::Listen);

        for (index, beat) in pattern.beats.iter().enumerate() {
            self.schedule(beat.max(0.0).round() as u64, Continuation::Beat { index });
        }
        let open_after = (pattern.duration_ms().max(0.0).round() as u64)
            .saturating_add(self.config.listen_grace_ms);
        self.schedule(open_after, Continuation::OpenPlay);

        debug!(pattern = pattern.name, beats = pattern.beat_count(), "listening");
    }

    fn evaluate_taps(&mut self) {
        let Some(pattern) = self.session.pattern else {
            warn!("tap evaluation without a pattern");
            return;
        };
        let evaluation = rhythm::evaluate_taps(
            pattern.beats,
            &self.session.tap_offsets,
            self.config.rhythm_tolerance_ms,
        );
        debug!(
            matched = evaluation.matched,
            beats = evaluation.total_beats,
            accuracy = evaluation.accuracy,
            "rhythm evaluated"
        );
        self.session.rhythm_evaluation = Some(evaluation);
        self.session.task_accuracy = Some(evaluation.accuracy);
        self.begin_checking();
    }

    fn spawn_ring(&mut self, index: usize) {
        let Some(target) = precision::target(index) else {
            return;
        };
        let expiry = self.schedule(target.duration_ms, Continuation::ExpireRing { index });
        self.session.active_ring = Some(ActiveRing {
            target,
            spawned_at_ms: self.now_ms,
            expiry,
        });
        debug!(ring = index, duration_ms = target.duration_ms, "ring spawned");
    }

    fn expire_ring(&mut self, index: usize) {
        match self.session.active_ring {
            Some(ring) if ring.target.index == index => {
                self.session.active_ring = None;
                debug!(ring = index, "ring expired");
                self.complete_round(RoundOutcome::expired());
            }
            _ => debug!(ring = index, "expiry for inactive ring"),
        }
    }

    fn complete_round(&mut self, outcome: RoundOutcome) {
        self.session.rounds.push(outcome);
        let completed = self.session.rounds.len();
        if completed >= RING_COUNT {
            let accuracy = precision::aggregate_rounds(&self.session.rounds);
            self.session.task_accuracy = Some(accuracy);
            self.begin_checking();
        } else {
            self.schedule(
                self.config.ring_gap_ms,
                Continuation::SpawnRing { index: completed },
            );
        }
    }

    fn begin_checking(&mut self) {
        self.transition(Phase::Checking);
        self.schedule(self.config.checking_delay_ms, Continuation::FinishCheck);
    }

    fn finish_check(&mut self) {
        if self.phase != Phase::Checking {
            return;
        }
        let Some(challenge) = self.session.challenge else {
            warn!("checking without a challenge");
            return;
        };
        let accuracy = self.session.task_accuracy.unwrap_or(0.0);
        let result = self
            .engine
            .score(&self.session.telemetry, challenge, accuracy, self.now_ms as f64);
        let is_human = result.is_human;
        self.session.result = Some(result);
        self.transition(Phase::Result);
        self.report_verdict(is_human);
    }

    fn report_verdict(&mut self, is_human: bool) {
        if self.session.verdict_reported {
            return;
        }
        self.session.verdict_reported = true;
        info!(
            is_human,
            generation = self.session.generation,
            total = self.session.result.as_ref().map_or(0, |r| r.total),
            "verification complete"
        );
        if let Some(callback) = self.on_result.as_mut() {
            callback(is_human);
        }
    }
}
