//! Pointer and tap telemetry collection
//!
//! Accumulates throttled pointer samples in a bounded sliding window together
//! with per-sample velocities, plus unbounded tap/click timestamp series.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::VerificationConfig;
use crate::verify::types::TelemetrySample;

/// Collected interaction telemetry for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryCollector {
    /// Most recent accepted pointer samples
    samples: VecDeque<TelemetrySample>,
    /// Velocity at each accepted sample (index-aligned with `samples`)
    velocities: VecDeque<f64>,
    /// Rhythm tap timestamps
    taps: Vec<f64>,
    /// Precision click timestamps
    clicks: Vec<f64>,
    micro_movements: u32,
    hesitations: u32,
    /// Accepted samples over the whole session, including evicted ones
    accepted_samples: u64,
    /// Session start timestamp (ms)
    started_at_ms: f64,
    /// Throttle and velocity base for the next pointer event
    last_accepted: Option<TelemetrySample>,
    window_size: usize,
    sample_interval_ms: f64,
    micro_max_distance: f64,
    hesitation_pause_ms: f64,
    hesitation_min_distance: f64,
}

impl TelemetryCollector {
    /// Create an empty collector whose session starts at `started_at_ms`
    pub fn new(config: &VerificationConfig, started_at_ms: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.telemetry_window),
            velocities: VecDeque::with_capacity(config.telemetry_window),
            taps: Vec::new(),
            clicks: Vec::new(),
            micro_movements: 0,
            hesitations: 0,
            accepted_samples: 0,
            started_at_ms,
            last_accepted: None,
            window_size: config.telemetry_window,
            sample_interval_ms: config.sample_interval_ms,
            micro_max_distance: config.micro_movement_max_distance,
            hesitation_pause_ms: config.hesitation_pause_ms,
            hesitation_min_distance: config.hesitation_min_distance,
        }
    }

    /// Record a pointer position.
    ///
    /// Throttled: events within the sample interval of the last *accepted*
    /// sample are dropped. Returns whether the sample was accepted.
    pub fn track_pointer(&mut self, x: f64, y: f64, timestamp_ms: f64) -> bool {
        let velocity = match self.last_accepted {
            Some(last) => {
                let dt = timestamp_ms - last.timestamp_ms;
                if dt < self.sample_interval_ms {
                    return false;
                }
                let distance = ((x - last.x).powi(2) + (y - last.y).powi(2)).sqrt();
                let velocity = if dt > 0.0 { distance / dt } else { 0.0 };

                if distance > 0.0 && distance < self.micro_max_distance {
                    self.micro_movements += 1;
                }
                if dt > self.hesitation_pause_ms && distance > self.hesitation_min_distance {
                    self.hesitations += 1;
                }
                velocity
            }
            None => 0.0,
        };

        let sample = TelemetrySample { x, y, timestamp_ms };
        self.samples.push_back(sample);
        while self.samples.len() > self.window_size {
            self.samples.pop_front();
        }

        self.velocities.push_back(velocity);
        while self.velocities.len() > self.window_size {
            self.velocities.pop_front();
        }

        self.last_accepted = Some(sample);
        self.accepted_samples += 1;
        true
    }

    /// Record a completed rhythm tap
    pub fn track_tap(&mut self, timestamp_ms: f64) {
        self.taps.push(timestamp_ms);
    }

    /// Record a completed precision click
    pub fn track_click(&mut self, timestamp_ms: f64) {
        self.clicks.push(timestamp_ms);
    }

    pub fn samples(&self) -> &VecDeque<TelemetrySample> {
        &self.samples
    }

    pub fn velocities(&self) -> &VecDeque<f64> {
        &self.velocities
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn clicks(&self) -> &[f64] {
        &self.clicks
    }

    pub fn micro_movements(&self) -> u32 {
        self.micro_movements
    }

    pub fn hesitations(&self) -> u32 {
        self.hesitations
    }

    /// Total accepted pointer samples, including those evicted from the window
    pub fn accepted_samples(&self) -> u64 {
        self.accepted_samples
    }

    pub fn started_at_ms(&self) -> f64 {
        self.started_at_ms
    }

    /// Milliseconds elapsed between session start and `now_ms`
    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        now_ms - self.started_at_ms
    }
}
