//! Audio cue output
//!
//! Tone playback is fire-and-forget: scoring only ever sees the timestamps of
//! the events that triggered a tone, never whether it actually played.

use crate::verify::types::Tone;

/// Audio-output collaborator
pub trait ToneSink {
    /// Request a short tone at `at_ms`; implementations without audio no-op
    fn play(&mut self, tone: Tone, at_ms: u64);
}

/// Sink for environments with no audio output
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentTones;

impl ToneSink for SilentTones {
    fn play(&mut self, _tone: Tone, _at_ms: u64) {}
}

/// Sink that records every request, for replays and tests
#[derive(Debug, Clone, Default)]
pub struct RecordedTones {
    pub played: Vec<(u64, Tone)>,
}

impl ToneSink for RecordedTones {
    fn play(&mut self, tone: Tone, at_ms: u64) {
        self.played.push((at_ms, tone));
    }
}

impl<S: ToneSink + ?Sized> ToneSink for Box<S> {
    fn play(&mut self, tone: Tone, at_ms: u64) {
        (**self).play(tone, at_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_recorded_tones_keep_order() {
        let mut sink = RecordedTones::default();
        sink.play(Tone::Kick, 0);
        sink.play(Tone::Beep, 610);
        assert_eq!(sink.played, vec![(0, Tone::Kick), (610, Tone::Beep)]);
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut sink: Box<dyn ToneSink> = Box::new(SilentTones);
        sink.play(Tone::Beep, 5);

        let mut boxed = Box::new(RecordedTones::default());
        boxed.play(Tone::Kick, 12);
        assert_eq!(boxed.played.len(), 1);
    }
}
