//! Simulated output driven by tokio timers
//!
//! Each slot "plays" for the duration of its segment and then reports
//! completion. Pausing cancels the timer and remembers the elapsed time,
//! so resume continues where it left off. Used by the CLI when no audio
//! device is wired in, and by tests with a paused tokio clock.
//!
//! Duration: exact for inline WAV payloads, otherwise estimated from the
//! script's word count.

use super::{PlaybackError, PlaybackSink, SinkNotifier};
use crate::playback::segment::{Cue, Segment};
use crate::playback::slots::SlotIndex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Default speaking rate used to estimate non-WAV payload durations
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 150;

/// Shortest duration a segment is simulated for
const MIN_SEGMENT_DURATION: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct TimedSlot {
    cue: Cue,
    duration: Duration,
    /// Time played before the current run
    elapsed: Duration,
    /// Set while the timer runs
    started_at: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

impl TimedSlot {
    fn position(&self) -> Duration {
        let running = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        (self.elapsed + running).min(self.duration)
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Timer-backed playback sink
pub struct TimedSink {
    slots: [Option<TimedSlot>; 2],
    notifier: SinkNotifier,
    words_per_minute: u32,
}

impl TimedSink {
    pub fn new(notifier: SinkNotifier) -> Self {
        Self::with_words_per_minute(notifier, DEFAULT_WORDS_PER_MINUTE)
    }

    pub fn with_words_per_minute(notifier: SinkNotifier, words_per_minute: u32) -> Self {
        Self {
            slots: [None, None],
            notifier,
            words_per_minute: words_per_minute.max(1),
        }
    }

    /// How long `segment` will play
    pub fn duration_of(&self, segment: &Segment) -> Result<Duration, PlaybackError> {
        if segment.payload().is_empty() {
            return Err(PlaybackError::Unreadable("empty payload".to_string()));
        }
        let duration = if segment.payload().is_wav_data_uri() {
            segment.payload().wav_duration().ok_or_else(|| {
                PlaybackError::Unreadable(format!(
                    "segment {} has a corrupt WAV payload",
                    segment.sequence_index()
                ))
            })?
        } else {
            segment.estimated_duration(self.words_per_minute)
        };
        Ok(duration.max(MIN_SEGMENT_DURATION))
    }

    fn arm(&mut self, slot: SlotIndex) -> Result<(), PlaybackError> {
        let notifier = self.notifier.clone();
        let timed = self.slots[slot.index()]
            .as_mut()
            .ok_or(PlaybackError::NotLoaded(slot))?;

        timed.cancel_timer();
        let remaining = timed.duration.saturating_sub(timed.elapsed);
        let cue = timed.cue;
        timed.started_at = Some(Instant::now());
        timed.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            notifier.finished(slot, cue);
        }));
        debug!(
            "Slot {} playing segment {} for {:?}",
            slot, cue.sequence_index, remaining
        );
        Ok(())
    }
}

impl PlaybackSink for TimedSink {
    fn load(&mut self, slot: SlotIndex, segment: &Segment) -> Result<(), PlaybackError> {
        let duration = self.duration_of(segment)?;
        if let Some(mut previous) = self.slots[slot.index()].take() {
            previous.cancel_timer();
        }
        self.slots[slot.index()] = Some(TimedSlot {
            cue: segment.cue(),
            duration,
            elapsed: Duration::ZERO,
            started_at: None,
            timer: None,
        });
        Ok(())
    }

    fn play(&mut self, slot: SlotIndex) -> Result<(), PlaybackError> {
        if let Some(timed) = self.slots[slot.index()].as_mut() {
            timed.elapsed = Duration::ZERO;
        }
        self.arm(slot)
    }

    fn pause(&mut self, slot: SlotIndex) {
        if let Some(timed) = self.slots[slot.index()].as_mut() {
            if let Some(started_at) = timed.started_at.take() {
                timed.elapsed = (timed.elapsed + started_at.elapsed()).min(timed.duration);
            }
            timed.cancel_timer();
        }
    }

    fn resume(&mut self, slot: SlotIndex) -> Result<(), PlaybackError> {
        match self.slots[slot.index()].as_ref() {
            Some(timed) if timed.started_at.is_some() => Ok(()),
            Some(_) => self.arm(slot),
            None => Err(PlaybackError::NotLoaded(slot)),
        }
    }

    fn stop(&mut self, slot: SlotIndex) {
        if let Some(mut timed) = self.slots[slot.index()].take() {
            timed.cancel_timer();
        }
    }

    fn position(&self, slot: SlotIndex) -> Duration {
        self.slots[slot.index()]
            .as_ref()
            .map(TimedSlot::position)
            .unwrap_or_default()
    }
}

impl Drop for TimedSink {
    fn drop(&mut self) {
        for timed in self.slots.iter_mut().flatten() {
            timed.cancel_timer();
        }
    }
}
