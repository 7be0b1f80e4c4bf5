//! Playback sink boundary
//!
//! A sink owns the actual output for two slots. All commands are
//! synchronous and must not block: the gapless handoff issues `play` on the
//! staging slot in the same tick the active slot finished. Completion and
//! failure are reported asynchronously through a [`SinkNotifier`].

#[cfg(any(test, feature = "test-util"))]
pub mod recording;
pub mod timed;

#[cfg(any(test, feature = "test-util"))]
pub use recording::{RecordingSink, SinkCommand, SinkLog};
pub use timed::TimedSink;

use crate::playback::segment::{Cue, Segment};
use crate::playback::slots::SlotIndex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Playback sink errors
///
/// Never fatal: the scheduler treats a failed segment as finished.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Payload could not be read or decoded
    #[error("Unreadable payload: {0}")]
    Unreadable(String),

    /// Output device refused the command
    #[error("Output error: {0}")]
    Output(String),

    /// Command addressed a slot with nothing loaded
    #[error("Slot {0} has nothing loaded")]
    NotLoaded(SlotIndex),
}

/// How a slot's playback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Reached the end of the payload
    Finished,
    /// Playback broke mid-way (corrupt payload, device error)
    Failed(String),
}

/// Completion report from a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEvent {
    pub slot: SlotIndex,
    /// Identity of the segment that was playing
    pub cue: Cue,
    pub outcome: SinkOutcome,
}

/// Sending half handed to sinks
#[derive(Debug, Clone)]
pub struct SinkNotifier {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl SinkNotifier {
    pub fn finished(&self, slot: SlotIndex, cue: Cue) {
        self.send(SinkEvent {
            slot,
            cue,
            outcome: SinkOutcome::Finished,
        });
    }

    pub fn failed(&self, slot: SlotIndex, cue: Cue, message: impl Into<String>) {
        self.send(SinkEvent {
            slot,
            cue,
            outcome: SinkOutcome::Failed(message.into()),
        });
    }

    pub fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            debug!("Sink event dropped: control task is gone");
        }
    }
}

/// Create the notifier/receiver pair connecting a sink to the controller
pub fn channel() -> (SinkNotifier, mpsc::UnboundedReceiver<SinkEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SinkNotifier { tx }, rx)
}

/// Output for two buffer slots
pub trait PlaybackSink: Send + 'static {
    /// Preload `segment` into `slot`, replacing nothing (the slot is empty)
    fn load(&mut self, slot: SlotIndex, segment: &Segment) -> Result<(), PlaybackError>;

    /// Start the loaded content of `slot` from its beginning
    fn play(&mut self, slot: SlotIndex) -> Result<(), PlaybackError>;

    /// Freeze `slot` at its current position
    fn pause(&mut self, slot: SlotIndex);

    /// Continue `slot` from where it was paused
    fn resume(&mut self, slot: SlotIndex) -> Result<(), PlaybackError>;

    /// Halt and unload `slot`; no completion event follows
    fn stop(&mut self, slot: SlotIndex);

    /// Current position within `slot`
    fn position(&self, slot: SlotIndex) -> Duration;
}
