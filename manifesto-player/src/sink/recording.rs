//! In-memory sink that records every command
//!
//! Nothing is audible and nothing finishes on its own: completions are
//! injected through the shared [`SinkLog`] handle. Load and play failures
//! can be scripted per sequence index.
//!
//! Only built for tests and with the `test-util` feature.

use super::{PlaybackError, PlaybackSink, SinkNotifier};
use crate::playback::segment::{Cue, Segment};
use crate::playback::slots::SlotIndex;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Command received by a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCommand {
    Load { slot: SlotIndex, sequence_index: u64 },
    Play(SlotIndex),
    Pause(SlotIndex),
    Resume(SlotIndex),
    Stop(SlotIndex),
}

#[derive(Debug, Default)]
struct Inner {
    commands: Vec<SinkCommand>,
    loaded: [Option<Cue>; 2],
    positions: [Duration; 2],
    fail_load: HashSet<u64>,
    fail_play: HashSet<u64>,
    notifier: Option<SinkNotifier>,
}

/// Shared handle onto a [`RecordingSink`]
///
/// Stays usable after the sink itself moved into a controller.
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    inner: Arc<Mutex<Inner>>,
}

impl SinkLog {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not hide the log from the others
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All commands received so far, in order
    pub fn commands(&self) -> Vec<SinkCommand> {
        self.lock().commands.clone()
    }

    /// Forget recorded commands (loaded content is kept)
    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    /// Cue currently loaded in `slot`
    pub fn loaded(&self, slot: SlotIndex) -> Option<Cue> {
        self.lock().loaded[slot.index()]
    }

    /// Make `load` fail for the segment with this sequence index
    pub fn fail_load_of(&self, sequence_index: u64) {
        self.lock().fail_load.insert(sequence_index);
    }

    /// Make `play` fail for the segment with this sequence index
    pub fn fail_play_of(&self, sequence_index: u64) {
        self.lock().fail_play.insert(sequence_index);
    }

    /// Position reported for `slot`
    pub fn set_position(&self, slot: SlotIndex, position: Duration) {
        self.lock().positions[slot.index()] = position;
    }

    /// Report natural completion of whatever `slot` holds
    ///
    /// Returns false when the slot is empty or no notifier is attached.
    pub fn finish(&self, slot: SlotIndex) -> bool {
        let inner = self.lock();
        match (&inner.notifier, inner.loaded[slot.index()]) {
            (Some(notifier), Some(cue)) => {
                notifier.finished(slot, cue);
                true
            }
            _ => false,
        }
    }

    /// Report a mid-playback failure of whatever `slot` holds
    pub fn fail(&self, slot: SlotIndex, message: &str) -> bool {
        let inner = self.lock();
        match (&inner.notifier, inner.loaded[slot.index()]) {
            (Some(notifier), Some(cue)) => {
                notifier.failed(slot, cue, message);
                true
            }
            _ => false,
        }
    }
}

/// Sink recording commands into a [`SinkLog`]
#[derive(Debug, Default)]
pub struct RecordingSink {
    log: SinkLog,
}

impl RecordingSink {
    /// Sink without a notifier; completions are fed to the scheduler directly
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose [`SinkLog::finish`] reports through `notifier`
    pub fn with_notifier(notifier: SinkNotifier) -> Self {
        let sink = Self::default();
        sink.log.lock().notifier = Some(notifier);
        sink
    }

    pub fn log(&self) -> SinkLog {
        self.log.clone()
    }
}

impl PlaybackSink for RecordingSink {
    fn load(&mut self, slot: SlotIndex, segment: &Segment) -> Result<(), PlaybackError> {
        let mut inner = self.log.lock();
        inner.commands.push(SinkCommand::Load {
            slot,
            sequence_index: segment.sequence_index(),
        });
        if inner.fail_load.contains(&segment.sequence_index()) {
            return Err(PlaybackError::Unreadable(format!(
                "segment {} rejected",
                segment.sequence_index()
            )));
        }
        inner.loaded[slot.index()] = Some(segment.cue());
        inner.positions[slot.index()] = Duration::ZERO;
        Ok(())
    }

    fn play(&mut self, slot: SlotIndex) -> Result<(), PlaybackError> {
        let mut inner = self.log.lock();
        inner.commands.push(SinkCommand::Play(slot));
        let cue = inner.loaded[slot.index()].ok_or(PlaybackError::NotLoaded(slot))?;
        if inner.fail_play.contains(&cue.sequence_index) {
            return Err(PlaybackError::Output(format!(
                "segment {} could not start",
                cue.sequence_index
            )));
        }
        Ok(())
    }

    fn pause(&mut self, slot: SlotIndex) {
        self.log.lock().commands.push(SinkCommand::Pause(slot));
    }

    fn resume(&mut self, slot: SlotIndex) -> Result<(), PlaybackError> {
        let mut inner = self.log.lock();
        inner.commands.push(SinkCommand::Resume(slot));
        match inner.loaded[slot.index()] {
            Some(_) => Ok(()),
            None => Err(PlaybackError::NotLoaded(slot)),
        }
    }

    fn stop(&mut self, slot: SlotIndex) {
        let mut inner = self.log.lock();
        inner.commands.push(SinkCommand::Stop(slot));
        inner.loaded[slot.index()] = None;
        inner.positions[slot.index()] = Duration::ZERO;
    }

    fn position(&self, slot: SlotIndex) -> Duration {
        self.log.lock().positions[slot.index()]
    }
}
