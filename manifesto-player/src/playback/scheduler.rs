//! Session scheduler - the synchronous core of the player
//!
//! **Responsibilities:**
//! - Session state machine (Idle / Streaming / Paused / Stopped)
//! - Preload, kickstart and completion handoff across the two buffer slots
//! - Backpressure check after every event that changes queue depth or
//!   consumes a segment
//! - Epoch bookkeeping so results from a stopped session are discarded
//!
//! Every method runs to completion without suspending. The async
//! [`crate::controller`] feeds it events one at a time and dispatches the
//! generation request it leaves behind (see [`Scheduler::take_generation_request`]).

use crate::error::{Error, Result};
use crate::generation::{GenerationOutcome, GenerationRequest};
use crate::playback::backpressure::Backpressure;
use crate::playback::history::HistoryLog;
use crate::playback::queue::SegmentQueue;
use crate::playback::segment::Segment;
use crate::playback::slots::{DualBuffer, SlotIndex};
use crate::session::SessionParams;
use crate::sink::{PlaybackSink, SinkEvent, SinkOutcome};
use manifesto_common::events::{EventBus, SessionEvent, SessionSnapshot, SessionState};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Gapless playback scheduler
///
/// Owns the queue, both slots, the history log, the in-flight flag and the
/// session state. Nothing else mutates them.
pub struct Scheduler<S: PlaybackSink> {
    sink: S,
    events: EventBus,

    state: SessionState,
    session_id: Option<Uuid>,
    /// Incremented on every start; stamped on requests and segments
    epoch: u64,
    params: Option<SessionParams>,

    queue: SegmentQueue,
    slots: DualBuffer,
    history: HistoryLog,
    backpressure: Backpressure,

    /// Next sequence index to assign to an accepted generation result
    next_sequence: u64,
    /// Set once the first segment of the session became audible
    has_played: bool,
    stalled_since: Option<Instant>,

    /// Request issued by the last backpressure trigger, awaiting dispatch
    pending_request: Option<GenerationRequest>,
    /// Epoch of a watermark re-check owed after a failure left nothing buffered
    pending_recheck: Option<u64>,
}

impl<S: PlaybackSink> Scheduler<S> {
    pub fn new(sink: S, events: EventBus, low_watermark: usize) -> Self {
        Self {
            sink,
            events,
            state: SessionState::Idle,
            session_id: None,
            epoch: 0,
            params: None,
            queue: SegmentQueue::new(),
            slots: DualBuffer::new(),
            history: HistoryLog::new(),
            backpressure: Backpressure::new(low_watermark),
            next_sequence: 0,
            has_played: false,
            stalled_since: None,
            pending_request: None,
            pending_recheck: None,
        }
    }

    // ----------------------------------------------------------------
    // Commands
    // ----------------------------------------------------------------

    /// Begin a new session
    ///
    /// Validation happens before anything is touched. A live session is
    /// stopped first; a stopped one passes through Idle.
    pub fn start(&mut self, params: SessionParams) -> Result<()> {
        params.validate()?;

        if self.state.is_active() {
            self.stop();
        }
        if self.state == SessionState::Stopped {
            self.transition(SessionState::Idle);
        }

        self.reset_session();
        self.epoch += 1;
        self.session_id = Some(Uuid::new_v4());
        info!(
            "Starting session {:?} (epoch {}) for {} with persona {}",
            self.session_id, self.epoch, params.name, params.persona
        );
        self.params = Some(params);
        self.transition(SessionState::Streaming);

        // Empty queue is always at or below the watermark: first request
        self.check_backpressure();
        Ok(())
    }

    /// End the session, discarding everything buffered
    ///
    /// Any generation result of this epoch that arrives later is dropped.
    pub fn stop(&mut self) {
        if !self.state.is_active() {
            debug!("Stop ignored in state {}", self.state);
            return;
        }

        for slot in [SlotIndex::A, SlotIndex::B] {
            if !self.slots.slot(slot).is_empty() {
                self.sink.stop(slot);
            }
        }
        self.reset_session();
        self.transition(SessionState::Stopped);
        info!("Session {:?} stopped", self.session_id);
    }

    /// Freeze the playing slot
    ///
    /// Generation and preloading continue while paused so content is ready
    /// on resume.
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SessionState::Streaming => {
                if let Some(slot) = self.slots.playing() {
                    self.sink.pause(slot);
                }
                self.end_stall();
                self.transition(SessionState::Paused);
                Ok(())
            }
            SessionState::Paused => Ok(()),
            other => Err(Error::InvalidState(format!("cannot pause while {}", other))),
        }
    }

    /// Continue playback
    ///
    /// From Paused: the frozen slot continues, or a kickstart runs if
    /// nothing was playing. From Streaming: re-runs kickstart and the
    /// watermark check, which recovers a starved stream after a failed
    /// generation call.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            SessionState::Paused => {
                self.transition(SessionState::Streaming);
                if let Some(slot) = self.slots.playing() {
                    if let Err(e) = self.sink.resume(slot) {
                        self.report_playback_failure(slot, &e.to_string());
                        self.finish_slot(slot);
                    }
                }
                self.advance();
                Ok(())
            }
            SessionState::Streaming => {
                self.advance();
                Ok(())
            }
            other => Err(Error::InvalidState(format!(
                "cannot resume while {}",
                other
            ))),
        }
    }

    /// Replace the parameters used by the next generation call
    pub fn update_parameters(&mut self, params: SessionParams) -> Result<()> {
        params.validate()?;
        if !self.state.is_active() {
            return Err(Error::InvalidState(format!(
                "cannot update parameters while {}",
                self.state
            )));
        }
        debug!("Session parameters updated: persona {}", params.persona);
        self.params = Some(params);
        Ok(())
    }

    // ----------------------------------------------------------------
    // Events
    // ----------------------------------------------------------------

    /// A dispatched generation call resolved
    pub fn handle_generation(&mut self, outcome: GenerationOutcome) {
        if outcome.epoch != self.epoch || !self.state.is_active() {
            debug!(
                "Discarding generation result of epoch {} (current epoch {}, state {})",
                outcome.epoch, self.epoch, self.state
            );
            self.events.emit_lossy(SessionEvent::StaleResultDiscarded {
                epoch: outcome.epoch,
                timestamp: chrono::Utc::now(),
            });
            return;
        }

        self.backpressure.release();

        match outcome.result {
            Ok(generated) => {
                let segment = Segment::new(
                    generated.payload,
                    generated.script_text,
                    self.next_sequence,
                    self.epoch,
                );
                self.next_sequence += 1;
                debug!(
                    "Segment {} generated ({} chars)",
                    segment.sequence_index(),
                    segment.script_text().len()
                );
                let sequence_index = segment.sequence_index();
                self.queue.enqueue(segment);
                self.events.emit_lossy(SessionEvent::SegmentQueued {
                    sequence_index,
                    queue_depth: self.queue.peek_depth(),
                    timestamp: chrono::Utc::now(),
                });
                self.advance();
            }
            Err(e) => {
                // No retry here: the next consumption or an explicit resume
                // re-checks the watermark
                warn!("Generation failed (epoch {}): {}", outcome.epoch, e);
                self.events.emit_lossy(SessionEvent::GenerationFailed {
                    epoch: outcome.epoch,
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                // Nothing left to consume means no consumption event will
                // ever come: the caller owes a delayed re-check
                if self.is_starved() {
                    debug!("Nothing buffered after failure, re-check owed");
                    self.pending_recheck = Some(self.epoch);
                }
            }
        }
    }

    /// Delayed watermark re-check after a failure starved the stream
    ///
    /// Ignored if the session it was owed to has ended.
    pub fn recheck_watermark(&mut self, epoch: u64) {
        if epoch != self.epoch || !self.state.is_active() {
            debug!(
                "Dropping watermark re-check for epoch {} (current epoch {}, state {})",
                epoch, self.epoch, self.state
            );
            return;
        }
        debug!("Re-checking watermark after failed generation");
        self.check_backpressure();
    }

    /// A sink reported the end of a slot's playback
    ///
    /// Failures are handled exactly like natural completion.
    pub fn handle_sink_event(&mut self, event: SinkEvent) {
        let slot = self.slots.slot(event.slot);
        let matches = slot.is_playing() && slot.segment().map(Segment::cue) == Some(event.cue);
        if !matches {
            debug!(
                "Ignoring stale sink event for slot {} (segment {}, epoch {})",
                event.slot, event.cue.sequence_index, event.cue.epoch
            );
            return;
        }

        if let SinkOutcome::Failed(message) = &event.outcome {
            self.report_playback_failure(event.slot, message);
        }
        self.finish_slot(event.slot);
        self.advance();
    }

    // ----------------------------------------------------------------
    // Engine
    // ----------------------------------------------------------------

    /// Get something playing if nothing is, keep staging full, then check
    /// the watermark
    ///
    /// Completion handoff, kickstart and stall recovery all land here. When
    /// the staging slot is loaded the swap and `play` happen before anything
    /// else, in the same call that processed the completion.
    fn advance(&mut self) {
        while self.state == SessionState::Streaming && self.slots.playing().is_none() {
            let active = self.slots.active();
            let target = if self.slots.slot(active).is_loaded() {
                active
            } else if self.slots.slot(active.other()).is_loaded() {
                self.slots.swap();
                active.other()
            } else if self.preload(active) {
                active
            } else {
                self.enter_stall();
                break;
            };

            if self.start_slot(target) {
                self.end_stall();
            }
        }

        let staging = self.slots.staging();
        self.preload(staging);
        self.check_backpressure();
    }

    /// Move the next playable queued segment into an empty slot
    ///
    /// Returns true if the slot ends up loaded. Segments the sink refuses
    /// are skipped (reported, never retried).
    fn preload(&mut self, slot: SlotIndex) -> bool {
        if !self.slots.slot(slot).is_empty() {
            return false;
        }

        while let Some(segment) = self.queue.dequeue() {
            if let Err(e) = self.sink.load(slot, &segment) {
                warn!(
                    "Segment {} could not be loaded into slot {}: {}",
                    segment.sequence_index(),
                    slot,
                    e
                );
                self.events.emit_lossy(SessionEvent::PlaybackFailed {
                    slot: slot.index(),
                    sequence_index: segment.sequence_index(),
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                continue;
            }

            let sequence_index = segment.sequence_index();
            self.history.append(segment.script_text());
            if let Err(segment) = self.slots.slot_mut(slot).load(segment) {
                // Unreachable: emptiness checked above
                warn!(
                    "Slot {} occupied, dropping segment {}",
                    slot,
                    segment.sequence_index()
                );
                return false;
            }
            debug!("Segment {} loaded into slot {}", sequence_index, slot);
            self.events.emit_lossy(SessionEvent::SegmentLoaded {
                slot: slot.index(),
                sequence_index,
                timestamp: chrono::Utc::now(),
            });
            self.check_backpressure();
            return true;
        }
        false
    }

    /// Make a loaded slot audible; on failure the slot is emptied
    fn start_slot(&mut self, slot: SlotIndex) -> bool {
        match self.sink.play(slot) {
            Ok(()) => {
                let buffer_slot = self.slots.slot_mut(slot);
                buffer_slot.mark_playing();
                if let Some(segment) = buffer_slot.segment() {
                    info!("Playing segment {} in slot {}", segment.sequence_index(), slot);
                    self.events.emit_lossy(SessionEvent::SegmentStarted {
                        slot: slot.index(),
                        sequence_index: segment.sequence_index(),
                        script_text: segment.script_text().to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                self.has_played = true;
                true
            }
            Err(e) => {
                self.report_playback_failure(slot, &e.to_string());
                self.finish_slot(slot);
                false
            }
        }
    }

    /// Release a slot whose segment is done (played or failed)
    fn finish_slot(&mut self, slot: SlotIndex) {
        if let Some(segment) = self.slots.slot_mut(slot).clear() {
            debug!("Segment {} finished in slot {}", segment.sequence_index(), slot);
            self.events.emit_lossy(SessionEvent::SegmentFinished {
                slot: slot.index(),
                sequence_index: segment.sequence_index(),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn report_playback_failure(&mut self, slot: SlotIndex, message: &str) {
        let sequence_index = self
            .slots
            .slot(slot)
            .segment()
            .map(Segment::sequence_index)
            .unwrap_or_default();
        warn!(
            "Playback of segment {} in slot {} failed: {}",
            sequence_index, slot, message
        );
        self.events.emit_lossy(SessionEvent::PlaybackFailed {
            slot: slot.index(),
            sequence_index,
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Issue a generation request if the queue is low and none is in flight
    fn check_backpressure(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let Some(params) = self.params.clone() else {
            return;
        };

        let depth = self.queue.peek_depth();
        if !self.backpressure.try_acquire(depth) {
            return;
        }

        let request = GenerationRequest {
            epoch: self.epoch,
            params,
            history: self.history.snapshot(),
        };
        debug!(
            "Queue depth {} <= watermark {}: requesting segment (history {})",
            depth,
            self.backpressure.low_watermark(),
            request.history.len()
        );
        self.events.emit_lossy(SessionEvent::GenerationRequested {
            epoch: self.epoch,
            history_len: request.history.len(),
            timestamp: chrono::Utc::now(),
        });
        self.pending_request = Some(request);
    }

    fn enter_stall(&mut self) {
        // Waiting for the very first segment is start-up latency, not a stall
        if !self.has_played || self.stalled_since.is_some() {
            return;
        }
        warn!(
            "Playback stalled: nothing buffered (generation in flight: {})",
            self.backpressure.in_flight()
        );
        self.stalled_since = Some(Instant::now());
        self.events.emit_lossy(SessionEvent::StallStarted {
            timestamp: chrono::Utc::now(),
        });
    }

    fn end_stall(&mut self) {
        if let Some(since) = self.stalled_since.take() {
            let stalled_ms = since.elapsed().as_millis() as u64;
            info!("Stall ended after {} ms", stalled_ms);
            self.events.emit_lossy(SessionEvent::StallEnded {
                stalled_ms,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// No slot playing or loaded and nothing queued
    fn is_starved(&self) -> bool {
        self.queue.is_empty()
            && [SlotIndex::A, SlotIndex::B]
                .iter()
                .all(|&slot| self.slots.slot(slot).is_empty())
    }

    fn reset_session(&mut self) {
        self.queue.clear();
        self.slots.reset();
        self.history.clear();
        self.backpressure.reset();
        self.next_sequence = 0;
        self.has_played = false;
        self.stalled_since = None;
        self.pending_request = None;
        self.pending_recheck = None;
    }

    fn transition(&mut self, new_state: SessionState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        info!("Session state changed: {} -> {}", old_state, new_state);
        self.events.emit_lossy(SessionEvent::StateChanged {
            old_state,
            new_state,
            session_id: self.session_id,
            timestamp: chrono::Utc::now(),
        });
    }

    // ----------------------------------------------------------------
    // Read-only access
    // ----------------------------------------------------------------

    /// Request left behind by the last backpressure trigger
    ///
    /// The caller must dispatch it; the in-flight flag is already set.
    pub fn take_generation_request(&mut self) -> Option<GenerationRequest> {
        self.pending_request.take()
    }

    /// Epoch of a re-check the caller must schedule, if one is owed
    pub fn take_recheck(&mut self) -> Option<u64> {
        self.pending_recheck.take()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.peek_depth()
    }

    pub fn history(&self) -> &[String] {
        self.history.entries()
    }

    pub fn slots(&self) -> &DualBuffer {
        &self.slots
    }

    pub fn generation_in_flight(&self) -> bool {
        self.backpressure.in_flight()
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled_since.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let active = self.slots.active();
        let position_ms = if self.slots.slot(active).is_playing() {
            self.sink.position(active).as_millis() as u64
        } else {
            0
        };
        SessionSnapshot {
            session_id: self.session_id,
            state: self.state,
            epoch: self.epoch,
            queue_depth: self.queue.peek_depth(),
            active_slot: active.index(),
            slots: self.slots.snapshot(),
            history_len: self.history.len(),
            generation_in_flight: self.backpressure.in_flight(),
            stalled: self.stalled_since.is_some(),
            position_ms,
        }
    }
}
