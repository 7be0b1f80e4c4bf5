//! Event types for the manifesto event system
//!
//! Provides the shared event definitions and the EventBus used by the
//! player's control task to publish observability signals.

mod session_types;

pub use session_types::{SessionSnapshot, SessionState, SlotSnapshot, SlotState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Session event types
///
/// Events are broadcast via EventBus and serialize to tagged JSON for
/// whatever presentation layer listens. None of them carry control
/// authority: the scheduler state is the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Session state changed
    StateChanged {
        /// State before change
        old_state: SessionState,
        /// State after change
        new_state: SessionState,
        /// Session the transition belongs to
        session_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A generation call was issued
    GenerationRequested {
        epoch: u64,
        /// Number of scripts passed as context
        history_len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A generation call failed (non-fatal)
    ///
    /// The stream keeps playing whatever is already buffered.
    GenerationFailed {
        epoch: u64,
        /// Human-readable failure message from the generation service
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A generation result arrived after its session was stopped or replaced
    StaleResultDiscarded {
        epoch: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A generated segment entered the queue
    SegmentQueued {
        sequence_index: u64,
        queue_depth: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A segment was preloaded into a buffer slot
    SegmentLoaded {
        slot: usize,
        sequence_index: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A segment became audible
    SegmentStarted {
        slot: usize,
        sequence_index: u64,
        /// Script text, for caption display
        script_text: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A segment finished (naturally or through a playback failure)
    SegmentFinished {
        slot: usize,
        sequence_index: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A segment could not be played and was skipped
    PlaybackFailed {
        slot: usize,
        sequence_index: u64,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback ran dry: nothing is ready to play
    ///
    /// Degraded throughput, not an error.
    StallStarted {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback resumed after a stall
    StallEnded {
        /// How long the listener heard silence
        stalled_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Event name as it appears in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "StateChanged",
            SessionEvent::GenerationRequested { .. } => "GenerationRequested",
            SessionEvent::GenerationFailed { .. } => "GenerationFailed",
            SessionEvent::StaleResultDiscarded { .. } => "StaleResultDiscarded",
            SessionEvent::SegmentQueued { .. } => "SegmentQueued",
            SessionEvent::SegmentLoaded { .. } => "SegmentLoaded",
            SessionEvent::SegmentStarted { .. } => "SegmentStarted",
            SessionEvent::SegmentFinished { .. } => "SegmentFinished",
            SessionEvent::PlaybackFailed { .. } => "PlaybackFailed",
            SessionEvent::StallStarted { .. } => "StallStarted",
            SessionEvent::StallEnded { .. } => "StallEnded",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers never block the control task)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use manifesto_common::events::{EventBus, SessionEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SessionEvent::StallStarted {
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(SessionEvent::StallStarted { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before
    /// the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        if let Err(broadcast::error::SendError(event)) = self.emit(event) {
            trace!("No subscribers for {}", event.event_type());
        }
    }
}
