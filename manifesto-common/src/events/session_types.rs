//! Session-related type definitions
//!
//! Supporting types for the session state machine and the read-only
//! snapshots handed to presentation layers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session state enumeration
///
/// Exactly one instance exists per controller. `Stopped` only leaves
/// through a new start, which passes through `Idle` on the way back to
/// `Streaming`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
    Paused,
    Stopped,
}

impl SessionState {
    /// True while a session is live (streaming or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Streaming | SessionState::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Buffer slot state
///
/// At most one of the two slots is `Playing` at any time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum SlotState {
    /// No content
    #[default]
    Empty,
    /// Content preloaded, not yet audible
    Loaded,
    /// Content owns the playhead (also while the session is paused)
    Playing,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Empty => write!(f, "Empty"),
            SlotState::Loaded => write!(f, "Loaded"),
            SlotState::Playing => write!(f, "Playing"),
        }
    }
}

/// Read-only view of one buffer slot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SlotSnapshot {
    pub state: SlotState,
    /// Sequence index of the held segment, if any
    pub sequence_index: Option<u64>,
}

/// Read-only projection of the whole scheduler
///
/// Produced on demand by the control task; never shared mutably.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Identifier of the current (or last) session, None before the first start
    pub session_id: Option<Uuid>,
    pub state: SessionState,
    pub epoch: u64,
    pub queue_depth: usize,
    pub active_slot: usize,
    pub slots: [SlotSnapshot; 2],
    pub history_len: usize,
    pub generation_in_flight: bool,
    pub stalled: bool,
    /// Playback position of the active slot in milliseconds
    pub position_ms: u64,
}
