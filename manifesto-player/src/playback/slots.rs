//! Dual buffer: an arena of two buffer slots addressed by index
//!
//! One slot is "active" (playing, or next to play), the other is
//! "staging" (preloaded content waiting for the handoff). A handoff is an
//! index toggle; no content moves and nothing is allocated.

use crate::playback::segment::Segment;
use manifesto_common::events::{SlotSnapshot, SlotState};

/// Index of one of the two slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub const A: SlotIndex = SlotIndex(0);
    pub const B: SlotIndex = SlotIndex(1);

    /// Slot for a raw index; anything but 0 maps to B
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            Self::A
        } else {
            Self::B
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The opposite slot
    pub fn other(self) -> Self {
        SlotIndex(self.0 ^ 1)
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => write!(f, "A"),
            _ => write!(f, "B"),
        }
    }
}

/// One buffer slot
#[derive(Debug, Default)]
pub struct BufferSlot {
    content: Option<Segment>,
    state: SlotState,
}

impl BufferSlot {
    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn segment(&self) -> Option<&Segment> {
        self.content.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.state == SlotState::Empty
    }

    pub fn is_loaded(&self) -> bool {
        self.state == SlotState::Loaded
    }

    pub fn is_playing(&self) -> bool {
        self.state == SlotState::Playing
    }

    /// Take ownership of a segment; returns it back if the slot is occupied
    pub fn load(&mut self, segment: Segment) -> Result<(), Segment> {
        if !self.is_empty() {
            return Err(segment);
        }
        self.content = Some(segment);
        self.state = SlotState::Loaded;
        Ok(())
    }

    /// Loaded → Playing; false if there is nothing loaded
    pub fn mark_playing(&mut self) -> bool {
        if self.is_loaded() {
            self.state = SlotState::Playing;
            true
        } else {
            false
        }
    }

    /// Empty the slot, returning whatever it held
    pub fn clear(&mut self) -> Option<Segment> {
        self.state = SlotState::Empty;
        self.content.take()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            state: self.state,
            sequence_index: self.content.as_ref().map(Segment::sequence_index),
        }
    }
}

/// The two-slot arena plus the active index
#[derive(Debug, Default)]
pub struct DualBuffer {
    slots: [BufferSlot; 2],
    active: SlotIndex,
}

impl DualBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> SlotIndex {
        self.active
    }

    pub fn staging(&self) -> SlotIndex {
        self.active.other()
    }

    /// Toggle which slot is active
    pub fn swap(&mut self) {
        self.active = self.active.other();
    }

    pub fn slot(&self, index: SlotIndex) -> &BufferSlot {
        &self.slots[index.index()]
    }

    pub fn slot_mut(&mut self, index: SlotIndex) -> &mut BufferSlot {
        &mut self.slots[index.index()]
    }

    /// The slot currently owning the playhead, if any
    pub fn playing(&self) -> Option<SlotIndex> {
        [SlotIndex::A, SlotIndex::B]
            .into_iter()
            .find(|&i| self.slot(i).is_playing())
    }

    /// Both slots empty, active index back to A
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.clear();
        }
        self.active = SlotIndex::A;
    }

    pub fn snapshot(&self) -> [SlotSnapshot; 2] {
        [self.slots[0].snapshot(), self.slots[1].snapshot()]
    }
}
