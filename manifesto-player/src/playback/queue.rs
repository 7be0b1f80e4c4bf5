//! Segment Queue
//!
//! FIFO buffer of generated segments that have not yet been handed to a
//! buffer slot. Insertion order = generation order = required play order.
//!
//! Segments are never reordered, duplicated or dropped; the only removal
//! paths are `dequeue` (handoff to a slot) and `clear` (session stop).

use crate::playback::segment::Segment;
use std::collections::VecDeque;

/// FIFO of not-yet-played segments
#[derive(Debug, Default)]
pub struct SegmentQueue {
    entries: VecDeque<Segment>,
}

impl SegmentQueue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append a segment at the tail
    pub fn enqueue(&mut self, segment: Segment) {
        self.entries.push_back(segment);
    }

    /// Remove and return the oldest segment
    ///
    /// Never blocks; returns None when the queue is empty.
    pub fn dequeue(&mut self) -> Option<Segment> {
        self.entries.pop_front()
    }

    /// Current number of queued segments, used for backpressure decisions
    pub fn peek_depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything (session stop)
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
