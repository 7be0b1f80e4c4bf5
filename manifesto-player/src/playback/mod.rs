//! Playback scheduling: segment queue, dual buffer, backpressure and the
//! session state machine that ties them together

pub mod backpressure;
pub mod history;
pub mod queue;
pub mod scheduler;
pub mod segment;
pub mod slots;

pub use backpressure::{Backpressure, DEFAULT_LOW_WATERMARK};
pub use history::HistoryLog;
pub use queue::SegmentQueue;
pub use scheduler::Scheduler;
pub use segment::{Cue, PayloadRef, Segment};
pub use slots::{BufferSlot, DualBuffer, SlotIndex};
