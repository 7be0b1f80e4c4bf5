//! Backpressure Controller
//!
//! Sole trigger for new generation calls. After any event that changes
//! queue depth or consumes a segment, the scheduler asks
//! [`Backpressure::try_acquire`]; it answers yes only when the queue is at
//! or below the low watermark and no call is outstanding, and marks the
//! call in flight in the same step.

/// Default queue depth at or below which a refill is requested
pub const DEFAULT_LOW_WATERMARK: usize = 2;

/// Watermark policy plus the single-flight guard
#[derive(Debug, Clone)]
pub struct Backpressure {
    low_watermark: usize,
    in_flight: bool,
}

impl Backpressure {
    pub fn new(low_watermark: usize) -> Self {
        Self {
            low_watermark,
            in_flight: false,
        }
    }

    pub fn low_watermark(&self) -> usize {
        self.low_watermark
    }

    /// True while a generation call is outstanding
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether a refill would be requested at `depth`
    pub fn should_trigger(&self, depth: usize) -> bool {
        !self.in_flight && depth <= self.low_watermark
    }

    /// Check-and-set: returns true and marks a call in flight when a refill
    /// is due. The caller must issue exactly one generation call per `true`.
    pub fn try_acquire(&mut self, depth: usize) -> bool {
        if self.should_trigger(depth) {
            self.in_flight = true;
            true
        } else {
            false
        }
    }

    /// The outstanding call resolved (success or failure)
    pub fn release(&mut self) {
        self.in_flight = false;
    }

    /// Forget any outstanding call (session stop)
    pub fn reset(&mut self) {
        self.in_flight = false;
    }
}

impl Default for Backpressure {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_WATERMARK)
    }
}
