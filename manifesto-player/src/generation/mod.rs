//! Generation service boundary
//!
//! The scheduler never talks to the service directly. It produces a
//! [`GenerationRequest`]; the [`producer::Producer`] runs it against a
//! [`SegmentGenerator`] on its own task and reports a
//! [`GenerationOutcome`] back to the control task.

pub mod http;
pub mod producer;
pub mod scripted;

pub use http::HttpGenerator;
pub use producer::{Producer, ProducerConfig};
pub use scripted::{ScriptedGenerator, ScriptedHandle};

use crate::playback::segment::PayloadRef;
use crate::session::SessionParams;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Generation service errors
///
/// All of them are non-fatal: the stream keeps playing what is buffered.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport failure (connection refused, reset, DNS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with an error status
    #[error("Service error {status}: {message}")]
    Service { status: u16, message: String },

    /// The service answered 2xx with an unusable body
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No answer within the configured request timeout
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// Anything else a generator wants to report
    #[error("{0}")]
    Other(String),
}

impl GenerationError {
    /// Whether another attempt could plausibly succeed
    ///
    /// Client errors (4xx) and unusable bodies are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Network(_) | GenerationError::Timeout(_) => true,
            GenerationError::Service { status, .. } => *status >= 500 || *status == 429,
            GenerationError::InvalidResponse(_) | GenerationError::Other(_) => false,
        }
    }
}

/// One call to the generation service
///
/// Carries its own copy of the parameters and history captured at trigger
/// time; nothing ambient is read when the call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Session epoch the request belongs to
    pub epoch: u64,
    pub params: SessionParams,
    /// Scripts consumed so far, in play order
    pub history: Vec<String>,
}

/// Successful generation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSegment {
    pub payload: PayloadRef,
    pub script_text: String,
}

/// Result of a dispatched request, tagged with the epoch it was issued in
#[derive(Debug)]
pub struct GenerationOutcome {
    pub epoch: u64,
    pub result: Result<GeneratedSegment, GenerationError>,
}

/// Generation service client
///
/// Implementations must be callable from any tokio task. The scheduler
/// guarantees at most one outstanding call per session epoch.
#[async_trait]
pub trait SegmentGenerator: Send + Sync {
    /// Generator identifier for logs
    fn name(&self) -> &'static str;

    /// Produce the next segment continuing `request.history`
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedSegment, GenerationError>;
}
