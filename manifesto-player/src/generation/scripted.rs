//! Offline generator with canned speech
//!
//! Stands in for the generation service in `--simulate` mode and in tests.
//! Latency and failures are scripted; every call is recorded so tests can
//! assert on single-flight and on the history each call observed.

use super::{GeneratedSegment, GenerationError, GenerationRequest, SegmentGenerator};
use crate::playback::segment::PayloadRef;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const DEFAULT_LINES: &[&str] = &[
    "Stay hungry. The work you are avoiding is the work that matters.",
    "Nobody remembers the plan. They remember what you shipped. [Pause] So ship it.",
    "You are not behind. You are exactly where the next decision starts.",
    "Simplicity is not the absence of effort. It is effort nobody can see.",
    "Every morning the blank page asks the same question. Answer it today.",
    "[Silence] Now breathe, and take the next step before the doubt catches up.",
];

#[derive(Debug, Default)]
struct Calls {
    count: u64,
    failing: HashSet<u64>,
    in_flight: usize,
    max_in_flight: usize,
    requests: Vec<GenerationRequest>,
    /// Index of the line the next successful call returns
    next_line: usize,
}

/// Shared view onto a [`ScriptedGenerator`]'s call log
#[derive(Debug, Clone, Default)]
pub struct ScriptedHandle {
    calls: Arc<Mutex<Calls>>,
}

impl ScriptedHandle {
    fn lock(&self) -> MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `generate` calls started so far
    pub fn call_count(&self) -> u64 {
        self.lock().count
    }

    /// Highest number of calls that were outstanding at the same time
    pub fn max_concurrent(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Every request received, in call order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.lock().requests.clone()
    }

    /// Make call number `call` (1-based) fail
    pub fn fail_on_call(&self, call: u64) {
        self.lock().failing.insert(call);
    }
}

/// Decrements the in-flight counter even when the call is aborted
struct InFlightGuard<'a>(&'a ScriptedHandle);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut calls = self.0.lock();
        calls.in_flight = calls.in_flight.saturating_sub(1);
    }
}

/// Canned-speech generator
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    lines: Vec<String>,
    latency: Duration,
    handle: ScriptedHandle,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            lines: DEFAULT_LINES.iter().map(|l| l.to_string()).collect(),
            latency: Duration::ZERO,
            handle: ScriptedHandle::default(),
        }
    }

    /// Replace the canned lines; cycled in order, one per call
    pub fn with_lines<I, L>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if !lines.is_empty() {
            self.lines = lines;
        }
        self
    }

    /// Simulated service latency per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make call number `call` (1-based) fail with a 503
    pub fn fail_on_call(self, call: u64) -> Self {
        self.handle.fail_on_call(call);
        self
    }

    pub fn handle(&self) -> ScriptedHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl SegmentGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedSegment, GenerationError> {
        let call = {
            let mut calls = self.handle.lock();
            calls.count += 1;
            calls.in_flight += 1;
            calls.max_in_flight = calls.max_in_flight.max(calls.in_flight);
            calls.requests.push(request.clone());
            calls.count
        };
        let _guard = InFlightGuard(&self.handle);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let line_index = {
            let mut calls = self.handle.lock();
            if calls.failing.contains(&call) {
                return Err(GenerationError::Service {
                    status: 503,
                    message: format!("scripted failure on call {}", call),
                });
            }
            // A session's first call starts over at the top
            let index = if request.history.is_empty() {
                0
            } else {
                calls.next_line
            };
            calls.next_line = index + 1;
            index
        };

        let line = &self.lines[line_index % self.lines.len()];
        let script_text = if line_index == 0 {
            format!("{}. {}", request.params.name, line)
        } else {
            line.clone()
        };

        Ok(GeneratedSegment {
            payload: PayloadRef::new(format!(
                "simulated://epoch/{}/call/{}",
                request.epoch, call
            )),
            script_text,
        })
    }
}
