//! Generation producer
//!
//! Runs one [`GenerationRequest`] per spawned task and reports the outcome
//! back to the control task. Single-flight is enforced by the scheduler's
//! backpressure flag, not here: the producer runs whatever it is given.

use super::{GenerationError, GenerationOutcome, GenerationRequest, SegmentGenerator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-request timeout and retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Upper bound for a single generation attempt
    pub request_timeout: Duration,
    /// Extra attempts after a retryable failure (0 = surface immediately)
    pub max_retries: u32,
    /// Delay before retry N is `retry_backoff * N`
    pub retry_backoff: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_retries: 0,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Dispatches generation requests onto their own tasks
#[derive(Clone)]
pub struct Producer {
    generator: Arc<dyn SegmentGenerator>,
    config: ProducerConfig,
    results: mpsc::UnboundedSender<GenerationOutcome>,
}

impl Producer {
    pub fn new(
        generator: Arc<dyn SegmentGenerator>,
        config: ProducerConfig,
        results: mpsc::UnboundedSender<GenerationOutcome>,
    ) -> Self {
        Self {
            generator,
            config,
            results,
        }
    }

    /// Run `request` on a new task
    ///
    /// The outcome is sent tagged with the request's epoch whether it
    /// succeeded or not. Aborting the returned handle drops the call and
    /// sends nothing.
    pub fn dispatch(&self, request: GenerationRequest) -> JoinHandle<()> {
        let generator = Arc::clone(&self.generator);
        let config = self.config.clone();
        let results = self.results.clone();

        tokio::spawn(async move {
            let epoch = request.epoch;
            let result = run_with_retry(generator.as_ref(), &config, &request).await;
            if results.send(GenerationOutcome { epoch, result }).is_err() {
                debug!("Generation outcome dropped: control task is gone");
            }
        })
    }
}

async fn run_with_retry(
    generator: &dyn SegmentGenerator,
    config: &ProducerConfig,
    request: &GenerationRequest,
) -> Result<super::GeneratedSegment, GenerationError> {
    let mut attempt: u32 = 0;
    loop {
        debug!(
            "{} generation attempt {} (epoch {}, history {})",
            generator.name(),
            attempt + 1,
            request.epoch,
            request.history.len()
        );

        let result = match tokio::time::timeout(config.request_timeout, generator.generate(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(config.request_timeout)),
        };

        match result {
            Ok(segment) => {
                info!(
                    "Generated segment via {} ({} chars of script)",
                    generator.name(),
                    segment.script_text.len()
                );
                return Ok(segment);
            }
            Err(e) if attempt < config.max_retries && e.is_retryable() => {
                attempt += 1;
                let backoff = config.retry_backoff * attempt;
                warn!(
                    "Generation attempt {} failed: {} (retrying in {:?})",
                    attempt, e, backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
