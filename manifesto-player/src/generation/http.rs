//! HTTP client for the speech generation service
//!
//! One POST per segment:
//!
//! ```text
//! POST {endpoint}
//! { "name": "...", "context": "...", "persona": "...", "previousScripts": ["..."] }
//!
//! 200 { "url": "data:audio/wav;base64,...", "script": "..." }
//! 5xx { "error": "..." }
//! ```

use super::{GeneratedSegment, GenerationError, GenerationRequest, SegmentGenerator};
use crate::playback::segment::PayloadRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("manifesto-player/", env!("CARGO_PKG_VERSION"));

/// Request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    name: &'a str,
    context: &'a str,
    persona: &'a str,
    previous_scripts: &'a [String],
}

/// Response body; success and error share one shape
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    url: Option<String>,
    script: Option<String>,
    error: Option<String>,
}

/// Generation service client
pub struct HttpGenerator {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpGenerator {
    /// Client for `endpoint` giving up on a call after `timeout`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

#[async_trait]
impl SegmentGenerator for HttpGenerator {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedSegment, GenerationError> {
        let body = GenerateBody {
            name: &request.params.name,
            context: &request.params.context,
            persona: &request.params.persona,
            previous_scripts: &request.history,
        };

        debug!(
            endpoint = %self.endpoint,
            persona = %request.params.persona,
            history = request.history.len(),
            "Requesting segment from generation service"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout)
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout)
            } else {
                GenerationError::Network(e.to_string())
            }
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<GenerateResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(GenerationError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(GenerationError::Service {
                status: status.as_u16(),
                message: error,
            });
        }

        let url = parsed
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| GenerationError::InvalidResponse("missing audio url".to_string()))?;
        let script_text = parsed.script.unwrap_or_default();

        Ok(GeneratedSegment {
            payload: PayloadRef::new(url),
            script_text,
        })
    }
}
