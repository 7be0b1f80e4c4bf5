//! Stub generation service for HTTP client tests
//!
//! An axum router on a random local port. `POST /api/generate` answers
//! with the canned responses in the order given and records every request
//! body.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Canned response
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: StatusCode,
    pub body: String,
    /// Delay before answering
    pub delay: Duration,
}

impl StubResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self::raw(status, &body.to_string())
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("Invalid stub status"),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct StubState {
    responses: Mutex<VecDeque<StubResponse>>,
    requests: Mutex<Vec<Value>>,
}

/// Stub server on a random local port
pub struct StubServer {
    endpoint: String,
    state: Arc<StubState>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(responses: Vec<StubResponse>) -> Self {
        let state = Arc::new(StubState {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/api/generate", post(generate))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub server");
        let addr = listener.local_addr().expect("Stub server has no address");
        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Stub server error");
        });

        Self {
            endpoint: format!("http://{}/api/generate", addr),
            state,
            task,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn generate(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(body);

    let next = state.responses.lock().unwrap().pop_front();
    let Some(response) = next else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no canned response left").into_response();
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (
        response.status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response()
}
