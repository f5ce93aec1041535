//! Mock generator for testing and dry runs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ArtifactScores, GeneratedArtifact, GenerationRequest, GenerationResponse};
use crate::domain::ports::Generator;

/// Mock response configuration.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Fixed artifact body; when unset a body naming the mode and step is generated
    pub body: Option<String>,
    pub scores: ArtifactScores,
    pub is_valid: bool,
    /// Reply with `success: false`
    pub fail: bool,
    /// Return a transport-level error instead of a response
    pub unreachable: bool,
    pub error_message: Option<String>,
    /// Sleep before answering
    pub delay: Option<Duration>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            body: None,
            scores: ArtifactScores::default(),
            is_valid: true,
            fail: false,
            unreachable: false,
            error_message: None,
            delay: None,
        }
    }
}

impl MockResponse {
    pub fn success(body: impl Into<String>) -> Self {
        Self { body: Some(body.into()), ..Default::default() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { fail: true, error_message: Some(error.into()), ..Default::default() }
    }

    pub fn unreachable(error: impl Into<String>) -> Self {
        Self { unreachable: true, error_message: Some(error.into()), ..Default::default() }
    }

    pub fn with_scores(mut self, scores: ArtifactScores) -> Self {
        self.scores = scores;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invalid(mut self) -> Self {
        self.is_valid = false;
        self
    }
}

/// Scripted generator: queued responses are used first, then the default.
pub struct MockGenerator {
    default_response: MockResponse,
    scripted: Arc<RwLock<VecDeque<MockResponse>>>,
    requests: Arc<RwLock<Vec<GenerationRequest>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_default_response(MockResponse::default())
    }

    pub fn with_default_response(response: MockResponse) -> Self {
        Self {
            default_response: response,
            scripted: Arc::new(RwLock::new(VecDeque::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue a response for the next call.
    pub async fn push_response(&self, response: MockResponse) {
        self.scripted.write().await.push_back(response);
    }

    /// Every request received so far, in call order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.read().await.len()
    }

    async fn next_response(&self) -> MockResponse {
        self.scripted.write().await.pop_front().unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: GenerationRequest) -> DomainResult<GenerationResponse> {
        self.requests.write().await.push(request.clone());
        let response = self.next_response().await;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        let error = || response.error_message.clone().unwrap_or_else(|| "mock failure".to_string());
        if response.unreachable {
            return Err(DomainError::GenerationFailed(error()));
        }
        if response.fail {
            return Ok(GenerationResponse::failed(error()));
        }

        let body = response.body.clone().unwrap_or_else(|| {
            format!(
                "{} exploration step {} for run {}",
                request.mode, request.step_index, request.run_id
            )
        });
        Ok(GenerationResponse::ok(GeneratedArtifact {
            body,
            scores: response.scores.clone(),
            is_valid: response.is_valid,
        }))
    }
}
