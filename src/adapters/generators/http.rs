//! HTTP-backed generation routines.
//!
//! Each routine is served at `<base_url>/<routine path>` and takes the
//! [`GenerationRequest`] as a JSON body. Transport failures surface as
//! errors; a reachable routine that reports failure comes back as an
//! unsuccessful [`GenerationResponse`]. Timeouts are enforced by the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GenerationConfig, GenerationRequest, GenerationResponse};
use crate::domain::ports::Generator;

#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
}

impl From<&GenerationConfig> for HttpGeneratorConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    http: Client,
    config: HttpGeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: HttpGeneratorConfig) -> DomainResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| DomainError::ExecutionFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, request: &GenerationRequest) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), request.routine.endpoint_path())
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate(&self, request: GenerationRequest) -> DomainResult<GenerationResponse> {
        let url = self.endpoint(&request);
        debug!(%url, routine = %request.routine, step_index = request.step_index, "calling generation routine");

        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| DomainError::GenerationFailed(format!("{} request failed: {e}", request.routine)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DomainError::GenerationFailed(format!("{} response unreadable: {e}", request.routine)))?;

        if !status.is_success() {
            // Routines may still report a structured failure on error statuses.
            if let Ok(parsed) = serde_json::from_str::<GenerationResponse>(&body) {
                if !parsed.success {
                    return Ok(parsed);
                }
            }
            return Ok(GenerationResponse::failed(format!("{} returned {status}: {body}", request.routine)));
        }

        serde_json::from_str(&body)
            .map_err(|e| DomainError::GenerationFailed(format!("{} returned malformed response: {e}", request.routine)))
    }
}
