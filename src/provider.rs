//! Model Provider Abstraction
//!
//! Unified capability set over the text-generation backends (local Ollama daemon,
//! OpenAI-compatible hosted APIs, Anthropic). Every variant maps the shared timeout and
//! cancellation token onto its own HTTP call and normalizes failures into
//! [`ProviderErrorKind`](crate::error::ProviderErrorKind).

use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod anthropic;
pub mod commands;
pub mod credentials;
pub mod ollama;
pub mod openai;
pub mod profile;
pub mod registry;

pub use anthropic::AnthropicAdapter;
pub use commands::ProviderCommandService;
pub use credentials::{CredentialDecryptor, PlaintextCredentials};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use profile::{Pricing, ProviderBackend, ProviderConfig, ProviderKind};
pub use registry::ProviderRegistry;

/// Completion options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
}

/// Token usage reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}

/// A single generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub options: CompletionOptions,
    pub timeout: Duration,
}

/// Result of a successful generation call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Capability set every backend variant implements.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Configured profile name (e.g. "local")
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Model used when a job does not name one
    fn default_model(&self) -> &str;

    /// Connectivity and credential check
    async fn validate(&self) -> Result<(), ProviderError>;

    /// Generate a completion. Must return promptly with a `Cancelled` error once
    /// `cancel` fires, and with a `Timeout` error once `request.timeout` elapses.
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation, ProviderError>;

    /// List model identifiers available on the backend
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;
}

/// Race a backend future against its deadline and the cancellation token.
///
/// Cancellation is checked first so a cancel that lands together with completion is
/// still reported as cancelled.
pub async fn with_deadline<T, F>(
    call: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::cancelled()),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(timeout)),
        },
    }
}

/// Map transport-level reqwest failures onto the shared taxonomy
pub(crate) fn map_http_error(error: reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        map_status(status, &error.to_string())
    } else if error.is_timeout() {
        ProviderError::new(
            crate::error::ProviderErrorKind::Timeout,
            format!("Request timeout: {}", error),
        )
    } else if error.is_connect() {
        ProviderError::connection_refused(format!("Connection error: {}", error))
    } else {
        ProviderError::unknown(format!("HTTP error: {}", error))
    }
}

/// Map a non-success HTTP status (and its body text) onto the shared taxonomy
pub(crate) fn map_status(status: StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::unauthorized(format!("Authentication failed: {}", body)),
        404 => ProviderError::model_not_found(format!("Model not found: {}", body)),
        429 => ProviderError::rate_limited(format!("Rate limit exceeded: {}", body)),
        408 | 504 => ProviderError::new(
            crate::error::ProviderErrorKind::Timeout,
            format!("Upstream timeout ({}): {}", status, body),
        ),
        _ => ProviderError::unknown(format!("Request failed with status {}: {}", status, body)),
    }
}

/// Turn a response into an error when its status is not a success
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(map_status(status, &body))
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_provider_http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::unknown(format!("Failed to create HTTP client: {}", e)))
}

/// Builds adapters from validated profiles
pub struct ProviderFactory;

impl ProviderFactory {
    /// `secret` is the already-decrypted API key for hosted variants.
    pub fn create_adapter(
        name: &str,
        config: &ProviderConfig,
        secret: Option<String>,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let adapter: Arc<dyn ProviderAdapter> = match &config.backend {
            ProviderBackend::Ollama { base_url } => Arc::new(OllamaAdapter::new(
                name.to_string(),
                config.model.clone(),
                base_url.clone(),
            )?),
            ProviderBackend::OpenAi { base_url, .. } => Arc::new(OpenAiAdapter::new(
                name.to_string(),
                config.model.clone(),
                secret.unwrap_or_default(),
                base_url.clone(),
            )?),
            ProviderBackend::Anthropic { .. } => Arc::new(AnthropicAdapter::new(
                name.to_string(),
                config.model.clone(),
                secret.unwrap_or_default(),
            )?),
        };
        Ok(adapter)
    }
}
