//! Provider profiles: the closed set of backend variants and their per-profile settings.

use crate::provider::CompletionOptions;
use crate::provider::TokenUsage;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend family of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn slug(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Transport and authentication per variant. Each carries only what it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderBackend {
    /// Local daemon, no authentication. Default `http://localhost:11434`
    Ollama {
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Hosted OpenAI-compatible REST API, bearer key. `api_key` is the stored (possibly
    /// encrypted) credential blob.
    #[serde(rename = "openai")]
    OpenAi {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Hosted Anthropic messages API, `x-api-key` header
    Anthropic { api_key: String },
}

impl ProviderBackend {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderBackend::Ollama { .. } => ProviderKind::Ollama,
            ProviderBackend::OpenAi { .. } => ProviderKind::OpenAi,
            ProviderBackend::Anthropic { .. } => ProviderKind::Anthropic,
        }
    }

    /// Stored credential blob, if the variant authenticates
    pub fn credential_blob(&self) -> Option<&str> {
        match self {
            ProviderBackend::Ollama { .. } => None,
            ProviderBackend::OpenAi { api_key, .. } | ProviderBackend::Anthropic { api_key } => {
                Some(api_key.as_str())
            }
        }
    }

    /// Configured endpoint override, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderBackend::Ollama { base_url } | ProviderBackend::OpenAi { base_url, .. } => {
                base_url.as_deref()
            }
            ProviderBackend::Anthropic { .. } => None,
        }
    }
}

/// Per-1k-token pricing used for cost estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl Pricing {
    pub fn estimate(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt as f64 / 1000.0) * self.prompt_per_1k
            + (usage.completion as f64 / 1000.0) * self.completion_per_1k
    }
}

/// Provider profile as stored in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub backend: ProviderBackend,

    /// Default model for jobs that don't name one
    pub model: String,

    /// Primary generation timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Context window override for submission-time limit checks
    #[serde(default)]
    pub context_limit: Option<usize>,

    #[serde(default)]
    pub pricing: Option<Pricing>,

    #[serde(default)]
    pub default_options: CompletionOptions,
}

fn default_timeout_secs() -> u64 {
    120
}

impl ProviderConfig {
    pub fn new(backend: ProviderBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout_secs: default_timeout_secs(),
            context_limit: None,
            pricing: None,
            default_options: CompletionOptions::default(),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.backend.kind()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than zero".to_string());
        }
        if let Some(blob) = self.backend.credential_blob() {
            if blob.trim().is_empty() {
                return Err(format!("{} profiles require an api_key", self.kind()));
            }
        }
        if let Some(endpoint) = self.backend.endpoint() {
            Url::parse(endpoint).map_err(|e| format!("Invalid endpoint URL '{}': {}", endpoint, e))?;
        }
        Ok(())
    }
}
