//! Title Generation
//!
//! Secondary generation run for every successful response. The scheduler awaits it
//! before starting the next job. Backend failures and timeouts degrade to a title built
//! from the response's first words; only a storage failure makes the step fail.

pub mod text;

use crate::error::{ApiError, StorageError};
use crate::events::{EventBus, Notification};
use crate::provider::{CompletionOptions, GenerationRequest, ProviderAdapter, ProviderRegistry};
use crate::store::{ResponseMetadata, ResponseStatus, ResponseStore, TitleStatus, TitleUpdate};
use crate::types::ResponseId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Recorded as the title model when the title was synthesized locally.
pub const FALLBACK_MODEL: &str = "fallback";

const TITLE_INSTRUCTION: &str = "Write a descriptive title of 5 to 8 words for the text below. \
Use the same language as the text. Do not wrap the title in quotes. \
Reply with the title only.";

/// Process-wide title settings, read fresh before every title job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleGenerationConfig {
    pub enabled: bool,
    /// Profile used for titles; defaults to the provider that produced the response
    pub selected_provider: Option<String>,
    pub selected_model: Option<String>,
    pub timeout_secs: u64,
}

impl TitleGenerationConfig {
    pub const MIN_TIMEOUT_SECS: u64 = 5;
    pub const MAX_TIMEOUT_SECS: u64 = 120;

    /// Effective deadline, clamped into the supported range
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .clamp(Self::MIN_TIMEOUT_SECS, Self::MAX_TIMEOUT_SECS),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(Self::MIN_TIMEOUT_SECS..=Self::MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(format!(
                "titles.timeout_secs must be between {} and {}, got {}",
                Self::MIN_TIMEOUT_SECS,
                Self::MAX_TIMEOUT_SECS,
                self.timeout_secs
            ));
        }
        if matches!(&self.selected_model, Some(m) if m.trim().is_empty()) {
            return Err("titles.selected_model must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for TitleGenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            selected_provider: None,
            selected_model: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleOutcome {
    /// Feature switched off; nothing was called or written
    Disabled,
    Generated {
        title: String,
        model: String,
        /// True when the backend failed and the title was synthesized from the content
        fallback: bool,
    },
}

pub struct TitleGenerator {
    store: Arc<ResponseStore>,
    providers: Arc<RwLock<ProviderRegistry>>,
    config: Arc<RwLock<TitleGenerationConfig>>,
    events: EventBus,
}

impl TitleGenerator {
    pub fn new(
        store: Arc<ResponseStore>,
        providers: Arc<RwLock<ProviderRegistry>>,
        config: Arc<RwLock<TitleGenerationConfig>>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            providers,
            config,
            events,
        }
    }

    pub fn config(&self) -> TitleGenerationConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: TitleGenerationConfig) {
        *self.config.write() = config;
    }

    /// Produce and persist a title for `response` whose body is `content`.
    pub async fn generate_title(
        &self,
        response: &ResponseMetadata,
        content: &str,
    ) -> Result<TitleOutcome, ApiError> {
        let config = self.config();
        if !config.enabled {
            debug!(response_id = %response.id, "Title generation disabled");
            return Ok(TitleOutcome::Disabled);
        }

        self.persist(response.id, &TitleUpdate::pending())?;
        info!(response_id = %response.id, "Title generation pending");

        let started = Instant::now();
        let (title, model, fallback) = match self.ask_backend(response, content, &config).await {
            Ok((title, model)) => (title, model, false),
            Err(reason) => {
                warn!(response_id = %response.id, error = %reason, "Title backend failed, using fallback");
                (text::fallback_title(content), FALLBACK_MODEL.to_string(), true)
            }
        };

        self.persist(response.id, &TitleUpdate::completed(title.clone(), model.clone()))?;
        info!(
            response_id = %response.id,
            model = %model,
            fallback,
            duration_ms = started.elapsed().as_millis() as u64,
            "Title generation completed"
        );
        Ok(TitleOutcome::Generated {
            title,
            model,
            fallback,
        })
    }

    /// Re-run title generation for an existing completed response.
    pub async fn regenerate(&self, id: &ResponseId) -> Result<TitleOutcome, ApiError> {
        let response = self.store.get_response(id).map_err(|e| match e {
            StorageError::ResponseNotFound(id) => ApiError::ResponseNotFound(id),
            other => other.into(),
        })?;
        if response.metadata.status != ResponseStatus::Completed {
            return Err(ApiError::InvalidRequest(format!(
                "Response {} has status {}; only completed responses get titles",
                id,
                response.metadata.status.as_str()
            )));
        }
        self.generate_title(&response.metadata, &response.content).await
    }

    /// Write a title transition and announce it. On a write failure the row is still
    /// marked failed and the error is returned.
    fn persist(&self, id: ResponseId, update: &TitleUpdate) -> Result<(), ApiError> {
        match self.store.update_title(&id, update) {
            Ok(row) => {
                self.events.emit(Notification::TitleStatusChanged {
                    response_id: id,
                    status: update.status,
                    title: row.generated_title.filter(|_| update.status == TitleStatus::Completed),
                    model: row.title_model.filter(|_| update.status == TitleStatus::Completed),
                    error: None,
                });
                Ok(())
            }
            Err(e) => {
                warn!(response_id = %id, error = %e, "Title generation failed to persist");
                if let Err(mark) = self.store.fail_title(&id) {
                    debug!(response_id = %id, error = %mark, "Could not mark title as failed");
                }
                self.events.emit(Notification::TitleStatusChanged {
                    response_id: id,
                    status: TitleStatus::Failed,
                    title: None,
                    model: None,
                    error: Some(e.to_string()),
                });
                Err(e.into())
            }
        }
    }

    async fn ask_backend(
        &self,
        response: &ResponseMetadata,
        content: &str,
        config: &TitleGenerationConfig,
    ) -> Result<(String, String), String> {
        let (adapter, model) = self.resolve(response, config).map_err(|e| e.to_string())?;
        let timeout = config.timeout();
        let request = GenerationRequest {
            prompt: format!("{}\n\n{}", TITLE_INSTRUCTION, text::prepare_input(content)),
            model: model.clone(),
            options: CompletionOptions {
                temperature: Some(0.3),
                max_tokens: Some(32),
                ..CompletionOptions::default()
            },
            timeout,
        };

        let cancel = CancellationToken::new();
        debug!(response_id = %response.id, provider = %adapter.name(), model = %model, "Requesting title");
        let generation = match tokio::time::timeout(timeout, adapter.generate(request, &cancel)).await {
            Ok(Ok(generation)) => generation,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => {
                cancel.cancel();
                return Err(format!("title request timed out after {}s", timeout.as_secs()));
            }
        };

        let title = text::validate_title(&generation.content)
            .ok_or_else(|| "backend returned an empty title".to_string())?;
        Ok((title, model))
    }

    fn resolve(
        &self,
        response: &ResponseMetadata,
        config: &TitleGenerationConfig,
    ) -> Result<(Arc<dyn ProviderAdapter>, String), ApiError> {
        let registry = self.providers.read();
        match &config.selected_provider {
            Some(provider) => {
                let adapter = registry.adapter(provider)?;
                let model = config
                    .selected_model
                    .clone()
                    .unwrap_or_else(|| adapter.default_model().to_string());
                Ok((adapter, model))
            }
            None => {
                let adapter = registry.adapter(&response.provider)?;
                let model = config
                    .selected_model
                    .clone()
                    .unwrap_or_else(|| response.model.clone());
                Ok((adapter, model))
            }
        }
    }
}
