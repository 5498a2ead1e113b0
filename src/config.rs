//! Configuration System
//!
//! Layered configuration for providers, title generation, storage, scheduling and
//! logging. Sources are merged by [`ConfigLoader`]: built-in defaults, the global file,
//! workspace files, then `PROMPTLINE__`-prefixed environment variables.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use crate::provider::ProviderConfig;
pub use crate::title::TitleGenerationConfig;

mod loader;
mod merge;
mod sources;

pub use loader::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider profiles by name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Profile used by jobs that don't name one
    #[serde(default)]
    pub active_provider: Option<String>,

    #[serde(default)]
    pub titles: TitleGenerationConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where responses are persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Holds `metadata/` (sled) and `responses/` (content files)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

pub(crate) fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "promptline")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".promptline").join("data"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between progress notifications while a provider call is outstanding
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_progress_interval_ms() -> u64 {
    1000
}

impl SchedulerConfig {
    const MIN_PROGRESS_INTERVAL_MS: u64 = 50;

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(Self::MIN_PROGRESS_INTERVAL_MS))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Provider '{0}': {1}")]
    Provider(String, String),

    #[error("Active provider '{0}' is not configured")]
    UnknownActiveProvider(String),

    #[error("Titles: {0}")]
    Titles(String),

    #[error("Storage: {0}")]
    Storage(String),
}

impl AppConfig {
    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        for name in names {
            if let Err(e) = self.providers[name].validate() {
                errors.push(ValidationError::Provider(name.clone(), e));
            }
        }

        if let Some(active) = &self.active_provider {
            if !self.providers.contains_key(active) {
                errors.push(ValidationError::UnknownActiveProvider(active.clone()));
            }
        }

        if let Err(e) = self.titles.validate() {
            errors.push(ValidationError::Titles(e));
        }
        if let Some(provider) = &self.titles.selected_provider {
            if !self.providers.contains_key(provider) {
                errors.push(ValidationError::Titles(format!(
                    "selected_provider '{}' is not configured",
                    provider
                )));
            }
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("data_dir cannot be empty".to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
