//! Provider command service: list, validate and model listing over the registry.

use crate::error::ApiError;
use crate::provider::{ProviderAdapter, ProviderConfig, ProviderRegistry};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;

pub struct ProviderCommandService;

/// One configured profile as shown by `providers list`.
#[derive(Debug, Clone)]
pub struct ProviderListEntry {
    pub name: String,
    pub config: ProviderConfig,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct ProviderListResult {
    pub providers: Vec<ProviderListEntry>,
}

/// Outcome of validating one profile.
#[derive(Debug, Clone)]
pub struct ProviderCheckResult {
    pub provider_name: String,
    pub elapsed_ms: u128,
    pub error: Option<String>,
}

impl ProviderCheckResult {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ProviderModelsResult {
    pub provider_name: String,
    pub models: Vec<String>,
}

impl ProviderCommandService {
    pub fn run_list(registry: &ProviderRegistry) -> ProviderListResult {
        let active = registry.active();
        let providers = registry
            .list()
            .into_iter()
            .map(|(name, config)| ProviderListEntry {
                name: name.to_string(),
                config: config.clone(),
                active: active == Some(name),
            })
            .collect();
        ProviderListResult { providers }
    }

    /// Validate one profile, or every profile when `name` is `None`.
    pub async fn run_validate(
        registry: &Arc<RwLock<ProviderRegistry>>,
        name: Option<&str>,
    ) -> Result<Vec<ProviderCheckResult>, ApiError> {
        let names: Vec<String> = match name {
            Some(name) => {
                registry.read().get_or_error(name)?;
                vec![name.to_string()]
            }
            None => registry
                .read()
                .list()
                .into_iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        };

        let mut results = Vec::with_capacity(names.len());
        for provider_name in names {
            let started = Instant::now();
            let error = match Self::adapter(registry, &provider_name) {
                Ok(adapter) => adapter.validate().await.err().map(|e| e.to_string()),
                Err(e) => Some(e.to_string()),
            };
            results.push(ProviderCheckResult {
                provider_name,
                elapsed_ms: started.elapsed().as_millis(),
                error,
            });
        }
        Ok(results)
    }

    /// Models offered by `name`, or by the active provider.
    pub async fn run_models(
        registry: &Arc<RwLock<ProviderRegistry>>,
        name: Option<&str>,
    ) -> Result<ProviderModelsResult, ApiError> {
        let provider_name = match name {
            Some(name) => name.to_string(),
            None => registry.read().active_profile()?.0.to_string(),
        };
        let adapter = Self::adapter(registry, &provider_name)?;
        let models = adapter.list_models().await?;
        Ok(ProviderModelsResult {
            provider_name,
            models,
        })
    }

    fn adapter(
        registry: &Arc<RwLock<ProviderRegistry>>,
        name: &str,
    ) -> Result<Arc<dyn ProviderAdapter>, ApiError> {
        registry.read().adapter(name)
    }
}
