//! Provider registry: configured profiles, the active selection, and adapter resolution.

use crate::error::ApiError;
use crate::provider::credentials::{CredentialDecryptor, PlaintextCredentials};
use crate::provider::{ProviderAdapter, ProviderConfig, ProviderFactory};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Manages provider profiles independently of jobs.
///
/// At most one profile is active at a time; activating one implicitly deactivates the
/// previous selection.
pub struct ProviderRegistry {
    profiles: HashMap<String, ProviderConfig>,
    adapters: Mutex<HashMap<String, Arc<dyn ProviderAdapter>>>,
    active: Option<String>,
    credentials: Arc<dyn CredentialDecryptor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::with_credentials(Arc::new(PlaintextCredentials))
    }

    pub fn with_credentials(credentials: Arc<dyn CredentialDecryptor>) -> Self {
        Self {
            profiles: HashMap::new(),
            adapters: Mutex::new(HashMap::new()),
            active: None,
            credentials,
        }
    }

    /// Load profiles and the active selection from configuration
    pub fn load_from_config(&mut self, config: &crate::config::AppConfig) -> Result<(), ApiError> {
        for (name, provider_config) in &config.providers {
            self.insert_profile(name.clone(), provider_config.clone());
        }
        if let Some(active) = &config.active_provider {
            self.activate(active)?;
        }
        Ok(())
    }

    /// Add or replace a profile. A cached adapter for the same name is dropped.
    pub fn insert_profile(&mut self, name: String, config: ProviderConfig) {
        self.adapters.lock().remove(&name);
        self.profiles.insert(name, config);
    }

    /// Register a profile together with a ready-made adapter (custom backends, tests).
    pub fn insert_adapter(
        &mut self,
        name: String,
        config: ProviderConfig,
        adapter: Arc<dyn ProviderAdapter>,
    ) {
        self.profiles.insert(name.clone(), config);
        self.adapters.lock().insert(name, adapter);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.adapters.lock().remove(name);
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.profiles.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.profiles.get(name)
    }

    pub fn get_or_error(&self, name: &str) -> Result<&ProviderConfig, ApiError> {
        self.get(name)
            .ok_or_else(|| ApiError::ProviderNotConfigured(format!("Provider not found: {}", name)))
    }

    /// All profiles, sorted by name
    pub fn list(&self) -> Vec<(&str, &ProviderConfig)> {
        let mut entries: Vec<_> = self
            .profiles
            .iter()
            .map(|(name, config)| (name.as_str(), config))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn activate(&mut self, name: &str) -> Result<(), ApiError> {
        self.get_or_error(name)?;
        if self.active.as_deref() != Some(name) {
            info!(provider = %name, previous = ?self.active, "Switching active provider");
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Active profile name and config, or `NoActiveProvider`
    pub fn active_profile(&self) -> Result<(&str, &ProviderConfig), ApiError> {
        let name = self.active.as_deref().ok_or(ApiError::NoActiveProvider)?;
        Ok((name, self.get_or_error(name)?))
    }

    /// Resolve (building and caching on first use) the adapter for a profile.
    pub fn adapter(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, ApiError> {
        if let Some(adapter) = self.adapters.lock().get(name) {
            return Ok(Arc::clone(adapter));
        }

        let config = self.get_or_error(name)?;
        let secret = match config.backend.credential_blob() {
            Some(blob) => Some(self.credentials.decrypt(name, blob)?),
            None => None,
        };
        let adapter = ProviderFactory::create_adapter(name, config, secret)?;
        debug!(provider = %name, kind = %config.kind(), "Created provider adapter");

        self.adapters
            .lock()
            .insert(name.to_string(), Arc::clone(&adapter));
        Ok(adapter)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
