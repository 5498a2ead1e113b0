//! Credential resolution for hosted providers.
//!
//! Stored API keys are opaque blobs; platform decryption lives outside this crate and is
//! plugged in through [`CredentialDecryptor`].

use crate::error::ApiError;

pub trait CredentialDecryptor: Send + Sync {
    /// Turn a stored blob into the plaintext secret, or fail when the platform's
    /// encryption facility is unavailable.
    fn decrypt(&self, provider_name: &str, blob: &str) -> Result<String, ApiError>;
}

/// Treats blobs as plaintext. Used when keys are kept unencrypted in the config file.
/// A blob of the form `env:NAME` is read from the environment variable `NAME`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextCredentials;

impl CredentialDecryptor for PlaintextCredentials {
    fn decrypt(&self, provider_name: &str, blob: &str) -> Result<String, ApiError> {
        if let Some(var) = blob.strip_prefix("env:") {
            return std::env::var(var).map_err(|_| ApiError::CredentialsUnavailable {
                provider: provider_name.to_string(),
                reason: format!("environment variable {} is not set", var),
            });
        }
        Ok(blob.to_string())
    }
}
