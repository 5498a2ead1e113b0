//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key; tables merge, scalars replace.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let data_dir = crate::config::default_data_dir();
    Config::builder()
        .set_default("storage.data_dir", data_dir.to_string_lossy().to_string())?
        .set_default("scheduler.progress_interval_ms", 1000)?
        .set_default("titles.enabled", true)?
        .set_default("titles.timeout_secs", 30)
}
