//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain errors to a user-facing line, with a hint where one helps.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::NoActiveProvider => format!(
            "{}\nSet active_provider in .promptline/config.toml or pass --provider.",
            e
        ),
        ApiError::ConfigError(_) => format!("{}\nCheck .promptline/config.toml and PROMPTLINE__* variables.", e),
        _ => e.to_string(),
    }
}
