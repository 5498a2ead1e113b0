//! Configuration loading: merges every source into an [`AppConfig`].

use crate::config::merge::merge_policy;
use crate::config::sources::{global_file, workspace_file};
use crate::config::AppConfig;
use config::{ConfigError, Environment, File};
use std::path::Path;

const ENV_PREFIX: &str = "PROMPTLINE";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Order (later wins): defaults, global file, workspace files, environment.
    pub fn load(workspace_root: &Path) -> Result<AppConfig, ConfigError> {
        Self::load_with_override(workspace_root, None)
    }

    /// Like [`ConfigLoader::load`], with an explicit file layered above the workspace
    /// files. The explicit file must exist.
    pub fn load_with_override(
        workspace_root: &Path,
        explicit: Option<&Path>,
    ) -> Result<AppConfig, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = global_file::add_to_builder(builder)?;
        builder = workspace_file::add_to_builder(builder, workspace_root)?;
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Self::environment());

        builder.build()?.try_deserialize()
    }

    /// Load from a single file plus defaults, ignoring global and workspace files.
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }

    /// `PROMPTLINE__TITLES__ENABLED=false` maps to `titles.enabled`.
    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }
}
