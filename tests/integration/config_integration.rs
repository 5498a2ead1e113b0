//! Integration tests for Configuration System

use crate::integration::test_utils::with_xdg_env;
use promptline::config::{global_config_path, ConfigLoader, ValidationError};
use promptline::provider::{ProviderBackend, ProviderKind, ProviderRegistry};
use promptline::Scheduler;
use tempfile::TempDir;

fn write(path: &std::path::Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn test_config_loads_providers_into_registry() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("test_config.toml");
    write(
        &config_file,
        r#"
active_provider = "local"

[providers.local]
model = "llama3"
timeout_secs = 60
[providers.local.backend]
type = "ollama"
base_url = "http://localhost:11434"

[providers.hosted]
model = "gpt-4o-mini"
[providers.hosted.backend]
type = "openai"
api_key = "sk-test"

[providers.hosted.pricing]
prompt_per_1k = 0.15
completion_per_1k = 0.6
"#,
    );

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert!(config.validate().is_ok());

    let mut registry = ProviderRegistry::new();
    registry.load_from_config(&config).unwrap();
    assert_eq!(registry.active(), Some("local"));

    let local = registry.get("local").unwrap();
    assert_eq!(local.kind(), ProviderKind::Ollama);
    assert_eq!(local.timeout_secs, 60);
    assert_eq!(local.backend.endpoint(), Some("http://localhost:11434"));

    let hosted = registry.get("hosted").unwrap();
    assert_eq!(hosted.timeout_secs, 120);
    assert!(matches!(hosted.backend, ProviderBackend::OpenAi { .. }));
    assert!(hosted.pricing.is_some());
}

#[test]
fn test_config_validation_reports_unknown_active_provider() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("test_config.toml");
    write(
        &config_file,
        r#"
active_provider = "missing"

[titles]
timeout_secs = 500
"#,
    );

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let errors = config.validate().unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::UnknownActiveProvider(_))));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::Titles(_))));
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let global = global_config_path().unwrap();
        assert!(global.starts_with(test_dir.path()));
        write(
            &global,
            r#"
[titles]
timeout_secs = 20
enabled = false

[scheduler]
progress_interval_ms = 250
"#,
        );

        let workspace = test_dir.path().join("workspace");
        write(
            &workspace.join(".promptline").join("config.toml"),
            r#"
[titles]
timeout_secs = 40
"#,
        );

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.titles.timeout_secs, 40);
        assert!(!config.titles.enabled);
        assert_eq!(config.scheduler.progress_interval_ms, 250);
    });
}

#[test]
fn test_environment_file_and_variables_layer_last() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let workspace = test_dir.path().join("workspace");
        write(
            &workspace.join(".promptline").join("config.toml"),
            "[titles]\ntimeout_secs = 40\n",
        );
        write(
            &workspace.join(".promptline").join("staging.toml"),
            "[titles]\ntimeout_secs = 50\n",
        );

        std::env::set_var("PROMPTLINE_ENV", "staging");
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.titles.timeout_secs, 50);

        std::env::set_var("PROMPTLINE__TITLES__TIMEOUT_SECS", "60");
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.titles.timeout_secs, 60);
    });
}

#[test]
fn test_explicit_file_must_exist() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let missing = test_dir.path().join("nope.toml");
        assert!(ConfigLoader::load_with_override(test_dir.path(), Some(&missing)).is_err());
    });
}

#[tokio::test]
async fn test_scheduler_from_config_uses_storage_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let config_file = temp_dir.path().join("test_config.toml");
    write(
        &config_file,
        &format!(
            r#"
active_provider = "local"

[storage]
data_dir = "{}"

[providers.local]
model = "llama3"
[providers.local.backend]
type = "ollama"
"#,
            data_dir.display().to_string().replace('\\', "/")
        ),
    );

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let scheduler = Scheduler::from_config(&config).unwrap();
    let report = scheduler.start().unwrap();
    assert_eq!(report.reconcile.scanned, 0);
    assert!(data_dir.join("metadata").exists());
    assert!(data_dir.join("responses").exists());
    assert_eq!(scheduler.providers().read().active(), Some("local"));
}
