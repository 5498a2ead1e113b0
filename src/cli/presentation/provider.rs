//! Provider command presentation: list, validation, models text/json.

use crate::provider::commands::{ProviderCheckResult, ProviderListResult, ProviderModelsResult};
use comfy_table::Table;
use serde_json::json;

pub fn format_provider_list_result_text(result: &ProviderListResult) -> String {
    if result.providers.is_empty() {
        return "No providers configured.\n\nAdd a [providers.<name>] table to .promptline/config.toml."
            .to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["", "Name", "Type", "Model", "Endpoint", "Timeout"]);
    for entry in &result.providers {
        table.add_row(vec![
            if entry.active { "*" } else { "" }.to_string(),
            entry.name.clone(),
            entry.config.kind().to_string(),
            entry.config.model.clone(),
            entry
                .config
                .backend
                .endpoint()
                .unwrap_or("(default endpoint)")
                .to_string(),
            format!("{}s", entry.config.timeout_secs),
        ]);
    }
    format!(
        "{}\nTotal: {} provider(s), * = active\n",
        table,
        result.providers.len()
    )
}

pub fn format_provider_list_result_json(result: &ProviderListResult) -> String {
    let providers: Vec<_> = result
        .providers
        .iter()
        .map(|entry| {
            json!({
                "name": entry.name,
                "type": entry.config.kind().slug(),
                "model": entry.config.model,
                "endpoint": entry.config.backend.endpoint(),
                "timeout_secs": entry.config.timeout_secs,
                "active": entry.active,
            })
        })
        .collect();
    let out = json!({ "providers": providers, "total": result.providers.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_provider_validation_results(results: &[ProviderCheckResult]) -> String {
    if results.is_empty() {
        return "No providers configured.".to_string();
    }
    let mut output = String::new();
    for result in results {
        match &result.error {
            None => output.push_str(&format!(
                "✓ {}: OK ({}ms)\n",
                result.provider_name, result.elapsed_ms
            )),
            Some(error) => output.push_str(&format!("✗ {}: {}\n", result.provider_name, error)),
        }
    }
    let passed = results.iter().filter(|r| r.passed()).count();
    output.push_str(&format!(
        "\n{}/{} provider(s) reachable\n",
        passed,
        results.len()
    ));
    output
}

pub fn format_provider_models_result(result: &ProviderModelsResult) -> String {
    if result.models.is_empty() {
        return format!("Provider '{}' reported no models.", result.provider_name);
    }
    let mut output = format!("Models on {}:\n", result.provider_name);
    for model in &result.models {
        output.push_str(&format!("  {}\n", model));
    }
    output
}
