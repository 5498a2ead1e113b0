//! Response command presentation: list, show, submit results, maintenance reports.

use crate::error::ApiError;
use crate::store::{ReconcileReport, ResponseMetadata, ResponseWithContent};
use crate::title::TitleOutcome;
use comfy_table::Table;
use serde_json::json;

const NO_TITLE: &str = "-";

fn title_of(row: &ResponseMetadata) -> &str {
    row.generated_title.as_deref().unwrap_or(NO_TITLE)
}

fn metadata_json(row: &ResponseMetadata) -> serde_json::Value {
    json!({
        "id": row.id.to_string(),
        "prompt_id": row.prompt_id,
        "prompt_name": row.prompt_name,
        "provider": row.provider,
        "model": row.model,
        "parameters": row.parameters,
        "created_at": row.created_at.to_rfc3339(),
        "response_time_ms": row.response_time_ms,
        "token_usage": row.token_usage,
        "cost_estimate": row.cost_estimate,
        "status": row.status.as_str(),
        "file_path": row.file_path,
        "error_code": row.error_code,
        "error_message": row.error_message,
        "title": row.generated_title,
        "title_status": row.title_generation_status.map(|s| s.as_str()),
        "title_model": row.title_model,
    })
}

pub fn format_response_list_text(prompt_id: &str, rows: &[ResponseMetadata]) -> String {
    if rows.is_empty() {
        return format!("No responses for prompt '{}'.", prompt_id);
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["ID", "Created", "Status", "Model", "Tokens", "Title"]);
    for row in rows {
        table.add_row(vec![
            row.id.to_string(),
            row.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.status.as_str().to_string(),
            row.model.clone(),
            row.token_usage
                .map(|u| u.total.to_string())
                .unwrap_or_else(|| "-".to_string()),
            title_of(row).to_string(),
        ]);
    }
    table.to_string()
}

pub fn format_response_list_json(rows: &[ResponseMetadata]) -> Result<String, ApiError> {
    let items: Vec<_> = rows.iter().map(metadata_json).collect();
    serde_json::to_string_pretty(&json!({ "responses": items, "total": rows.len() }))
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to render JSON: {}", e)))
}

pub fn format_response_text(response: &ResponseWithContent) -> String {
    let row = &response.metadata;
    let mut output = format!("{}\n", title_of(row));
    output.push_str(&format!("ID:       {}\n", row.id));
    output.push_str(&format!("Prompt:   {} ({})\n", row.prompt_name, row.prompt_id));
    output.push_str(&format!("Provider: {} / {}\n", row.provider, row.model));
    output.push_str(&format!("Status:   {}", row.status.as_str()));
    if let Some(code) = &row.error_code {
        output.push_str(&format!(" ({})", code));
    }
    output.push('\n');
    output.push_str(&format!("Created:  {}\n", row.created_at.to_rfc3339()));
    output.push_str(&format!("Time:     {}ms\n", row.response_time_ms));
    if let Some(usage) = row.token_usage {
        output.push_str(&format!(
            "Tokens:   {} prompt + {} completion = {}\n",
            usage.prompt, usage.completion, usage.total
        ));
    }
    if let Some(cost) = row.cost_estimate {
        output.push_str(&format!("Cost:     ~${:.4}\n", cost));
    }
    output.push_str("\n");
    output.push_str(&response.content);
    output
}

pub fn format_response_json(response: &ResponseWithContent) -> Result<String, ApiError> {
    let mut value = metadata_json(&response.metadata);
    value["prompt"] = json!(response.prompt);
    value["content"] = json!(response.content);
    serde_json::to_string_pretty(&value)
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to render JSON: {}", e)))
}

pub fn format_title_outcome(outcome: &TitleOutcome) -> String {
    match outcome {
        TitleOutcome::Disabled => "Title generation is disabled.".to_string(),
        TitleOutcome::Generated {
            title,
            model,
            fallback: false,
        } => format!("Title: {} (model {})", title, model),
        TitleOutcome::Generated {
            title,
            fallback: true,
            ..
        } => format!("Title: {} (fallback, backend unavailable)", title),
    }
}

pub fn format_reconcile_report(report: &ReconcileReport) -> String {
    format!(
        "Reconciliation: scanned {} row(s), removed {} orphan(s), {} error(s)",
        report.scanned, report.removed, report.errors
    )
}
