//! CLI presentation: text and json formatters per command family.

mod provider;
mod responses;

pub use provider::{
    format_provider_list_result_json, format_provider_list_result_text,
    format_provider_models_result, format_provider_validation_results,
};
pub use responses::{
    format_reconcile_report, format_response_json, format_response_list_json,
    format_response_list_text, format_response_text, format_title_outcome,
};
