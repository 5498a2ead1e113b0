//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to the scheduler.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, ProviderCommands, ResponseCommands, SubmitArgs};
pub use presentation::{
    format_provider_list_result_json, format_provider_list_result_text,
    format_provider_models_result, format_provider_validation_results, format_reconcile_report,
    format_response_json, format_response_list_json, format_response_list_text,
    format_response_text, format_title_outcome,
};
pub use route::RunContext;
