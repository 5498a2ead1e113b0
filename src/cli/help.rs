//! CLI command-name contract for log fields.

use crate::cli::parse::{Commands, ProviderCommands, ResponseCommands};

/// Dotted command name used as the `command` log field (e.g. "responses.list").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Submit(_) => "submit".to_string(),
        Commands::Responses { command } => format!("responses.{}", response_command_name(command)),
        Commands::Providers { command } => format!("providers.{}", provider_command_name(command)),
        Commands::Reconcile => "reconcile".to_string(),
    }
}

fn response_command_name(command: &ResponseCommands) -> &'static str {
    match command {
        ResponseCommands::List { .. } => "list",
        ResponseCommands::Show { .. } => "show",
        ResponseCommands::Delete { .. } => "delete",
        ResponseCommands::Purge { .. } => "purge",
        ResponseCommands::Retitle { .. } => "retitle",
    }
}

fn provider_command_name(command: &ProviderCommands) -> &'static str {
    match command {
        ProviderCommands::List { .. } => "list",
        ProviderCommands::Validate { .. } => "validate",
        ProviderCommands::Models { .. } => "models",
    }
}
