//! CLI parse: clap types for promptline. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// promptline - queue prompts against text-generation backends
#[derive(Parser)]
#[command(name = "promptline")]
#[command(about = "Queue prompts against text-generation backends and keep every response")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file layered above workspace files
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a prompt and wait for its response and title
    Submit(SubmitArgs),
    /// Inspect and manage stored responses
    Responses {
        #[command(subcommand)]
        command: ResponseCommands,
    },
    /// Inspect configured providers
    Providers {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Delete metadata rows whose content file is gone
    Reconcile,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Prompt identifier responses are grouped under
    #[arg(long)]
    pub prompt_id: String,

    /// Display name (defaults to the prompt id)
    #[arg(long)]
    pub name: Option<String>,

    /// Prompt text
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub text: Option<String>,

    /// Read the prompt text from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Template parameter as key=value; replaces {{key}} in the prompt
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Provider profile (defaults to the active provider)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model (defaults to the profile's model)
    #[arg(long)]
    pub model: Option<String>,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Subcommand)]
pub enum ResponseCommands {
    /// List responses for a prompt, newest first
    List {
        prompt_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one response with its prompt and content
    Show {
        id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete one response
    Delete { id: String },
    /// Delete every response for a prompt
    Purge { prompt_id: String },
    /// Generate a new title for a completed response
    Retitle { id: String },
}

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List configured provider profiles
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Check connectivity and credentials (all profiles when no name is given)
    Validate { name: Option<String> },
    /// List models offered by a provider (active provider by default)
    Models { name: Option<String> },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
