//! CLI route: single route table and run context. Dispatches to the scheduler and presentation.

use crate::config::ConfigLoader;
use crate::error::ApiError;
use crate::events::Notification;
use crate::provider::ProviderCommandService;
use crate::queue::{JobSpec, JobStatus};
use crate::scheduler::{Scheduler, StartupReport, SubmitOutcome};
use crate::types::{JobId, ResponseId};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::parse::{Commands, ProviderCommands, ResponseCommands, SubmitArgs};
use crate::cli::presentation::{
    format_provider_list_result_json, format_provider_list_result_text,
    format_provider_models_result, format_provider_validation_results, format_reconcile_report,
    format_response_json, format_response_list_json, format_response_list_text,
    format_response_text, format_title_outcome,
};

/// Runtime context for CLI execution: workspace, loaded config, and the scheduler.
pub struct RunContext {
    scheduler: Scheduler,
    workspace_root: PathBuf,
    startup: StartupReport,
}

impl RunContext {
    /// Load configuration, open the response store, and run startup recovery.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load_with_override(&workspace_root, config_path.as_deref())?;
        if let Err(problems) = config.validate() {
            let joined = problems
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::ConfigError(joined));
        }

        let scheduler = Scheduler::from_config(&config)?;
        let startup = scheduler.start()?;
        info!(
            cancelled_rows = startup.recovery.cancelled_rows,
            failed_titles = startup.recovery.failed_titles,
            orphans_removed = startup.reconcile.removed,
            "Startup recovery complete"
        );

        Ok(Self {
            scheduler,
            workspace_root,
            startup,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Submit(args) => self.handle_submit(args).await,
            Commands::Responses { command } => self.handle_responses_command(command).await,
            Commands::Providers { command } => self.handle_provider_command(command).await,
            Commands::Reconcile => self.handle_reconcile(),
        }
    }

    async fn handle_submit(&self, args: &SubmitArgs) -> Result<String, ApiError> {
        let template = match (&args.text, &args.file) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => read_prompt_file(&self.resolve(path))?,
            (None, None) => {
                return Err(ApiError::InvalidRequest(
                    "Either --text or --file is required".to_string(),
                ))
            }
        };

        let mut spec = JobSpec::new(args.prompt_id.clone(), render_template(&template, &args.params));
        if let Some(name) = &args.name {
            spec.prompt_name = name.clone();
        }
        for (key, value) in &args.params {
            spec = spec.with_parameter(key.clone(), value.clone());
        }
        if let Some(provider) = &args.provider {
            spec = spec.with_provider(provider.clone());
        }
        if let Some(model) = &args.model {
            spec = spec.with_model(model.clone());
        }

        // Subscribe before submitting so the completion event cannot be missed.
        let mut events = self.scheduler.subscribe();
        let job_id = match self.scheduler.submit(spec) {
            SubmitOutcome::Accepted { job_id } => job_id,
            SubmitOutcome::Rejected { reason } => return Err(ApiError::InvalidRequest(reason)),
        };

        let mut completion = None;
        loop {
            match events.recv().await {
                Ok(envelope) => {
                    if let Some(done) = completion_for(job_id, &envelope.event) {
                        completion = Some(done);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        // The title step runs after JobCompleted; wait for it before reading the row back.
        self.scheduler.wait_for_idle().await;

        let (status, response_id, error) = completion.ok_or_else(|| {
            ApiError::InvalidRequest(format!("Job {} finished without a completion event", job_id))
        })?;
        debug!(job_id = %job_id, status = ?status, "Job settled");
        let Some(response_id) = response_id else {
            return Err(ApiError::InvalidRequest(
                error.unwrap_or_else(|| format!("Job {} did not produce a response", job_id)),
            ));
        };

        let response = self.scheduler.get_response(&response_id)?;
        if args.format == "json" {
            format_response_json(&response)
        } else {
            Ok(format_response_text(&response))
        }
    }

    async fn handle_responses_command(
        &self,
        command: &ResponseCommands,
    ) -> Result<String, ApiError> {
        match command {
            ResponseCommands::List { prompt_id, format } => {
                let rows = self.scheduler.list_responses(prompt_id)?;
                if format == "json" {
                    format_response_list_json(&rows)
                } else {
                    Ok(format_response_list_text(prompt_id, &rows))
                }
            }
            ResponseCommands::Show { id, format } => {
                let response = self.scheduler.get_response(&parse_response_id(id)?)?;
                if format == "json" {
                    format_response_json(&response)
                } else {
                    Ok(format_response_text(&response))
                }
            }
            ResponseCommands::Delete { id } => {
                let id = parse_response_id(id)?;
                self.scheduler.delete_response(&id)?;
                Ok(format!("Deleted response {}", id))
            }
            ResponseCommands::Purge { prompt_id } => {
                let removed = self.scheduler.delete_all_responses(prompt_id)?;
                Ok(format!(
                    "Deleted {} response(s) for prompt '{}'",
                    removed, prompt_id
                ))
            }
            ResponseCommands::Retitle { id } => {
                let outcome = self
                    .scheduler
                    .regenerate_title(&parse_response_id(id)?)
                    .await?;
                Ok(format_title_outcome(&outcome))
            }
        }
    }

    async fn handle_provider_command(
        &self,
        command: &ProviderCommands,
    ) -> Result<String, ApiError> {
        let registry = self.scheduler.providers();
        match command {
            ProviderCommands::List { format } => {
                let result = ProviderCommandService::run_list(&registry.read());
                if format == "json" {
                    Ok(format_provider_list_result_json(&result))
                } else {
                    Ok(format_provider_list_result_text(&result))
                }
            }
            ProviderCommands::Validate { name } => {
                let results =
                    ProviderCommandService::run_validate(&registry, name.as_deref()).await?;
                Ok(format_provider_validation_results(&results))
            }
            ProviderCommands::Models { name } => {
                let result = ProviderCommandService::run_models(&registry, name.as_deref()).await?;
                Ok(format_provider_models_result(&result))
            }
        }
    }

    /// Report what startup recovery did; reconciliation already ran when the context opened.
    fn handle_reconcile(&self) -> Result<String, ApiError> {
        let recovery = &self.startup.recovery;
        let mut output = format_reconcile_report(&self.startup.reconcile);
        output.push_str(&format!(
            "\nRecovery: {} interrupted response(s) cancelled, {} pending title(s) failed",
            recovery.cancelled_rows, recovery.failed_titles
        ));
        Ok(output)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

fn completion_for(
    job_id: JobId,
    event: &Notification,
) -> Option<(JobStatus, Option<ResponseId>, Option<String>)> {
    match event {
        Notification::JobCompleted {
            job_id: id,
            status,
            response_id,
            error,
        } if *id == job_id => Some((*status, *response_id, error.clone())),
        _ => None,
    }
}

fn read_prompt_file(path: &Path) -> Result<String, ApiError> {
    std::fs::read_to_string(path).map_err(|e| {
        ApiError::InvalidRequest(format!("Failed to read prompt file {}: {}", path.display(), e))
    })
}

fn parse_response_id(raw: &str) -> Result<ResponseId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidRequest(format!("Invalid response id: {}", raw)))
}

/// Replace `{{key}}` placeholders; unknown placeholders are left as written.
fn render_template(template: &str, params: &[(String, String)]) -> String {
    params.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{{{}}}}}", key), value)
    })
}
