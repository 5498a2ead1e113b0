//! Scheduler
//!
//! Single-flight processor and the public surface of the job pipeline. The queue and the
//! current-job pointer live behind one mutex; a single drain task, spawned on demand,
//! is the only code path that dequeues. Per job the sequence is strict:
//! provider call, content file, metadata row, title generation, next job.

use crate::config::{AppConfig, SchedulerConfig};
use crate::error::{ApiError, ProviderError, ProviderErrorKind, StorageError};
use crate::estimate::{HeuristicEstimator, TokenEstimator};
use crate::events::{EventBus, EventEnvelope, Notification};
use crate::provider::{
    with_deadline, Generation, GenerationRequest, ProviderAdapter, ProviderConfig,
    ProviderRegistry,
};
use crate::queue::{Job, JobQueue, JobSpec, JobStatus};
use crate::store::{
    NewResponse, ReconcileReport, RecoveryReport, ResponseMetadata, ResponseStatus,
    ResponseStore, ResponseWithContent,
};
use crate::title::{TitleGenerationConfig, TitleGenerator, TitleOutcome};
use crate::types::{JobId, ResponseId};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of [`Scheduler::submit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted { job_id: JobId },
    Rejected { reason: String },
}

impl SubmitOutcome {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            SubmitOutcome::Accepted { job_id } => Some(*job_id),
            SubmitOutcome::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentJob {
    pub id: JobId,
    pub prompt_id: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queue_size: usize,
    pub current_job: Option<CurrentJob>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    pub recovery: RecoveryReport,
    pub reconcile: ReconcileReport,
}

struct ActiveJob {
    id: JobId,
    prompt_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    cancel: CancellationToken,
    /// Cleared once the provider call has settled; later phases cannot be cancelled
    cancellable: bool,
}

#[derive(Default)]
struct SchedulerState {
    queue: JobQueue,
    current: Option<ActiveJob>,
    draining: bool,
}

impl SchedulerState {
    fn is_idle(&self) -> bool {
        !self.draining && self.current.is_none() && self.queue.is_empty()
    }
}

struct Inner {
    state: Mutex<SchedulerState>,
    idle: Notify,
    store: Arc<ResponseStore>,
    providers: Arc<RwLock<ProviderRegistry>>,
    titles: TitleGenerator,
    estimator: Arc<dyn TokenEstimator>,
    events: EventBus,
    progress_interval: Duration,
}

/// Builder for [`Scheduler`]
pub struct SchedulerBuilder {
    store: Arc<ResponseStore>,
    providers: ProviderRegistry,
    titles: TitleGenerationConfig,
    settings: SchedulerConfig,
    estimator: Arc<dyn TokenEstimator>,
    events: EventBus,
}

impl SchedulerBuilder {
    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn title_config(mut self, titles: TitleGenerationConfig) -> Self {
        self.titles = titles;
        self
    }

    pub fn settings(mut self, settings: SchedulerConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Scheduler {
        let providers = Arc::new(RwLock::new(self.providers));
        let titles = TitleGenerator::new(
            Arc::clone(&self.store),
            Arc::clone(&providers),
            Arc::new(RwLock::new(self.titles)),
            self.events.clone(),
        );
        Scheduler {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState::default()),
                idle: Notify::new(),
                store: self.store,
                providers,
                titles,
                estimator: self.estimator,
                events: self.events,
                progress_interval: self.settings.progress_interval(),
            }),
        }
    }
}

/// Cheap-to-clone handle to the job pipeline.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn builder(store: Arc<ResponseStore>) -> SchedulerBuilder {
        SchedulerBuilder {
            store,
            providers: ProviderRegistry::new(),
            titles: TitleGenerationConfig::default(),
            settings: SchedulerConfig::default(),
            estimator: Arc::new(HeuristicEstimator),
            events: EventBus::new(),
        }
    }

    /// Open the store under `storage.data_dir` and load providers from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        let store = ResponseStore::open(&config.storage.data_dir)?;
        let mut providers = ProviderRegistry::new();
        providers.load_from_config(config)?;
        Ok(Self::builder(Arc::new(store))
            .providers(providers)
            .title_config(config.titles.clone())
            .settings(config.scheduler.clone())
            .build())
    }

    /// Startup recovery: settle rows left by a crashed process, then sweep orphans.
    pub fn start(&self) -> Result<StartupReport, ApiError> {
        let recovery = self.inner.store.recover_interrupted()?;
        let reconcile = self.inner.store.reconcile()?;
        Ok(StartupReport {
            recovery,
            reconcile,
        })
    }

    /// Validate and enqueue a job; starts processing if the scheduler is idle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, spec: JobSpec) -> SubmitOutcome {
        let job = match self.inner.admit(spec) {
            Ok(job) => job,
            Err(reason) => {
                info!(reason = %reason, "Job rejected");
                return SubmitOutcome::Rejected { reason };
            }
        };
        let job_id = job.id;

        info!(
            job_id = %job_id,
            prompt_id = %job.prompt_id,
            provider = %job.provider,
            model = %job.model,
            "Job enqueued"
        );
        let (queue_size, spawn_drain) = {
            let mut state = self.inner.state.lock();
            state.queue.enqueue(job);
            let spawn_drain = !state.draining;
            state.draining = true;
            (state.queue.size(), spawn_drain)
        };
        self.inner.events.emit(Notification::QueueSizeChanged {
            queue_size,
            added: Some(job_id),
            removed: None,
        });

        if spawn_drain {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(inner.drain());
        }
        SubmitOutcome::Accepted { job_id }
    }

    /// Cancel a queued or in-flight job. Queued jobs are dropped without a row.
    pub fn cancel(&self, id: JobId) -> bool {
        let mut state = self.inner.state.lock();
        if let Some(current) = state.current.as_ref().filter(|c| c.id == id) {
            if !current.cancellable {
                debug!(job_id = %id, "Job past provider call, cancel ignored");
                return false;
            }
            current.cancel.cancel();
            info!(job_id = %id, "Cancelling in-flight job");
            return true;
        }
        if state.queue.remove(id) {
            let queue_size = state.queue.size();
            drop(state);
            info!(job_id = %id, "Removed queued job");
            self.inner.events.emit(Notification::QueueSizeChanged {
                queue_size,
                added: None,
                removed: Some(id),
            });
            return true;
        }
        false
    }

    /// Cancel the in-flight job and clear the queue. Returns how many jobs were affected.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.inner.state.lock();
        let mut count = state.queue.clear();
        if let Some(current) = state.current.as_ref() {
            if current.cancellable && !current.cancel.is_cancelled() {
                current.cancel.cancel();
                count += 1;
            }
        }
        drop(state);

        info!(cancelled = count, "Cancelled all jobs");
        self.inner.events.emit(Notification::QueueSizeChanged {
            queue_size: 0,
            added: None,
            removed: None,
        });
        count
    }

    pub fn queue_status(&self) -> QueueStatus {
        let state = self.inner.state.lock();
        QueueStatus {
            queue_size: state.queue.size(),
            current_job: state.current.as_ref().map(|job| CurrentJob {
                id: job.id,
                prompt_id: job.prompt_id.clone(),
                started_at: job.started_at,
                elapsed_ms: job.started.elapsed().as_millis() as u64,
            }),
        }
    }

    pub fn list_responses(&self, prompt_id: &str) -> Result<Vec<ResponseMetadata>, ApiError> {
        Ok(self.inner.store.list_responses(prompt_id)?)
    }

    pub fn get_response(&self, id: &ResponseId) -> Result<ResponseWithContent, ApiError> {
        self.inner.store.get_response(id).map_err(|e| match e {
            StorageError::ResponseNotFound(id) => ApiError::ResponseNotFound(id),
            other => other.into(),
        })
    }

    pub fn delete_response(&self, id: &ResponseId) -> Result<(), ApiError> {
        if self.inner.store.delete(id)? {
            Ok(())
        } else {
            Err(ApiError::ResponseNotFound(*id))
        }
    }

    pub fn delete_all_responses(&self, prompt_id: &str) -> Result<usize, ApiError> {
        Ok(self.inner.store.delete_all_for_prompt(prompt_id)?)
    }

    pub async fn regenerate_title(&self, id: &ResponseId) -> Result<TitleOutcome, ApiError> {
        self.inner.titles.regenerate(id).await
    }

    /// Select the provider used by jobs that don't name one.
    pub fn activate_provider(&self, name: &str) -> Result<(), ApiError> {
        self.inner.providers.write().activate(name)
    }

    pub fn providers(&self) -> Arc<RwLock<ProviderRegistry>> {
        Arc::clone(&self.inner.providers)
    }

    pub fn set_title_config(&self, config: TitleGenerationConfig) -> Result<(), ApiError> {
        config.validate().map_err(ApiError::ConfigError)?;
        self.inner.titles.set_config(config);
        Ok(())
    }

    pub fn title_config(&self) -> TitleGenerationConfig {
        self.inner.titles.config()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.inner.events.subscribe()
    }

    pub fn store(&self) -> Arc<ResponseStore> {
        Arc::clone(&self.inner.store)
    }

    /// Resolve once the queue is empty and no job (or its title step) is running.
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    /// Submission-time checks. Resolves provider and model for the job.
    fn admit(&self, spec: JobSpec) -> Result<Job, String> {
        if spec.content.trim().is_empty() {
            return Err("Prompt content is empty".to_string());
        }

        let registry = self.providers.read();
        let provider = match spec.provider.clone() {
            Some(name) => name,
            None => registry
                .active()
                .map(str::to_string)
                .ok_or_else(|| ApiError::NoActiveProvider.to_string())?,
        };
        let profile = registry.get_or_error(&provider).map_err(|e| e.to_string())?;
        let model = spec.model.clone().unwrap_or_else(|| profile.model.clone());

        let estimate = self.estimator.estimate(
            &spec.content,
            profile.kind(),
            &model,
            profile.context_limit,
        );
        if !estimate.within_limit {
            return Err(format!(
                "Prompt is too long for {}: about {} tokens, limit is {}",
                model, estimate.tokens, estimate.limit
            ));
        }
        drop(registry);

        Ok(Job::from_spec(spec, provider, model))
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.queue.dequeue() {
                    Some(job) => {
                        let cancel = CancellationToken::new();
                        state.current = Some(ActiveJob {
                            id: job.id,
                            prompt_id: job.prompt_id.clone(),
                            started_at: Utc::now(),
                            started: Instant::now(),
                            cancel: cancel.clone(),
                            cancellable: true,
                        });
                        Some((job, cancel, state.queue.size()))
                    }
                    None => {
                        state.draining = false;
                        None
                    }
                }
            };

            let Some((job, cancel, queue_size)) = next else {
                debug!("Queue drained, scheduler idle");
                self.idle.notify_waiters();
                return;
            };

            self.events.emit(Notification::QueueSizeChanged {
                queue_size,
                added: None,
                removed: Some(job.id),
            });
            self.process(job, cancel).await;
            self.state.lock().current = None;
        }
    }

    async fn process(&self, mut job: Job, cancel: CancellationToken) {
        job.status = JobStatus::Processing;
        let started = Instant::now();
        info!(
            job_id = %job.id,
            prompt_id = %job.prompt_id,
            provider = %job.provider,
            model = %job.model,
            "Job started"
        );
        self.events.emit(Notification::JobProgress {
            job_id: job.id,
            status: job.status,
            elapsed_ms: 0,
        });

        let (result, profile) = self.call_provider(&job, &cancel, started).await;
        let result = self.settle(job.id, result, &cancel);
        let response_time_ms = started.elapsed().as_millis() as u64;

        let mut new_response = NewResponse {
            prompt_id: job.prompt_id.clone(),
            prompt_name: job.prompt_name.clone(),
            provider: job.provider.clone(),
            model: job.model.clone(),
            parameters: job.parameters.clone(),
            prompt: job.content.clone(),
            body: String::new(),
            status: ResponseStatus::Completed,
            response_time_ms,
            token_usage: None,
            cost_estimate: None,
            error_code: None,
            error_message: None,
        };
        match result {
            Ok(generation) => {
                info!(
                    job_id = %job.id,
                    duration_ms = response_time_ms,
                    tokens = generation.usage.map(|u| u.total),
                    "Provider response received"
                );
                job.status = JobStatus::Completed;
                new_response.cost_estimate = profile
                    .as_ref()
                    .and_then(|p| p.pricing.as_ref())
                    .zip(generation.usage.as_ref())
                    .map(|(pricing, usage)| pricing.estimate(usage));
                new_response.token_usage = generation.usage;
                new_response.body = generation.content;
            }
            Err(e) => {
                let (status, response_status) =
                    if cancel.is_cancelled() || e.kind == ProviderErrorKind::Cancelled {
                        (JobStatus::Cancelled, ResponseStatus::Cancelled)
                    } else {
                        (JobStatus::Failed, ResponseStatus::Failed)
                    };
                warn!(
                    job_id = %job.id,
                    duration_ms = response_time_ms,
                    code = e.kind.code(),
                    error = %e.message,
                    "Provider call did not complete"
                );
                job.status = status;
                new_response.status = response_status;
                new_response.error_code = Some(e.kind.code().to_string());
                new_response.error_message = Some(e.message.clone());
                new_response.body = e.message;
            }
        }

        let body = new_response.body.clone();
        let row = match self.store.create(new_response) {
            Ok(row) => row,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to persist response");
                self.events.emit(Notification::JobCompleted {
                    job_id: job.id,
                    status: JobStatus::Failed,
                    response_id: None,
                    error: Some(format!("Failed to persist response: {}", e)),
                });
                return;
            }
        };
        info!(
            job_id = %job.id,
            response_id = %row.id,
            status = row.status.as_str(),
            "Response persisted"
        );
        self.events.emit(Notification::JobCompleted {
            job_id: job.id,
            status: job.status,
            response_id: Some(row.id),
            error: row.error_message.clone(),
        });

        if job.status == JobStatus::Completed {
            if let Err(e) = self.titles.generate_title(&row, &body).await {
                warn!(job_id = %job.id, response_id = %row.id, error = %e, "Title generation failed");
            }
        }
    }

    /// Close the cancel window under the lock `cancel` takes. A cancel accepted before
    /// this point turns a late success into a cancellation.
    fn settle(
        &self,
        job_id: JobId,
        result: Result<Generation, ProviderError>,
        cancel: &CancellationToken,
    ) -> Result<Generation, ProviderError> {
        let cancelled = {
            let mut state = self.state.lock();
            if let Some(current) = state.current.as_mut() {
                current.cancellable = false;
            }
            cancel.is_cancelled()
        };
        match result {
            Ok(_) if cancelled => {
                debug!(job_id = %job_id, "Cancel accepted as the provider call settled");
                Err(ProviderError::cancelled())
            }
            other => other,
        }
    }

    /// Run the provider call, emitting progress while it is outstanding.
    async fn call_provider(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        started: Instant,
    ) -> (Result<Generation, ProviderError>, Option<ProviderConfig>) {
        let resolved = {
            let registry = self.providers.read();
            registry
                .get_or_error(&job.provider)
                .cloned()
                .and_then(|profile| registry.adapter(&job.provider).map(|a| (a, profile)))
        };
        let (adapter, profile): (Arc<dyn ProviderAdapter>, ProviderConfig) = match resolved {
            Ok(pair) => pair,
            Err(e) => return (Err(into_provider_error(e)), None),
        };

        let timeout = Duration::from_secs(profile.timeout_secs);
        let request = GenerationRequest {
            prompt: job.content.clone(),
            model: job.model.clone(),
            options: profile.default_options.clone(),
            timeout,
        };
        debug!(job_id = %job.id, provider = %adapter.name(), "Sending request to provider");

        let call = with_deadline(adapter.generate(request, cancel), timeout, cancel);
        tokio::pin!(call);
        let mut ticker = tokio::time::interval(self.progress_interval);
        ticker.tick().await;
        let result = loop {
            tokio::select! {
                result = &mut call => break result,
                _ = ticker.tick() => {
                    self.events.emit(Notification::JobProgress {
                        job_id: job.id,
                        status: JobStatus::Processing,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }
        };
        (result, Some(profile))
    }
}

fn into_provider_error(error: ApiError) -> ProviderError {
    match error {
        ApiError::Provider(e) => e,
        ApiError::CredentialsUnavailable { .. } => ProviderError::unauthorized(error.to_string()),
        other => ProviderError::unknown(other.to_string()),
    }
}
