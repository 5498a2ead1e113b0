//! Shared test utilities for integration tests
//!
//! Scripted provider adapters, a scheduler harness over a temporary data directory, and
//! serialized environment-variable setup for configuration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use promptline::config::SchedulerConfig;
use promptline::error::ProviderError;
use promptline::events::{EventEnvelope, Notification};
use promptline::provider::{
    Generation, GenerationRequest, ProviderAdapter, ProviderBackend, ProviderConfig,
    ProviderKind, ProviderRegistry, TokenUsage,
};
use promptline::store::ResponseStore;
use promptline::title::TitleGenerationConfig;
use promptline::types::JobId;
use promptline::Scheduler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Title requests start with this instruction; job prompts never do in these tests.
pub const TITLE_PROMPT_PREFIX: &str = "Write a descriptive title";

/// How the mock answers a call
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(ProviderError),
    /// Never answers on its own; only cancellation or a deadline ends the call
    Hang,
}

/// Scripted adapter that records call order and concurrency.
pub struct MockAdapter {
    name: String,
    model: String,
    job_reply: Reply,
    title_reply: Reply,
    job_delay: Duration,
    usage: Option<TokenUsage>,
    log: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockAdapter {
    pub fn new(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            job_reply: Reply::Text("Recursion is a function calling itself.".to_string()),
            title_reply: Reply::Text("\"Recursion In Short\"".to_string()),
            job_delay: Duration::ZERO,
            usage: Some(TokenUsage::new(5, 20)),
            log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_job_reply(mut self, reply: Reply) -> Self {
        self.job_reply = reply;
        self
    }

    pub fn with_title_reply(mut self, reply: Reply) -> Self {
        self.title_reply = reply;
        self
    }

    pub fn with_job_delay(mut self, delay: Duration) -> Self {
        self.job_delay = delay;
        self
    }

    /// Entries are `job:<prompt>` when a job call starts and `title` when a title call ends.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, reply: &Reply, cancel: &CancellationToken) -> Result<String, ProviderError> {
        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(error) => Err(error.clone()),
            Reply::Hang => {
                cancel.cancelled().await;
                Err(ProviderError::cancelled())
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn validate(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation, ProviderError> {
        if request.prompt.starts_with(TITLE_PROMPT_PREFIX) {
            let result = self.answer(&self.title_reply, cancel).await;
            self.log.lock().push("title".to_string());
            return result.map(|content| Generation {
                content,
                model: request.model,
                usage: None,
            });
        }

        self.log.lock().push(format!("job:{}", request.prompt));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = async {
            if !self.job_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ProviderError::cancelled()),
                    _ = tokio::time::sleep(self.job_delay) => {}
                }
            }
            self.answer(&self.job_reply, cancel).await
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result.map(|content| Generation {
            content,
            model: request.model,
            usage: self.usage,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec![self.model.clone()])
    }
}

pub fn local_profile(model: &str) -> ProviderConfig {
    ProviderConfig::new(ProviderBackend::Ollama { base_url: None }, model)
}

/// Scheduler over a temp data directory with `adapter` registered and active as "local".
pub struct Harness {
    pub scheduler: Scheduler,
    pub adapter: Arc<MockAdapter>,
    pub temp_dir: TempDir,
}

pub fn harness(adapter: MockAdapter) -> Harness {
    harness_with(adapter, local_profile("m1"), TitleGenerationConfig::default())
}

pub fn harness_with(
    adapter: MockAdapter,
    profile: ProviderConfig,
    titles: TitleGenerationConfig,
) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let store = ResponseStore::open(temp_dir.path()).unwrap();
    let adapter = Arc::new(adapter);

    let mut providers = ProviderRegistry::new();
    providers.insert_adapter("local".to_string(), profile, adapter.clone());
    providers.activate("local").unwrap();

    let scheduler = Scheduler::builder(Arc::new(store))
        .providers(providers)
        .title_config(titles)
        .settings(SchedulerConfig {
            progress_interval_ms: 50,
        })
        .build();

    Harness {
        scheduler,
        adapter,
        temp_dir,
    }
}

/// Wait for the given job's first `JobProgress` event. The job is current at that point,
/// but its adapter call may not have been polled yet; see [`wait_for_call`].
pub async fn wait_for_start(events: &mut broadcast::Receiver<EventEnvelope>, job_id: JobId) {
    loop {
        match events.recv().await {
            Ok(envelope) => {
                if let Notification::JobProgress { job_id: id, .. } = envelope.event {
                    if id == job_id {
                        return;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
        }
    }
}

/// Yield until the adapter has logged `entry`.
pub async fn wait_for_call(adapter: &MockAdapter, entry: &str) {
    while !adapter.log().iter().any(|e| e == entry) {
        tokio::task::yield_now().await;
    }
}

/// Everything already buffered on the receiver.
pub fn drain_events(events: &mut broadcast::Receiver<EventEnvelope>) -> Vec<Notification> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(envelope) => out.push(envelope.event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

const ENV_KEYS: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "PROMPTLINE_ENV",
    "PROMPTLINE__ACTIVE_PROVIDER",
    "PROMPTLINE__TITLES__TIMEOUT_SECS",
    "PROMPTLINE__TITLES__ENABLED",
];

/// Run `f` with `XDG_CONFIG_HOME` and `HOME` pointed into `test_dir`; the previous
/// environment is restored afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> = ENV_KEYS
        .iter()
        .map(|key| (*key, std::env::var(key).ok()))
        .collect();
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());

    let result = f();

    for (key, value) in saved {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    result
}
