//! Job Queue
//!
//! In-memory FIFO of submitted jobs. The queue is not thread-safe on its own: the
//! scheduler owns it behind a single mutex together with the current-job pointer, so
//! every mutation happens under one guard.

use crate::types::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Lifecycle of a job. Only the scheduler moves a job between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// What a caller submits. `content` is the already-substituted prompt text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub prompt_id: String,
    pub prompt_name: String,
    pub content: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Profile name; defaults to the active provider
    #[serde(default)]
    pub provider: Option<String>,
    /// Defaults to the profile's model
    #[serde(default)]
    pub model: Option<String>,
}

impl JobSpec {
    pub fn new(prompt_id: impl Into<String>, content: impl Into<String>) -> Self {
        let prompt_id = prompt_id.into();
        Self {
            prompt_name: prompt_id.clone(),
            prompt_id,
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// A queued request with its provider and model resolved at submission time
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub prompt_id: String,
    pub prompt_name: String,
    pub content: String,
    pub parameters: BTreeMap<String, String>,
    pub provider: String,
    pub model: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn from_spec(spec: JobSpec, provider: String, model: String) -> Self {
        Self {
            id: JobId::new(),
            prompt_id: spec.prompt_id,
            prompt_name: spec.prompt_name,
            content: spec.content,
            parameters: spec.parameters,
            provider,
            model,
            status: JobStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Strict FIFO, no deduplication. `remove` is the only out-of-order operation.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn dequeue(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Remove a not-yet-started job. Returns whether it was queued.
    pub fn remove(&mut self, id: JobId) -> bool {
        match self.jobs.iter().position(|job| job.id == id) {
            Some(index) => self.jobs.remove(index).is_some(),
            None => false,
        }
    }

    /// Drop every queued job, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let count = self.jobs.len();
        self.jobs.clear();
        count
    }

    pub fn peek(&self) -> Option<&Job> {
        self.jobs.front()
    }

    pub fn size(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn has(&self, id: JobId) -> bool {
        self.jobs.iter().any(|job| job.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}
