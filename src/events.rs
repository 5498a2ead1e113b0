//! Notification schema and in-process broadcast bus.

use crate::queue::JobStatus;
use crate::store::TitleStatus;
use crate::types::{JobId, ResponseId};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    QueueSizeChanged {
        queue_size: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        added: Option<JobId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        removed: Option<JobId>,
    },
    JobProgress {
        job_id: JobId,
        status: JobStatus,
        elapsed_ms: u64,
    },
    JobCompleted {
        job_id: JobId,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_id: Option<ResponseId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    TitleStatusChanged {
        response_id: ResponseId,
        status: TitleStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub ts: String,
    pub event: Notification,
}

impl EventEnvelope {
    pub fn with_now(event: Notification) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        }
    }
}

/// Fan-out of notifications to any number of subscribers.
///
/// Emission never fails: with no subscribers the event is dropped, and a lagging
/// subscriber loses its oldest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: Notification) {
        let _ = self.sender.send(EventEnvelope::with_now(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
