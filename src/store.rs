//! Response Store
//!
//! Hybrid persistence for generation outcomes: one metadata row (sled) plus one content
//! file per response. The file is always written before the row, so a row never points
//! at a file that did not exist when it was created. Files deleted later are hidden by
//! read-time filtering and removed for good by [`ResponseStore::reconcile`].

pub mod content;
pub mod metadata;

pub use content::{ContentDocument, ContentHeader, ContentStore};
pub use metadata::{MetadataStore, SledMetadataStore};

use crate::error::StorageError;
use crate::provider::TokenUsage;
use crate::types::ResponseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal outcome of a job as recorded on its row.
///
/// `Pending` is only ever found on rows left behind by an interrupted writer; startup
/// recovery turns those into `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Completed => "completed",
            ResponseStatus::Failed => "failed",
            ResponseStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleStatus {
    Pending,
    Completed,
    Failed,
}

impl TitleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TitleStatus::Pending => "pending",
            TitleStatus::Completed => "completed",
            TitleStatus::Failed => "failed",
        }
    }
}

/// Metadata row. Serialized with bincode for sled and as JSON in the content header,
/// so every field is always present (no skipped fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub id: ResponseId,
    pub prompt_id: String,
    pub prompt_name: String,
    pub provider: String,
    pub model: String,
    pub parameters: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub response_time_ms: u64,
    pub token_usage: Option<TokenUsage>,
    pub cost_estimate: Option<f64>,
    pub status: ResponseStatus,
    pub file_path: PathBuf,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub generated_title: Option<String>,
    pub title_generation_status: Option<TitleStatus>,
    pub title_generated_at: Option<DateTime<Utc>>,
    pub title_model: Option<String>,
}

/// Everything needed to persist one settled job
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub prompt_id: String,
    pub prompt_name: String,
    pub provider: String,
    pub model: String,
    pub parameters: BTreeMap<String, String>,
    /// Full substituted prompt, stored in the content header
    pub prompt: String,
    /// Model output, or the error text for failed and cancelled jobs
    pub body: String,
    pub status: ResponseStatus,
    pub response_time_ms: u64,
    pub token_usage: Option<TokenUsage>,
    pub cost_estimate: Option<f64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// A row joined with its content file
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseWithContent {
    pub metadata: ResponseMetadata,
    pub prompt: String,
    pub content: String,
}

/// Title fields written by the title generator
#[derive(Debug, Clone, PartialEq)]
pub struct TitleUpdate {
    pub status: TitleStatus,
    pub title: Option<String>,
    pub model: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl TitleUpdate {
    pub fn pending() -> Self {
        Self {
            status: TitleStatus::Pending,
            title: None,
            model: None,
            generated_at: None,
        }
    }

    pub fn completed(title: String, model: String) -> Self {
        Self {
            status: TitleStatus::Completed,
            title: Some(title),
            model: Some(model),
            generated_at: Some(Utc::now()),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TitleStatus::Failed,
            title: None,
            model: None,
            generated_at: None,
        }
    }

    fn apply(&self, row: &mut ResponseMetadata) {
        row.title_generation_status = Some(self.status);
        if let Some(title) = &self.title {
            row.generated_title = Some(title.clone());
        }
        if let Some(model) = &self.model {
            row.title_model = Some(model.clone());
        }
        if let Some(at) = self.generated_at {
            row.title_generated_at = Some(at);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub removed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub cancelled_rows: usize,
    pub failed_titles: usize,
}

/// Coordinates the metadata rows and content files.
pub struct ResponseStore {
    metadata: Arc<dyn MetadataStore>,
    content: ContentStore,
}

impl ResponseStore {
    pub fn new(metadata: Arc<dyn MetadataStore>, content: ContentStore) -> Self {
        Self { metadata, content }
    }

    /// Open the default layout under `data_dir`: `metadata/` (sled) and `responses/`.
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let metadata = SledMetadataStore::new(data_dir.join("metadata"))?;
        let content = ContentStore::new(data_dir.join("responses"))?;
        Ok(Self::new(Arc::new(metadata), content))
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content
    }

    /// Persist a settled job: content file first, then the row that references it.
    pub fn create(&self, new: NewResponse) -> Result<ResponseMetadata, StorageError> {
        let id = ResponseId::new();
        let file_path = self.content.path_for(&new.prompt_id, &id);
        let row = ResponseMetadata {
            id,
            prompt_id: new.prompt_id,
            prompt_name: new.prompt_name,
            provider: new.provider,
            model: new.model,
            parameters: new.parameters,
            created_at: Utc::now(),
            response_time_ms: new.response_time_ms,
            token_usage: new.token_usage,
            cost_estimate: new.cost_estimate,
            status: new.status,
            file_path,
            error_code: new.error_code,
            error_message: new.error_message,
            generated_title: None,
            title_generation_status: None,
            title_generated_at: None,
            title_model: None,
        };

        let document = ContentDocument {
            header: ContentHeader {
                metadata: row.clone(),
                prompt: new.prompt,
            },
            body: new.body,
        };
        self.content.write(&row.file_path, &document)?;
        if let Err(e) = self.metadata.put(&row) {
            if let Err(remove) = self.content.remove(&row.file_path) {
                warn!(response_id = %row.id, path = %row.file_path.display(), error = %remove, "Failed to remove content file after row write failed");
            }
            return Err(e);
        }

        debug!(
            response_id = %row.id,
            prompt_id = %row.prompt_id,
            status = row.status.as_str(),
            path = %row.file_path.display(),
            "Persisted response"
        );
        Ok(row)
    }

    /// Rows for a prompt, newest first, excluding rows whose content file is gone.
    pub fn list_responses(&self, prompt_id: &str) -> Result<Vec<ResponseMetadata>, StorageError> {
        let rows = self.metadata.list_for_prompt(prompt_id)?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                let present = row.file_path.exists();
                if !present {
                    debug!(response_id = %row.id, path = %row.file_path.display(), "Hiding response with missing content file");
                }
                present
            })
            .collect())
    }

    pub fn get_metadata(&self, id: &ResponseId) -> Result<Option<ResponseMetadata>, StorageError> {
        self.metadata.get(id)
    }

    /// Row plus prompt and body. A missing content file reads as not found.
    pub fn get_response(&self, id: &ResponseId) -> Result<ResponseWithContent, StorageError> {
        let row = self
            .metadata
            .get(id)?
            .ok_or(StorageError::ResponseNotFound(*id))?;
        if !row.file_path.exists() {
            return Err(StorageError::ResponseNotFound(*id));
        }
        let document = self.content.read(&row.file_path)?;
        Ok(ResponseWithContent {
            metadata: row,
            prompt: document.header.prompt,
            content: document.body,
        })
    }

    /// Remove the row, then the file (already-missing files are fine).
    pub fn delete(&self, id: &ResponseId) -> Result<bool, StorageError> {
        let Some(row) = self.metadata.remove(id)? else {
            return Ok(false);
        };
        if let Err(e) = self.content.remove(&row.file_path) {
            warn!(response_id = %id, path = %row.file_path.display(), error = %e, "Failed to remove content file");
        }
        Ok(true)
    }

    /// Delete every row (hidden orphans included) for a prompt. Returns the count.
    pub fn delete_all_for_prompt(&self, prompt_id: &str) -> Result<usize, StorageError> {
        let mut removed = 0;
        for row in self.metadata.list_for_prompt(prompt_id)? {
            if self.delete(&row.id)? {
                removed += 1;
            }
        }
        self.content.remove_prompt_dir_if_empty(prompt_id);
        info!(prompt_id = %prompt_id, removed, "Deleted responses for prompt");
        Ok(removed)
    }

    /// Merge title fields into the content header and the row.
    ///
    /// The body is carried over byte-for-byte. Last writer wins.
    pub fn update_title(
        &self,
        id: &ResponseId,
        update: &TitleUpdate,
    ) -> Result<ResponseMetadata, StorageError> {
        let mut row = self
            .metadata
            .get(id)?
            .ok_or(StorageError::ResponseNotFound(*id))?;
        update.apply(&mut row);

        self.rewrite_header(&row)?;
        self.metadata.put(&row)?;
        Ok(row)
    }

    /// Mark the title failed on the row even when the content header cannot be rewritten.
    pub fn fail_title(&self, id: &ResponseId) -> Result<ResponseMetadata, StorageError> {
        let mut row = self
            .metadata
            .get(id)?
            .ok_or(StorageError::ResponseNotFound(*id))?;
        TitleUpdate::failed().apply(&mut row);

        if let Err(e) = self.rewrite_header(&row) {
            debug!(response_id = %id, error = %e, "Marked title failed without rewriting content header");
        }
        self.metadata.put(&row)?;
        Ok(row)
    }

    fn rewrite_header(&self, row: &ResponseMetadata) -> Result<(), StorageError> {
        if !row.file_path.exists() {
            return Err(StorageError::ContentFileMissing(row.file_path.clone()));
        }
        let mut document = self.content.read(&row.file_path)?;
        document.header.metadata = row.clone();
        self.content.write(&row.file_path, &document)
    }

    /// Delete rows whose content file no longer exists.
    ///
    /// Per-entry failures are logged and counted; they never abort the sweep.
    pub fn reconcile(&self) -> Result<ReconcileReport, StorageError> {
        let mut report = ReconcileReport::default();
        for id in self.metadata.ids()? {
            let row = match self.metadata.get(&id) {
                Ok(Some(row)) => row,
                Ok(None) => continue,
                Err(e) => {
                    warn!(response_id = %id, error = %e, "Skipping unreadable row during reconciliation");
                    report.errors += 1;
                    continue;
                }
            };
            report.scanned += 1;
            if row.file_path.exists() {
                continue;
            }
            match self.metadata.remove(&id) {
                Ok(_) => {
                    info!(response_id = %id, path = %row.file_path.display(), "Removed orphaned response row");
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(response_id = %id, error = %e, "Failed to remove orphaned row");
                    report.errors += 1;
                }
            }
        }
        info!(
            scanned = report.scanned,
            removed = report.removed,
            errors = report.errors,
            "Reconciliation sweep finished"
        );
        Ok(report)
    }

    /// Settle rows left mid-flight by a previous process.
    pub fn recover_interrupted(&self) -> Result<RecoveryReport, StorageError> {
        let mut report = RecoveryReport::default();
        for id in self.metadata.ids()? {
            let mut row = match self.metadata.get(&id) {
                Ok(Some(row)) => row,
                Ok(None) => continue,
                Err(e) => {
                    warn!(response_id = %id, error = %e, "Skipping unreadable row during recovery");
                    continue;
                }
            };

            let mut changed = false;
            if row.status == ResponseStatus::Pending {
                row.status = ResponseStatus::Cancelled;
                row.error_code = Some("cancelled".to_string());
                row.error_message = Some("Interrupted before completion".to_string());
                report.cancelled_rows += 1;
                changed = true;
            }
            if row.title_generation_status == Some(TitleStatus::Pending) {
                row.title_generation_status = Some(TitleStatus::Failed);
                report.failed_titles += 1;
                changed = true;
            }
            if !changed {
                continue;
            }

            if let Err(e) = self.rewrite_header(&row) {
                debug!(response_id = %id, error = %e, "Recovered row without rewriting content header");
            }
            self.metadata.put(&row)?;
        }
        if report.cancelled_rows > 0 || report.failed_titles > 0 {
            info!(
                cancelled_rows = report.cancelled_rows,
                failed_titles = report.failed_titles,
                "Recovered interrupted responses"
            );
        }
        Ok(report)
    }
}
