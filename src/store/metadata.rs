//! Metadata rows for responses, backed by sled.

use crate::error::StorageError;
use crate::store::ResponseMetadata;
use crate::types::ResponseId;
use std::path::Path;
use tracing::debug;

const ROWS_TREE: &str = "responses";
const BY_PROMPT_TREE: &str = "by_prompt";

/// Row storage interface
pub trait MetadataStore: Send + Sync {
    fn get(&self, id: &ResponseId) -> Result<Option<ResponseMetadata>, StorageError>;

    /// Insert or replace a row
    fn put(&self, row: &ResponseMetadata) -> Result<(), StorageError>;

    /// Remove a row, returning it if it existed
    fn remove(&self, id: &ResponseId) -> Result<Option<ResponseMetadata>, StorageError>;

    /// Rows for one prompt, newest first. No file existence check.
    fn list_for_prompt(&self, prompt_id: &str) -> Result<Vec<ResponseMetadata>, StorageError>;

    /// Every row id, for sweeps that must tolerate individual bad rows
    fn ids(&self) -> Result<Vec<ResponseId>, StorageError>;
}

/// Sled-based implementation of MetadataStore
///
/// Rows live in the `responses` tree keyed by the raw response id. The `by_prompt`
/// tree indexes them as `prompt_id \0 created_millis \0 response_id`, with the
/// timestamp zero-padded so a reverse prefix scan yields newest first.
pub struct SledMetadataStore {
    db: sled::Db,
    rows: sled::Tree,
    by_prompt: sled::Tree,
}

impl SledMetadataStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let rows = db.open_tree(ROWS_TREE)?;
        let by_prompt = db.open_tree(BY_PROMPT_TREE)?;
        Ok(Self { db, rows, by_prompt })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn index_key(row: &ResponseMetadata) -> Vec<u8> {
        let millis = row.created_at.timestamp_millis().max(0) as u64;
        format!("{}\0{:020}\0{}", row.prompt_id, millis, row.id).into_bytes()
    }

    fn prompt_prefix(prompt_id: &str) -> Vec<u8> {
        format!("{}\0", prompt_id).into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<ResponseMetadata, StorageError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl MetadataStore for SledMetadataStore {
    fn get(&self, id: &ResponseId) -> Result<Option<ResponseMetadata>, StorageError> {
        match self.rows.get(id.as_bytes())? {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn put(&self, row: &ResponseMetadata) -> Result<(), StorageError> {
        let value = bincode::serialize(row)?;
        let previous = self.rows.insert(row.id.as_bytes(), value)?;

        // Re-keyed rows must not leave a stale index entry behind
        if let Some(previous) = previous {
            if let Ok(previous) = Self::decode(&previous) {
                let old_key = Self::index_key(&previous);
                if old_key != Self::index_key(row) {
                    self.by_prompt.remove(old_key)?;
                }
            }
        }
        self.by_prompt
            .insert(Self::index_key(row), row.id.as_bytes().as_slice())?;
        Ok(())
    }

    fn remove(&self, id: &ResponseId) -> Result<Option<ResponseMetadata>, StorageError> {
        let Some(value) = self.rows.remove(id.as_bytes())? else {
            return Ok(None);
        };
        let row = Self::decode(&value)?;
        self.by_prompt.remove(Self::index_key(&row))?;
        Ok(Some(row))
    }

    fn list_for_prompt(&self, prompt_id: &str) -> Result<Vec<ResponseMetadata>, StorageError> {
        let mut rows = Vec::new();
        for item in self.by_prompt.scan_prefix(Self::prompt_prefix(prompt_id)).rev() {
            let (key, value) = item?;
            let Some(id) = ResponseId::from_slice(&value) else {
                debug!(key = ?key, "Skipping index entry with invalid response id");
                continue;
            };
            match self.get(&id)? {
                Some(row) => rows.push(row),
                None => debug!(response_id = %id, "Skipping index entry without a row"),
            }
        }
        Ok(rows)
    }

    fn ids(&self) -> Result<Vec<ResponseId>, StorageError> {
        let mut ids = Vec::new();
        for key in self.rows.iter().keys() {
            if let Some(id) = ResponseId::from_slice(&key?) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
