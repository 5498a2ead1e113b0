//! Content files
//!
//! One file per response at `<root>/<prompt dir>/<response id>.md`. The first line is a
//! compact JSON header, the second line is `---`, and everything after it is the body.

use crate::error::StorageError;
use crate::store::ResponseMetadata;
use crate::types::ResponseId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SEPARATOR: &str = "---";

/// Snapshot of the row at write time plus the full substituted prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentHeader {
    pub metadata: ResponseMetadata,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentDocument {
    pub header: ContentHeader,
    pub body: String,
}

impl ContentDocument {
    pub fn render(&self) -> Result<String, StorageError> {
        let header = serde_json::to_string(&self.header)?;
        let mut out = String::with_capacity(header.len() + self.body.len() + 8);
        out.push_str(&header);
        out.push('\n');
        out.push_str(SEPARATOR);
        out.push('\n');
        out.push_str(&self.body);
        Ok(out)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, StorageError> {
        let malformed = |reason: &str| StorageError::MalformedContentFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let (header_line, rest) = raw.split_once('\n').ok_or_else(|| malformed("missing header line"))?;
        let body = if rest == SEPARATOR {
            ""
        } else {
            rest.strip_prefix(SEPARATOR)
                .and_then(|r| r.strip_prefix('\n'))
                .ok_or_else(|| malformed("missing header separator"))?
        };
        let header: ContentHeader = serde_json::from_str(header_line)
            .map_err(|e| malformed(&format!("invalid header: {}", e)))?;

        Ok(Self {
            header,
            body: body.to_string(),
        })
    }
}

/// Directory of content files
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, prompt_id: &str, id: &ResponseId) -> PathBuf {
        self.root
            .join(sanitize_component(prompt_id))
            .join(format!("{}.md", id))
    }

    /// Write via a sibling temp file and rename, so readers never see a partial file.
    pub fn write(&self, path: &Path, document: &ContentDocument) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = document.render()?;
        let tmp = path.with_extension("md.tmp");
        fs::write(&tmp, rendered.as_bytes())?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn read(&self, path: &Path) -> Result<ContentDocument, StorageError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ContentFileMissing(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        ContentDocument::parse(path, &raw)
    }

    /// Returns whether a file was removed; a missing file is not an error.
    pub fn remove(&self, path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove_prompt_dir_if_empty(&self, prompt_id: &str) {
        // remove_dir refuses non-empty directories
        let _ = fs::remove_dir(self.root.join(sanitize_component(prompt_id)));
    }
}

/// Map a prompt id onto a single safe path component.
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}
