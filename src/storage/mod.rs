//! History persistence -- a single pretty-printed JSON document.

pub mod schema;

pub use self::schema::{HistoryDocument, ObservationRecord, ProbeStatus, PARSE_ERROR_MESSAGE};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write history file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where the history document lives.
pub trait HistoryStore: Send + Sync {
    /// Best-effort read. A missing or unreadable store yields an empty
    /// document instead of an error.
    fn load(&self) -> HistoryDocument;

    /// Replace the stored document with `doc`.
    fn save(&self, doc: &HistoryDocument) -> Result<(), StoreError>;
}

/// [`HistoryStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling that keeps an unreadable history file out of harm's way.
    pub fn corrupt_path(&self) -> PathBuf {
        sibling(&self.path, "corrupt")
    }

    fn preserve_corrupt(&self) {
        let backup = self.corrupt_path();
        match std::fs::copy(&self.path, &backup) {
            Ok(_) => warn!(backup = %backup.display(), "unreadable history preserved"),
            Err(e) => warn!(backup = %backup.display(), error = %e, "could not preserve unreadable history"),
        }
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> HistoryDocument {
        // Raw bytes, so invalid UTF-8 lands on the corrupt path below.
        let content = match std::fs::read(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no history yet, starting fresh");
                return HistoryDocument::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history unreadable, starting fresh");
                self.preserve_corrupt();
                return HistoryDocument::default();
            }
        };

        match serde_json::from_slice::<HistoryDocument>(&content) {
            Ok(doc) => {
                debug!(path = %self.path.display(), records = doc.len(), "history loaded");
                doc
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history is not valid, starting fresh");
                self.preserve_corrupt();
                HistoryDocument::default()
            }
        }
    }

    fn save(&self, doc: &HistoryDocument) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(doc)?;

        // Write next to the target and rename over it, so a failed write
        // never leaves a truncated history behind.
        let temp = sibling(&self.path, "tmp");
        if let Err(e) = std::fs::write(&temp, content) {
            let _ = std::fs::remove_file(&temp);
            return Err(io_err(e));
        }
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(io_err(e));
        }

        debug!(path = %self.path.display(), records = doc.len(), "history saved");
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
