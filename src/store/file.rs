//! JSON-file-backed answer store.
//!
//! The file holds the flat `AnswerRecord` object. It is rewritten
//! atomically (temp file + rename) after every write, so a crash never
//! leaves a half-written record behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::error::StoreError;

use super::traits::{AnswerRecord, AnswerStore};

/// Answer store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    record: AnswerRecord,
}

impl FileStore {
    /// Open the store at `path`, loading any previous record.
    ///
    /// A missing file starts empty. A malformed file also starts empty and
    /// is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with_ttl(path, None)
    }

    /// Like [`FileStore::open`], but a file last written more than `ttl`
    /// ago is treated as an expired session and ignored.
    pub fn open_with_ttl(path: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        let path = path.into();
        let record = match load(&path, ttl) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable answer store");
                AnswerRecord::new()
            }
        };
        tracing::debug!(path = %path.display(), entries = record.len(), "Answer store opened");
        Self { path, record }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current record to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&self.record)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        atomic_write(&self.path, &bytes).map_err(|e| io_error(&self.path, e))
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist answer store");
        }
    }
}

impl AnswerStore for FileStore {
    fn read(&self, key: &str) -> Option<Value> {
        self.record.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: Value) {
        if self.record.get(key) == Some(&value) {
            return;
        }
        self.record.insert(key.to_string(), value);
        tracing::debug!(store_key = %key, "Answer written");
        self.persist();
    }

    fn reset(&mut self) {
        self.record.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "Answer store reset"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove answer store")
            }
        }
    }

    fn record(&self) -> &AnswerRecord {
        &self.record
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn load(path: &Path, ttl: Option<Duration>) -> Result<AnswerRecord, StoreError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AnswerRecord::new()),
        Err(e) => return Err(io_error(path, e)),
    };

    if let Some(ttl) = ttl
        && let Ok(modified) = metadata.modified()
        && modified.elapsed().is_ok_and(|age| age > ttl)
    {
        tracing::info!(path = %path.display(), ttl_secs = ttl.as_secs(), "Answer store expired");
        return Ok(AnswerRecord::new());
    }

    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name().and_then(|v| v.to_str()).unwrap_or("answers"),
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    let tmp_path = path.with_file_name(tmp_name);

    let result = write_then_rename(&tmp_path, path, content);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_then_rename(tmp_path: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
}
