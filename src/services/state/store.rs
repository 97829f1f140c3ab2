use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use super::snapshot::StateSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where each poll cycle's snapshot goes.
pub trait SnapshotSink: Send + Sync {
    fn write(&self, snapshot: &StateSnapshot) -> Result<(), StoreError>;
}

/// What a reader found in the state slot.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredState {
    /// The producer has never written (or its store was torn down).
    Missing,
    /// A record exists but could not be parsed.
    Unreadable(String),
    Present(StateSnapshot),
}

impl StoredState {
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    pub fn snapshot(&self) -> Option<&StateSnapshot> {
        match self {
            Self::Present(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// The error a viewer-facing reader should report for this slot, if any.
    pub fn error(&self) -> Option<String> {
        match self {
            Self::Missing => Some("producer not running".to_string()),
            Self::Unreadable(reason) => Some(format!("Error reading state: {}", reason)),
            Self::Present(snapshot) => snapshot.error.clone(),
        }
    }
}

/// Single-slot durable record, replaced atomically on every write.
///
/// Writes go to a temp file in the same directory which is then renamed over
/// the canonical path, so a concurrent reader sees either the old record or
/// the new one, never a partial one.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory if needed.
    pub fn prepare(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn read(&self) -> StoredState {
        match read_json::<StateSnapshot>(&self.path) {
            Ok(Some(snapshot)) => StoredState::Present(snapshot),
            Ok(None) => StoredState::Missing,
            Err(e) => {
                tracing::warn!("Could not read state file {}: {}", self.path.display(), e);
                StoredState::Unreadable(e.to_string())
            }
        }
    }
}

impl SnapshotSink for StateStore {
    fn write(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        write_json_atomic(&self.path, snapshot)
    }
}

/// Serialize `value` to `path` through a same-directory temp file and rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Remove `path`; `Ok(false)` if it was already gone.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
