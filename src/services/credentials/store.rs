use std::path::{Path, PathBuf};

use crate::services::state::store::{read_json, remove_if_exists, write_json_atomic};

use super::types::{CredentialError, TokenMaterial};

/// The token file. Re-read on every use so that changes made by another
/// process (a new authorization, a logout) are picked up without coordination.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<TokenMaterial>, CredentialError> {
        read_json(&self.path).map_err(|e| {
            CredentialError::Storage(format!("could not load {}: {}", self.path.display(), e))
        })
    }

    pub fn save(&self, material: &TokenMaterial) -> Result<(), CredentialError> {
        write_json_atomic(&self.path, material).map_err(|e| {
            CredentialError::Storage(format!("could not save {}: {}", self.path.display(), e))
        })
    }

    /// `Ok(false)` if there was nothing to remove.
    pub fn remove(&self) -> Result<bool, CredentialError> {
        remove_if_exists(&self.path).map_err(|e| {
            CredentialError::Storage(format!("could not remove {}: {}", self.path.display(), e))
        })
    }
}
