use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable at '{path}': {reason}")]
    StorageUnavailable { path: String, reason: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Instance '{instance_id}' belongs to activity '{existing}', not '{requested}'")]
    InstanceConflict {
        instance_id: String,
        existing: String,
        requested: String,
    },

    #[error("Lock error: {0}")]
    LockError(String),
}

impl StoreError {
    pub fn storage(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
