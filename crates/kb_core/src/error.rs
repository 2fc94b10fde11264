use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("knowledge store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("knowledge entry {0} not found")]
    NotFound(u64),

    #[error("an active knowledge entry already uses intent '{0}'")]
    DuplicateIntent(String),

    #[error("invalid knowledge entry: {0}")]
    InvalidEntry(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl KbError {
    pub fn store_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for infrastructure failures that a request layer reports as 5xx.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. } | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
