use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::ClipOperation;

#[derive(Error, Debug)]
pub enum AutoShortsError {
    #[error("{0}")]
    Validation(String),

    /// The server answered but declined the request.
    #[error("{0}")]
    Rejected(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Upload failed for {path}: {reason}")]
    UploadFailed { path: PathBuf, reason: String },

    #[error("API returned {status} for {endpoint}: {detail}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        detail: String,
    },

    #[error("No clips were generated.")]
    NoClips,

    #[error("{operation} failed for clip {index}: {reason}")]
    ClipOperationFailed {
        operation: ClipOperation,
        index: usize,
        reason: String,
    },

    #[error("Cannot derive file id from clip url {url}")]
    ClipIdentity { url: String },

    #[error("No clip at index {index} ({len} clips in session)")]
    ClipNotFound { index: usize, len: usize },

    #[error("A {0} request is already in flight")]
    Busy(&'static str),

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Results were reset before the {0} response arrived")]
    Superseded(ClipOperation),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AutoShortsError {
    /// Failures raised before any request left the client.
    pub fn is_validation(&self) -> bool {
        matches!(self, AutoShortsError::Validation(_))
    }

    /// Short text for a notice: the server's own detail when there is one.
    pub fn user_message(&self) -> String {
        match self {
            AutoShortsError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AutoShortsError>;
