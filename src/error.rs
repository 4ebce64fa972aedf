//! Error types for the pool reconciler

use std::time::Duration;

use thiserror::Error;

use crate::entitlements::PartialConvergence;
use crate::validate::Violations;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid pool configuration: {0}")]
    Configuration(Violations),

    #[error("remote service rejected the request (HTTP {status}): {message}")]
    RemoteRejection { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    PartialConvergence(Box<PartialConvergence>),

    #[error("pool must be replaced, immutable fields changed: {}", .0.join(", "))]
    RequiresReplacement(Vec<&'static str>),

    #[error("pool {id} was written but could not be read back: {source}")]
    ReadBack {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the remote side reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether re-running the same operation later could succeed without
    /// changing the declaration.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Timeout(_) | Error::Cancelled => true,
            Error::PartialConvergence(partial) => partial
                .cause
                .as_ref()
                .is_some_and(|cause| cause.is_retryable()),
            Error::ReadBack { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn rejection(status: u16, message: impl Into<String>) -> Self {
        Error::RemoteRejection {
            status,
            message: message.into(),
        }
    }
}

impl From<PartialConvergence> for Error {
    fn from(partial: PartialConvergence) -> Self {
        Error::PartialConvergence(Box::new(partial))
    }
}
