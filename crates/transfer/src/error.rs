//! Transfer error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while moving bytes to the API or object storage.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Core(#[from] launchpad_core::Error),

    #[error(transparent)]
    Signer(#[from] launchpad_signer::SignerError),

    /// A transient failure the retry engine may try again.
    #[error("{source}")]
    Retryable {
        /// Wait the server asked for, honored exactly when present.
        retry_after: Option<Duration>,
        source: Box<TransferError>,
    },

    #[error("retry limit exceeded after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        source: Box<TransferError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("upload operation {index} failed: {source}")]
    Operation {
        index: usize,
        source: Box<TransferError>,
    },

    #[error("{method} {url} failed with status {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransferError {
    /// Mark an error as transient.
    pub fn retryable(source: TransferError, retry_after: Option<Duration>) -> Self {
        Self::Retryable {
            retry_after,
            source: Box::new(source),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Server-provided wait hint, if this error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Retryable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Strip the retryable tag, returning the underlying error.
    pub fn into_inner(self) -> TransferError {
        match self {
            Self::Retryable { source, .. } => *source,
            other => other,
        }
    }

    /// HTTP status code of the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Retryable { source, .. }
            | Self::RetryExhausted { source, .. }
            | Self::Operation { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Result type for transfer operations.
pub type TransferResult<T> = std::result::Result<T, TransferError>;
