//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "upload operation {index} range [{offset}, {offset}+{length}) exceeds file size {file_size}"
    )]
    InvalidRange {
        index: usize,
        offset: u64,
        length: u64,
        file_size: u64,
    },

    #[error("checksum mismatch for {slot}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        slot: String,
        expected: String,
        actual: String,
    },

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("incomplete storage credentials: missing {0}")]
    IncompleteCredentials(&'static str),

    #[error("invalid upload operation: {0}")]
    InvalidOperation(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
