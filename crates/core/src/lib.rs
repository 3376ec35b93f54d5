//! Core domain types and shared logic for launchpad transfers.
//!
//! This crate defines the data model used across the other crates:
//! - Byte-range upload operations and their validation
//! - Checksums and incremental digests
//! - Notary submissions and temporary storage credentials
//! - Retry and timeout configuration

pub mod checksum;
pub mod config;
pub mod error;
pub mod notary;
pub mod upload;

pub use checksum::{Checksum, ChecksumAlgorithm, ChecksumHasher, Checksums};
pub use config::{RetryPolicy, parse_duration, resolve_timeout};
pub use error::{Error, Result};
pub use notary::{NotarySubmissionRequest, NotarySubmissionStatus, S3Credentials};
pub use upload::{HttpHeader, UploadOperation, validate_operations};

/// Read block size for streaming digests and file slices: 64 KiB
pub const READ_BLOCK_SIZE: usize = 64 * 1024;
