//! Resilient transfers for launchpad.
//!
//! This crate provides:
//! - A retry engine with bounded, jittered exponential backoff
//! - Concurrent byte-range uploads with up-front range validation
//! - Streaming checksum computation and verification
//! - SigV4-signed direct uploads to object storage
//! - Bearer and SigV4 request authentication strategies

pub mod auth;
pub mod checksum;
pub mod error;
pub mod http;
pub mod retry;
pub mod s3;
pub mod upload;

pub use auth::{BearerAuthenticator, RequestAuthenticator, SigV4Authenticator};
pub use checksum::{
    compute_file_checksum, compute_file_checksums, compute_file_sha256, verify_file_checksums,
};
pub use error::{TransferError, TransferResult};
pub use http::{build_http_client, classify_response, default_http_client};
pub use retry::{with_retry, with_retry_rng};
pub use s3::S3Uploader;
pub use upload::{UploadExecutor, UploadReport};
