//! Concurrent byte-range uploads of a single file.

use crate::error::{TransferError, TransferResult};
use crate::http::classify_response;
use crate::retry::with_retry;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use launchpad_core::{RetryPolicy, UploadOperation, validate_operations};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Operations in flight when no concurrency is configured.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Outcome of a successful upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub operations: usize,
    pub bytes_sent: u64,
}

/// Sends the byte ranges of a file to the URLs the API handed out.
#[derive(Clone, Debug)]
pub struct UploadExecutor {
    client: reqwest::Client,
    concurrency: usize,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl UploadExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            retry: RetryPolicy::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    /// Maximum operations in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Retry policy applied to each operation independently.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Upload every operation's slice of `path`.
    ///
    /// All ranges are checked against the file size before any request is
    /// made. Once started, every operation runs to completion; the first
    /// failure observed is returned as [`TransferError::Operation`].
    #[instrument(skip(self, operations), fields(path = %path.display(), operations = operations.len()))]
    pub async fn execute(
        &self,
        path: &Path,
        operations: &[UploadOperation],
    ) -> TransferResult<UploadReport> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidRequest(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        validate_operations(operations, metadata.len())?;

        let mut pending = operations.iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut report = UploadReport::default();
        let mut first_failure: Option<(usize, TransferError)> = None;

        loop {
            while in_flight.len() < self.concurrency {
                let Some((index, operation)) = pending.next() else {
                    break;
                };
                in_flight.push(async move { (index, self.run_operation(path, index, operation).await) });
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };
            match result {
                Ok(sent) => {
                    report.operations += 1;
                    report.bytes_sent += sent;
                }
                Err(err) => {
                    tracing::warn!(index, error = %err, "upload operation failed");
                    if first_failure.is_none() {
                        first_failure = Some((index, err));
                    }
                }
            }
        }

        if let Some((index, err)) = first_failure {
            if err.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            return Err(TransferError::Operation {
                index,
                source: Box::new(err),
            });
        }

        tracing::debug!(
            operations = report.operations,
            bytes = report.bytes_sent,
            "upload complete"
        );
        Ok(report)
    }

    async fn run_operation(
        &self,
        path: &Path,
        index: usize,
        operation: &UploadOperation,
    ) -> TransferResult<u64> {
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let body = read_slice(path, operation.offset, operation.length).await?;
        let method = reqwest::Method::from_bytes(operation.effective_method().as_bytes())
            .map_err(|e| TransferError::InvalidRequest(format!("operation {index}: {e}")))?;

        with_retry(&self.retry, &self.cancel, || {
            self.send_once(method.clone(), operation, body.clone())
        })
        .await?;

        tracing::trace!(index, url = %operation.url, bytes = operation.length, "operation uploaded");
        Ok(operation.length)
    }

    async fn send_once(
        &self,
        method: reqwest::Method,
        operation: &UploadOperation,
        body: Bytes,
    ) -> TransferResult<()> {
        let mut request = self
            .client
            .request(method.clone(), &operation.url)
            .body(body);
        for header in operation.headers() {
            request = request.header(header.name.trim(), &header.value);
        }

        let response = request.send().await?;
        classify_response(method.as_str(), response).await?;
        Ok(())
    }
}

/// Read exactly `length` bytes at `offset` through a fresh handle.
async fn read_slice(path: &Path, offset: u64, length: u64) -> TransferResult<Bytes> {
    let length = usize::try_from(length).map_err(|_| {
        TransferError::InvalidRequest("operation length exceeds platform limits".to_string())
    })?;
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    let mut data = vec![0u8; length];
    file.read_exact(&mut data).await?;
    Ok(Bytes::from(data))
}
