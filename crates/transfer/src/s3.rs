//! Direct SigV4-signed PUT to object storage.

use crate::auth::SigV4Authenticator;
use crate::error::{TransferError, TransferResult};
use crate::http::classify_response;
use bytes::Bytes;
use launchpad_core::S3Credentials;
use std::path::Path;
use time::OffsetDateTime;
use tracing::instrument;
use url::Url;

/// Region the notary submission buckets live in.
pub const DEFAULT_S3_REGION: &str = "us-west-2";

/// Uploads a payload with temporary credentials, bypassing the API token.
///
/// Makes exactly one request per call. Callers that want retries wrap the
/// whole call in [`crate::retry::with_retry`].
#[derive(Clone, Debug)]
pub struct S3Uploader {
    client: reqwest::Client,
    region: String,
    endpoint: Option<Url>,
}

impl S3Uploader {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            region: DEFAULT_S3_REGION.to_string(),
            endpoint: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Send requests to `{endpoint}/{bucket}/{object}` instead of the
    /// virtual-hosted AWS URL.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Target URL for the credentials' bucket and object.
    pub fn object_url(&self, credentials: &S3Credentials) -> TransferResult<Url> {
        let object = credentials.object.trim_start_matches('/');
        let raw = match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.as_str().trim_end_matches('/'),
                credentials.bucket,
                object
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                credentials.bucket, self.region, object
            ),
        };
        Url::parse(&raw).map_err(|e| TransferError::InvalidRequest(format!("invalid object URL: {e}")))
    }

    /// PUT `body` to the object the credentials point at.
    #[instrument(skip(self, credentials, body), fields(bucket = %credentials.bucket, bytes = body.len()))]
    pub async fn upload(&self, credentials: &S3Credentials, body: Bytes) -> TransferResult<()> {
        self.upload_at(credentials, body, OffsetDateTime::now_utc())
            .await
    }

    /// Read a file and upload it.
    ///
    /// The whole file is held in memory, since the payload hash is part of
    /// the signature and must be known before the request starts. Sized for
    /// submission archives, not arbitrarily large files.
    pub async fn upload_file(
        &self,
        credentials: &S3Credentials,
        path: impl AsRef<Path>,
    ) -> TransferResult<()> {
        credentials.validate()?;
        let body = tokio::fs::read(path.as_ref()).await?;
        self.upload(credentials, Bytes::from(body)).await
    }

    async fn upload_at(
        &self,
        credentials: &S3Credentials,
        body: Bytes,
        now: OffsetDateTime,
    ) -> TransferResult<()> {
        // Credentials are checked before anything touches the network.
        let auth = SigV4Authenticator::new(credentials.clone(), self.region.clone())?;
        let url = self.object_url(credentials)?;

        let request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .build()?;
        let request = auth.authenticate_at(request, now)?;

        let response = self.client.execute(request).await?;
        classify_response("PUT", response).await?;
        tracing::debug!(object = %credentials.object, "object uploaded");
        Ok(())
    }
}
