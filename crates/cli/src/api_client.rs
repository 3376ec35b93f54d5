use anyhow::{Context, Result};
use launchpad_core::RetryPolicy;
use launchpad_core::notary::{
    NOTARY_SUBMISSIONS_PATH, NotarySubmissionLogsResponse, NotarySubmissionRequest,
    NotarySubmissionResponse, NotarySubmissionStatusResponse, NotarySubmissionsListResponse,
};
use launchpad_transfer::{
    BearerAuthenticator, RequestAuthenticator, TransferResult, classify_response, with_retry,
};
use reqwest::{Method, Url};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: BearerAuthenticator,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: &str, auth: BearerAuthenticator) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid API base URL")?;
        Ok(Self {
            http,
            base_url,
            auth,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build `{base}{path}/{segments...}`, escaping each segment.
    fn url(&self, path: &str, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.join(path).context("failed to build API URL")?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| anyhow::anyhow!("API base URL cannot have a path"))?
                .pop_if_empty()
                .extend(segments);
        }
        Ok(url)
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> TransferResult<reqwest::Response> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }
        // Signed on every attempt so a retry never carries a stale token.
        let request = self.auth.authenticate(request.build()?)?;
        let response = self.http.execute(request).await?;
        classify_response(method.as_str(), response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T> {
        let response = with_retry(&self.retry, &self.cancel, || {
            self.attempt(&method, &url, body.as_deref())
        })
        .await
        .with_context(|| format!("{method} {url} failed"))?;

        let body = response.text().await.context("failed to read API response")?;
        serde_json::from_str(&body).with_context(|| format!("unexpected response from {url}"))
    }

    fn encode<B: Serialize>(body: &B) -> Result<Vec<u8>> {
        serde_json::to_vec(body).context("failed to encode request body")
    }

    /// Open a submission and receive upload credentials for it.
    pub async fn submit_notarization(
        &self,
        req: &NotarySubmissionRequest,
    ) -> Result<NotarySubmissionResponse> {
        req.validate().context("invalid notarization request")?;
        let url = self.url(NOTARY_SUBMISSIONS_PATH, &[])?;
        self.send_json(Method::POST, url, Some(Self::encode(req)?))
            .await
    }

    pub async fn notarization_status(&self, id: &str) -> Result<NotarySubmissionStatusResponse> {
        let id = require_id(id)?;
        let url = self.url(NOTARY_SUBMISSIONS_PATH, &[id])?;
        self.send_json(Method::GET, url, None).await
    }

    pub async fn notarization_logs(&self, id: &str) -> Result<NotarySubmissionLogsResponse> {
        let id = require_id(id)?;
        let url = self.url(NOTARY_SUBMISSIONS_PATH, &[id, "logs"])?;
        self.send_json(Method::GET, url, None).await
    }

    pub async fn list_notarizations(&self) -> Result<NotarySubmissionsListResponse> {
        let url = self.url(NOTARY_SUBMISSIONS_PATH, &[])?;
        self.send_json(Method::GET, url, None).await
    }
}

fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        anyhow::bail!("submission ID is required");
    }
    Ok(id)
}
