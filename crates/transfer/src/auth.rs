//! Request authentication strategies.
//!
//! API calls carry a bearer token; object-storage calls are SigV4 signed.
//! The two never mix, so each endpoint family picks its own strategy.

use crate::error::{TransferError, TransferResult};
use launchpad_core::S3Credentials;
use launchpad_signer::sigv4::{X_AMZ_CONTENT_SHA256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN};
use launchpad_signer::{SigningContext, TokenCache, UnsignedRequest, sha256_hex};
use reqwest::header::{AUTHORIZATION, HOST, HeaderName, HeaderValue};
use std::sync::Arc;
use time::OffsetDateTime;

/// Attaches credentials to an outgoing request.
pub trait RequestAuthenticator: Send + Sync {
    fn authenticate(&self, request: reqwest::Request) -> TransferResult<reqwest::Request>;
}

/// Bearer-token authentication for the API host.
#[derive(Clone, Debug)]
pub struct BearerAuthenticator {
    tokens: Arc<TokenCache>,
}

impl BearerAuthenticator {
    pub fn new(tokens: Arc<TokenCache>) -> Self {
        Self { tokens }
    }
}

impl RequestAuthenticator for BearerAuthenticator {
    fn authenticate(&self, mut request: reqwest::Request) -> TransferResult<reqwest::Request> {
        let token = self.tokens.token()?;
        let value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }
}

/// SigV4 authentication with temporary object-storage credentials.
#[derive(Clone, Debug)]
pub struct SigV4Authenticator {
    credentials: S3Credentials,
    region: String,
    service: String,
}

impl SigV4Authenticator {
    pub fn new(credentials: S3Credentials, region: impl Into<String>) -> TransferResult<Self> {
        credentials.validate()?;
        Ok(Self {
            credentials,
            region: region.into(),
            service: "s3".to_string(),
        })
    }

    /// Sign as of an explicit time.
    pub fn authenticate_at(
        &self,
        mut request: reqwest::Request,
        now: OffsetDateTime,
    ) -> TransferResult<reqwest::Request> {
        let payload = match request.body() {
            None => Vec::new(),
            Some(body) => body
                .as_bytes()
                .ok_or_else(|| {
                    TransferError::InvalidRequest("streaming bodies cannot be signed".to_string())
                })?
                .to_vec(),
        };
        let payload_hash = sha256_hex(&payload);
        let context = SigningContext::derive(
            &self.credentials.secret_access_key,
            now,
            &self.region,
            &self.service,
        )?;

        let url = request.url();
        let host = match url.port() {
            Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        // The signer encodes each segment itself; start from the raw path.
        let path = urlencoding::decode(url.path())
            .map_err(|e| TransferError::InvalidRequest(format!("invalid object path: {e}")))?
            .into_owned();

        let mut unsigned = UnsignedRequest::new(request.method().as_str(), path)
            .header("host", host.clone())
            .header(X_AMZ_CONTENT_SHA256, payload_hash.clone())
            .header(X_AMZ_DATE, context.amz_date())
            .header(X_AMZ_SECURITY_TOKEN, self.credentials.session_token.clone())
            .payload_hash(payload_hash.clone());
        for (name, value) in url.query_pairs() {
            unsigned = unsigned.query(name.into_owned(), value.into_owned());
        }

        let signed = unsigned
            .canonicalize()
            .sign(&context, &self.credentials.access_key_id);

        let headers = request.headers_mut();
        insert(headers, HOST, &host)?;
        insert(headers, HeaderName::from_static(X_AMZ_DATE), context.amz_date())?;
        insert(headers, HeaderName::from_static(X_AMZ_CONTENT_SHA256), &payload_hash)?;
        insert(
            headers,
            HeaderName::from_static(X_AMZ_SECURITY_TOKEN),
            &self.credentials.session_token,
        )?;
        insert(headers, AUTHORIZATION, signed.authorization())?;
        Ok(request)
    }
}

impl RequestAuthenticator for SigV4Authenticator {
    fn authenticate(&self, request: reqwest::Request) -> TransferResult<reqwest::Request> {
        self.authenticate_at(request, OffsetDateTime::now_utc())
    }
}

fn insert(
    headers: &mut reqwest::header::HeaderMap,
    name: HeaderName,
    value: &str,
) -> TransferResult<()> {
    let value =
        HeaderValue::from_str(value).map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}
