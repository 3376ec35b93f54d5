//! HTTP client construction and response classification.

use crate::error::{TransferError, TransferResult};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;

/// Longest error body kept in a [`TransferError::Status`].
const MAX_ERROR_BODY: usize = 4096;

/// Build the shared HTTP client with the given request timeout.
pub fn build_http_client(timeout: Duration) -> TransferResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("launchpad/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Build the HTTP client using the timeout from the environment.
pub fn default_http_client() -> TransferResult<reqwest::Client> {
    build_http_client(launchpad_core::resolve_timeout())
}

/// Pass 2xx responses through and turn everything else into an error.
///
/// 429 and any response carrying `Retry-After` are tagged retryable; other
/// failures are terminal.
pub async fn classify_response(
    method: &str,
    response: reqwest::Response,
) -> TransferResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let has_retry_after = response.headers().contains_key(RETRY_AFTER);
    let retry_after = parse_retry_after(response.headers(), OffsetDateTime::now_utc());
    let mut body = response.text().await.unwrap_or_default();
    truncate_body(&mut body);

    let err = TransferError::Status {
        method: method.to_string(),
        url,
        status: status.as_u16(),
        body,
    };

    if status == StatusCode::TOO_MANY_REQUESTS || has_retry_after {
        Err(TransferError::retryable(err, retry_after))
    } else {
        Err(err)
    }
}

/// Read a `Retry-After` header as delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
    let wait = at - now;
    if wait.is_negative() {
        Some(Duration::ZERO)
    } else {
        Duration::try_from(wait).ok()
    }
}

fn truncate_body(body: &mut String) {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
}
