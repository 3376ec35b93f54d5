//! AWS Signature Version 4 request signing.
//!
//! Signing walks a fixed sequence of states:
//!
//! ```text
//! UnsignedRequest --canonicalize--> CanonicalRequest --sign(SigningContext)--> SignedRequest
//! ```
//!
//! The [`SigningContext`] carries the derived signing key and is only valid
//! for the date, region and service it was derived for.

use crate::error::{SignerError, SignerResult};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

type HmacSha256 = Hmac<Sha256>;

/// Algorithm identifier used in the string to sign and Authorization header.
pub const AWS4_HMAC_SHA256: &str = "AWS4-HMAC-SHA256";

/// Terminator of the credential scope.
pub const AWS4_REQUEST: &str = "aws4_request";

/// Header carrying the request timestamp.
pub const X_AMZ_DATE: &str = "x-amz-date";

/// Header carrying the payload hash.
pub const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";

/// Header carrying the temporary session token.
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

const AMZ_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");
const DATE_STAMP_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]");

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key for a date stamp (`YYYYMMDD`), region and service.
///
/// kDate = HMAC("AWS4" + secret, date)
/// kRegion = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
pub fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_secret = format!("AWS4{secret}");
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, AWS4_REQUEST.as_bytes())
}

/// Per-request signing state derived from a secret and the current time.
#[derive(Clone)]
pub struct SigningContext {
    amz_date: String,
    date_stamp: String,
    region: String,
    service: String,
    signing_key: Vec<u8>,
}

impl SigningContext {
    pub fn derive(
        secret: &str,
        now: OffsetDateTime,
        region: &str,
        service: &str,
    ) -> SignerResult<Self> {
        if region.is_empty() || service.is_empty() {
            return Err(SignerError::InvalidInput(
                "region and service are required".to_string(),
            ));
        }
        let now = now.to_offset(UtcOffset::UTC);
        let amz_date = now
            .format(AMZ_DATE_FORMAT)
            .map_err(|e| SignerError::InvalidInput(e.to_string()))?;
        let date_stamp = now
            .format(DATE_STAMP_FORMAT)
            .map_err(|e| SignerError::InvalidInput(e.to_string()))?;
        let signing_key = derive_signing_key(secret, &date_stamp, region, service);

        Ok(Self {
            amz_date,
            date_stamp,
            region: region.to_string(),
            service: service.to_string(),
            signing_key,
        })
    }

    /// Timestamp in `YYYYMMDDTHHMMSSZ` form.
    pub fn amz_date(&self) -> &str {
        &self.amz_date
    }

    pub fn date_stamp(&self) -> &str {
        &self.date_stamp
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// `date/region/service/aws4_request`
    pub fn scope(&self) -> String {
        format!(
            "{}/{}/{}/{AWS4_REQUEST}",
            self.date_stamp, self.region, self.service
        )
    }

    pub fn signing_key(&self) -> &[u8] {
        &self.signing_key
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("amz_date", &self.amz_date)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

/// Request parts that take part in the signature.
#[derive(Clone, Debug)]
pub struct UnsignedRequest {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    payload_hash: String,
}

impl UnsignedRequest {
    /// Start a request. `path` is the raw, unencoded object path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            payload_hash: sha256_hex(b""),
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Hex SHA-256 of the body that will be sent.
    pub fn payload_hash(mut self, hash: impl Into<String>) -> Self {
        self.payload_hash = hash.into();
        self
    }

    /// Normalize into the canonical request string.
    pub fn canonicalize(self) -> CanonicalRequest {
        let mut headers: Vec<(String, String)> = self
            .headers
            .into_iter()
            .map(|(name, value)| {
                let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
                (name.trim().to_ascii_lowercase(), value)
            })
            .collect();
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method.to_ascii_uppercase(),
            canonical_uri(&self.path),
            canonical_query(&self.query),
            canonical_headers,
            signed_headers,
            self.payload_hash,
        );

        CanonicalRequest {
            canonical,
            signed_headers,
            headers,
        }
    }
}

/// A request reduced to its canonical form.
#[derive(Clone, Debug)]
pub struct CanonicalRequest {
    canonical: String,
    signed_headers: String,
    headers: Vec<(String, String)>,
}

impl CanonicalRequest {
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Semicolon-joined, sorted signed header names.
    pub fn signed_headers(&self) -> &str {
        &self.signed_headers
    }

    pub fn string_to_sign(&self, context: &SigningContext) -> String {
        format!(
            "{AWS4_HMAC_SHA256}\n{}\n{}\n{}",
            context.amz_date(),
            context.scope(),
            sha256_hex(self.canonical.as_bytes())
        )
    }

    /// Sign with the derived key, producing the Authorization header.
    pub fn sign(self, context: &SigningContext, access_key_id: &str) -> SignedRequest {
        let string_to_sign = self.string_to_sign(context);
        let signature = hex::encode(hmac_sha256(
            context.signing_key(),
            string_to_sign.as_bytes(),
        ));
        let authorization = format!(
            "{AWS4_HMAC_SHA256} Credential={access_key_id}/{}, SignedHeaders={}, Signature={signature}",
            context.scope(),
            self.signed_headers,
        );

        SignedRequest {
            headers: self.headers,
            authorization,
            signature,
        }
    }
}

/// Signed headers ready to attach to an outgoing request.
#[derive(Clone, Debug)]
pub struct SignedRequest {
    headers: Vec<(String, String)>,
    authorization: String,
    signature: String,
}

impl SignedRequest {
    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Headers that were signed, lower-cased and sorted.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    let encoded = path
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{encoded}")
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
