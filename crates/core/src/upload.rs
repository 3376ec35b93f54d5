//! Upload operation types and range validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single request header the upload target requires.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for HttpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Upload targets are pre-signed; header values may carry credentials.
        let sensitive = matches!(
            self.name.to_ascii_lowercase().as_str(),
            "authorization" | "x-amz-security-token" | "cookie"
        );
        if sensitive {
            write!(f, "{}: [REDACTED]", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.value)
        }
    }
}

/// One byte-range slice of a file to send, as handed out by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOperation {
    #[serde(default)]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub request_headers: Vec<HttpHeader>,
    pub length: u64,
    pub offset: u64,
}

impl UploadOperation {
    pub fn new(method: impl Into<String>, url: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            request_headers: Vec::new(),
            length,
            offset,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.push(HttpHeader::new(name, value));
        self
    }

    /// HTTP method to use; blank means PUT.
    pub fn effective_method(&self) -> String {
        let method = self.method.trim();
        if method.is_empty() {
            "PUT".to_string()
        } else {
            method.to_ascii_uppercase()
        }
    }

    /// Headers to send, skipping entries with a blank name.
    pub fn headers(&self) -> impl Iterator<Item = &HttpHeader> {
        self.request_headers
            .iter()
            .filter(|header| !header.name.trim().is_empty())
    }

    /// Exclusive end of the byte range, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Check that `[offset, offset+length)` lies inside a file of `file_size` bytes.
    pub fn validate(&self, index: usize, file_size: u64) -> crate::Result<()> {
        if self.url.trim().is_empty() {
            return Err(crate::Error::InvalidOperation(format!(
                "operation {index} has no url"
            )));
        }
        match self.end() {
            Some(end) if end <= file_size => Ok(()),
            _ => Err(crate::Error::InvalidRange {
                index,
                offset: self.offset,
                length: self.length,
                file_size,
            }),
        }
    }
}

/// Validate every operation against the file size. Fails on the first bad one.
pub fn validate_operations(operations: &[UploadOperation], file_size: u64) -> crate::Result<()> {
    operations
        .iter()
        .enumerate()
        .try_for_each(|(index, op)| op.validate(index, file_size))
}
