//! ES256 private key loading.

use crate::error::{SignerError, SignerResult};
use jsonwebtoken::{Algorithm, EncodingKey};
use std::fmt;
use std::path::Path;

/// A P-256 private key used to sign API tokens.
///
/// Loaded from the PKCS#8 PEM (`.p8`) file the API portal issues.
#[derive(Clone)]
pub struct PrivateKey {
    inner: EncodingKey,
}

impl PrivateKey {
    /// Parse a PKCS#8 PEM private key.
    ///
    /// The key is exercised with a throwaway signature so that keys on the wrong
    /// curve are rejected here rather than on the first request.
    pub fn from_pem(pem: &[u8]) -> SignerResult<Self> {
        let inner = EncodingKey::from_ec_pem(pem)
            .map_err(|e| SignerError::InvalidKey(format!("not an EC PEM key: {e}")))?;
        jsonwebtoken::crypto::sign(b"launchpad-key-check", &inner, Algorithm::ES256)
            .map_err(|e| SignerError::InvalidKey(format!("not a usable P-256 key: {e}")))?;
        Ok(Self { inner })
    }

    /// Read and parse a PEM key file.
    pub fn from_file(path: impl AsRef<Path>) -> SignerResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path)?;
        Self::from_pem(&pem).map_err(|e| match e {
            SignerError::InvalidKey(msg) => {
                SignerError::InvalidKey(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.inner
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}
