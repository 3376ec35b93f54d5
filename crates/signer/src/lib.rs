//! Credentials and request signing for launchpad.
//!
//! This crate provides:
//! - ES256 key loading and API bearer token minting
//! - A token cache that re-mints shortly before expiry
//! - AWS Signature Version 4 signing for direct object-storage uploads

pub mod error;
pub mod key;
pub mod sigv4;
pub mod token;

pub use error::{SignerError, SignerResult};
pub use key::PrivateKey;
pub use sigv4::{
    CanonicalRequest, SignedRequest, SigningContext, UnsignedRequest, derive_signing_key,
    hmac_sha256, sha256_hex,
};
pub use token::{AuthToken, TokenCache, TokenClaims, TokenMinter};
