//! ES256 bearer tokens for the API.

use crate::error::{SignerError, SignerResult};
use crate::key::PrivateKey;
use jsonwebtoken::{Algorithm, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use time::{Duration, OffsetDateTime};

/// Audience claim the API expects.
pub const TOKEN_AUDIENCE: &str = "appstoreconnect-v1";

/// Validity window of a minted token.
pub const TOKEN_LIFETIME: Duration = Duration::minutes(20);

/// How long before expiry a cached token is replaced.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::seconds(60);

/// JWT claims carried by an API token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
}

/// A signed, time-boxed API credential.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    value: String,
    issued_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl AuthToken {
    /// The compact JWS string.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> OffsetDateTime {
        self.issued_at
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    /// Whether the token may still be presented at `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now >= self.issued_at && now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(OffsetDateTime::now_utc())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints API tokens for one key/issuer pair.
#[derive(Clone, Debug)]
pub struct TokenMinter {
    key_id: String,
    issuer_id: String,
    key: PrivateKey,
    lifetime: Duration,
}

impl TokenMinter {
    pub fn new(
        key_id: impl Into<String>,
        issuer_id: impl Into<String>,
        key: PrivateKey,
    ) -> SignerResult<Self> {
        let key_id = key_id.into();
        let issuer_id = issuer_id.into();
        if key_id.trim().is_empty() {
            return Err(SignerError::InvalidInput("key id is required".to_string()));
        }
        if issuer_id.trim().is_empty() {
            return Err(SignerError::InvalidInput("issuer id is required".to_string()));
        }
        Ok(Self {
            key_id,
            issuer_id,
            key,
            lifetime: TOKEN_LIFETIME,
        })
    }

    /// Parse the PEM key and build a minter in one step.
    pub fn from_pem(
        key_id: impl Into<String>,
        issuer_id: impl Into<String>,
        pem: &[u8],
    ) -> SignerResult<Self> {
        Self::new(key_id, issuer_id, PrivateKey::from_pem(pem)?)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    /// Mint a token valid from now.
    pub fn mint(&self) -> SignerResult<AuthToken> {
        self.mint_at(OffsetDateTime::now_utc())
    }

    /// Mint a token with an explicit issue time.
    pub fn mint_at(&self, now: OffsetDateTime) -> SignerResult<AuthToken> {
        // JWT timestamps are whole seconds.
        let issued_at = now
            .replace_nanosecond(0)
            .map_err(|e| SignerError::Encoding(e.to_string()))?;
        let expires_at = issued_at + self.lifetime;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let claims = TokenClaims {
            iss: self.issuer_id.clone(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let value = jsonwebtoken::encode(&header, &claims, self.key.encoding_key())
            .map_err(|e| SignerError::Encoding(e.to_string()))?;

        tracing::trace!(key_id = %self.key_id, exp = claims.exp, "minted API token");

        Ok(AuthToken {
            value,
            issued_at,
            expires_at,
        })
    }
}

/// Reuses a minted token until shortly before it expires.
#[derive(Debug)]
pub struct TokenCache {
    minter: TokenMinter,
    refresh_margin: Duration,
    current: Mutex<Option<AuthToken>>,
}

impl TokenCache {
    pub fn new(minter: TokenMinter) -> Self {
        Self {
            minter,
            refresh_margin: TOKEN_REFRESH_MARGIN,
            current: Mutex::new(None),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn minter(&self) -> &TokenMinter {
        &self.minter
    }

    /// Current token, minting a fresh one if needed.
    pub fn token(&self) -> SignerResult<AuthToken> {
        self.token_at(OffsetDateTime::now_utc())
    }

    /// Current token as of `now`. Never returns a token invalid at `now`.
    pub fn token_at(&self, now: OffsetDateTime) -> SignerResult<AuthToken> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(token) = current.as_ref()
            && token.is_valid_at(now)
            && token.expires_at - now > self.refresh_margin
        {
            return Ok(token.clone());
        }

        let token = self.minter.mint_at(now)?;
        *current = Some(token.clone());
        Ok(token)
    }
}
