//! Client configuration: TOML file merged with `LAUNCHPAD_` environment variables.

use anyhow::{Context, Result};
use base64::Engine;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use launchpad_signer::TokenMinter;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_URL: &str = "https://api.appstoreconnect.apple.com";
pub const DEFAULT_NOTARY_BASE_URL: &str = "https://appstoreconnect.apple.com";

/// Credentials and endpoints for talking to the API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API key identifier (`kid` of minted tokens).
    #[serde(default, deserialize_with = "string_or_number")]
    pub key_id: Option<String>,
    /// Issuer identifier (`iss` of minted tokens).
    #[serde(default, deserialize_with = "string_or_number")]
    pub issuer_id: Option<String>,
    /// Path to the `.p8` private key.
    pub private_key_path: Option<PathBuf>,
    /// Inline PEM private key.
    pub private_key: Option<String>,
    /// Base64-encoded PEM private key.
    pub private_key_b64: Option<String>,
    pub api_base_url: Option<String>,
    pub notary_base_url: Option<String>,
    /// Upload operations in flight at once.
    pub upload_concurrency: Option<usize>,
}

impl ClientConfig {
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn notary_base_url(&self) -> &str {
        self.notary_base_url
            .as_deref()
            .unwrap_or(DEFAULT_NOTARY_BASE_URL)
    }

    /// Read the private key PEM from whichever source is configured.
    ///
    /// A key file wins over an inline key, which wins over base64.
    pub fn private_key_pem(&self) -> Result<Vec<u8>> {
        if let Some(path) = &self.private_key_path {
            return std::fs::read(path)
                .with_context(|| format!("failed to read private key {}", path.display()));
        }
        if let Some(pem) = self.private_key.as_deref().filter(|p| !p.trim().is_empty()) {
            return Ok(pem.as_bytes().to_vec());
        }
        if let Some(encoded) = self.private_key_b64.as_deref().filter(|p| !p.trim().is_empty()) {
            return base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .context("private_key_b64 is not valid base64");
        }
        anyhow::bail!(
            "no private key configured; set private_key_path, LAUNCHPAD_PRIVATE_KEY_PATH, \
             LAUNCHPAD_PRIVATE_KEY or LAUNCHPAD_PRIVATE_KEY_B64"
        )
    }

    /// Copy with inline key material masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]".to_string());
        Self {
            private_key: mask(&self.private_key),
            private_key_b64: mask(&self.private_key_b64),
            ..self.clone()
        }
    }

    /// Build a token minter from the configured credentials.
    pub fn token_minter(&self) -> Result<TokenMinter> {
        let key_id = non_empty(self.key_id.as_deref())
            .context("key_id is not configured (LAUNCHPAD_KEY_ID)")?;
        let issuer_id = non_empty(self.issuer_id.as_deref())
            .context("issuer_id is not configured (LAUNCHPAD_ISSUER_ID)")?;
        let pem = self.private_key_pem()?;
        TokenMinter::from_pem(key_id, issuer_id, &pem).context("failed to load API key")
    }
}

/// Environment values are typed by content, so an all-digit ID arrives as a number.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Unsigned(n) => n.to_string(),
        Raw::Signed(n) => n.to_string(),
    }))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the client config path.
///
/// Order: explicit flag, `LAUNCHPAD_CLIENT_CONFIG`, then
/// `$XDG_CONFIG_HOME/launchpad/config.toml` (falling back to `~/.config`).
pub fn client_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = std::env::var_os("LAUNCHPAD_CLIENT_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| anyhow::anyhow!("HOME not set; set LAUNCHPAD_CLIENT_CONFIG"))?;
            PathBuf::from(home).join(".config")
        }
    };

    Ok(base.join("launchpad").join("config.toml"))
}

/// Load the client config.
///
/// A missing file is skipped. Invalid values, whether from the file or the
/// environment, are errors.
pub fn load_client_config(path: &Path) -> Result<ClientConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("LAUNCHPAD_").split("__"));

    figment
        .extract()
        .map_err(|err| anyhow::anyhow!(err).context("failed to load client configuration"))
}
