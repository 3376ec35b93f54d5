//! Checksum types and incremental digest computation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Digest algorithm, named as the API names it on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA_256")]
    Sha256,
}

impl ChecksumAlgorithm {
    /// Wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA_256",
        }
    }

    /// Length of a hex-encoded digest for this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }

    /// Start an incremental hasher for this algorithm.
    pub fn hasher(&self) -> ChecksumHasher {
        match self {
            Self::Md5 => ChecksumHasher::Md5(md5::Context::new()),
            Self::Sha256 => ChecksumHasher::Sha256(Sha256::new()),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            _ => Err(crate::Error::InvalidChecksum(format!(
                "unknown checksum algorithm: {s}"
            ))),
        }
    }
}

/// A hex digest together with the algorithm that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub hash: String,
    pub algorithm: ChecksumAlgorithm,
}

impl Checksum {
    pub fn new(algorithm: ChecksumAlgorithm, hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            algorithm,
        }
    }

    /// Parse an expected digest, checking that it is hex of the right length.
    pub fn parse(algorithm: ChecksumAlgorithm, hash: &str) -> crate::Result<Self> {
        let hash = hash.trim();
        if hash.len() != algorithm.hex_len() {
            return Err(crate::Error::InvalidChecksum(format!(
                "expected {} hex chars for {algorithm}, got {}",
                algorithm.hex_len(),
                hash.len()
            )));
        }
        hex::decode(hash).map_err(|e| crate::Error::InvalidChecksum(e.to_string()))?;
        Ok(Self::new(algorithm, hash))
    }

    /// Compute the checksum of an in-memory buffer.
    pub fn compute(algorithm: ChecksumAlgorithm, data: &[u8]) -> Self {
        let mut hasher = algorithm.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Compare digests ignoring hex case. Algorithms must agree.
    pub fn matches(&self, other: &Checksum) -> bool {
        self.algorithm == other.algorithm && self.hash.eq_ignore_ascii_case(&other.hash)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hash)
    }
}

/// Named bundle of checksums attached to an uploaded file.
///
/// Only the whole-file slot exists today; [`Checksums::slots`] is the
/// iteration point verification walks, so new slots only need adding there.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Checksum>,
}

impl Checksums {
    pub fn file(checksum: Checksum) -> Self {
        Self {
            file: Some(checksum),
        }
    }

    /// Configured slots as `(name, checksum)` pairs.
    pub fn slots(&self) -> Vec<(&'static str, &Checksum)> {
        let mut slots = Vec::new();
        if let Some(file) = &self.file {
            slots.push(("file", file));
        }
        slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

/// Incremental hasher over one of the supported algorithms.
pub enum ChecksumHasher {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl ChecksumHasher {
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        match self {
            Self::Md5(_) => ChecksumAlgorithm::Md5,
            Self::Sha256(_) => ChecksumAlgorithm::Sha256,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(data),
            Self::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Finish hashing and return a lowercase hex checksum.
    pub fn finalize(self) -> Checksum {
        match self {
            Self::Md5(ctx) => Checksum::new(ChecksumAlgorithm::Md5, hex::encode(ctx.compute().0)),
            Self::Sha256(hasher) => {
                Checksum::new(ChecksumAlgorithm::Sha256, hex::encode(hasher.finalize()))
            }
        }
    }
}

impl fmt::Debug for ChecksumHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChecksumHasher({})", self.algorithm())
    }
}
