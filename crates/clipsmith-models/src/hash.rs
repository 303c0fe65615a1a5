//! Content hash used as cache and job identity key.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a source file's bytes, as lowercase hex.
///
/// Computed once per distinct file; all caching and job identity is keyed
/// on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Digest a complete byte slice.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Finalize an incrementally-fed hasher.
    ///
    /// Callers that stream large files feed chunks into a [`Sha256`]
    /// themselves and convert here.
    pub fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an existing hex digest string.
    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
