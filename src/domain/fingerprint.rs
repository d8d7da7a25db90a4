//! Content fingerprints and canonical serialization.
//!
//! A fingerprint is the first 128 bits of a SHA-256 digest, hex encoded.
//! Structured values are fingerprinted over their canonical JSON form:
//! object keys sorted, no insignificant whitespace.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a fingerprint
const FINGERPRINT_BYTES: usize = 16;

/// Fixed-length content digest (32 lowercase hex chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw bytes
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }

    /// Fingerprint the canonical JSON serialization of a value
    pub fn of_canonical<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self::of(canonical_json(value)?.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serialize a value to canonical JSON.
///
/// Goes through `serde_json::Value`, whose object map is ordered by key
/// (the `preserve_order` feature must stay off), so struct field order and
/// map insertion order never leak into the output.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&value)
}
