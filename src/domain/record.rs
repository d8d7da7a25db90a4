//! Values produced by a sub-build and the cache records wrapping them.

use serde::{Deserialize, Serialize};

use super::fingerprint::{canonical_json, Fingerprint};

/// Structured result of one nested run.
///
/// Opaque to the core: it is extracted, cached and handed back intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubBuildResult(serde_json::Value);

impl SubBuildResult {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parse a result from JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text).map(Self)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Canonical JSON text, identical for structurally equal results
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        canonical_json(&self.0)
    }
}

/// Persisted cache entry.
///
/// On disk: `{"hash": .., "version": .., "optionHash": .., "result": ..}`.
/// Created only after a successful sub-build; never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Input fingerprint the result was derived from
    pub hash: Fingerprint,

    /// Tool version that wrote the record
    pub version: String,

    /// Fingerprint of the full processing options
    #[serde(rename = "optionHash")]
    pub option_hash: Fingerprint,

    /// The stored result
    pub result: SubBuildResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wire_field_names() {
        let record = CacheRecord {
            hash: Fingerprint::of(b"logo"),
            version: "1.0.0".to_string(),
            option_hash: Fingerprint::of(b"options"),
            result: SubBuildResult::new(json!({"files": []})),
        };

        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("hash"));
        assert!(object.contains_key("version"));
        assert!(object.contains_key("optionHash"));
        assert_eq!(object["result"], json!({"files": []}));
        assert_eq!(object.len(), 4);
    }

    #[test]
    fn test_result_canonical_json_is_key_sorted() {
        let result = SubBuildResult::from_json(r#"{"outputFilePrefix":"x/","files":["a"],"html":[]}"#)
            .unwrap();

        assert_eq!(
            result.to_canonical_json().unwrap(),
            r#"{"files":["a"],"html":[],"outputFilePrefix":"x/"}"#
        );
    }
}
