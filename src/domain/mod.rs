//! Domain types for iconforge.
//!
//! This module contains the core data structures:
//! - ProcessingOptions: per-instance configuration
//! - Fingerprint: content digests and canonical serialization
//! - CacheRecord / SubBuildResult: sub-build output and its cache wrapper

pub mod fingerprint;
pub mod options;
pub mod record;

// Re-export commonly used types
pub use fingerprint::{canonical_json, Fingerprint};
pub use options::{IconPlatforms, ProcessingOptions};
pub use record::{CacheRecord, SubBuildResult};
