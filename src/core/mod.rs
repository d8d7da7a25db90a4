//! Core sub-build and caching logic.
//!
//! This module contains:
//! - PersistentCache: option-aware on-disk result cache
//! - SubBuildOrchestrator: nested build over a single resource
//! - payload: sentinel markers around the loader result
//! - template: hash placeholders in output names

pub mod cache;
pub mod orchestrator;
pub mod payload;
pub mod template;

// Re-export commonly used types
pub use cache::{CacheError, CacheStatus, PersistentCache, SerializedCacheFile, StaleReason, TOOL_VERSION};
pub use orchestrator::{nested_run_name, SubBuildError, SubBuildOrchestrator, SubBuildOutput};
pub use payload::{extract_payload, wrap_payload, PAYLOAD_END, PAYLOAD_START};
pub use template::render_asset_path;
