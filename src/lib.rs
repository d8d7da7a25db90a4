//! iconforge - favicon builds as a cached nested sub-build
//!
//! Derives a favicon set from a single logo by running an isolated nested
//! build over it inside the enclosing build, and keeps the result in an
//! on-disk cache next to the output so unchanged logos skip regeneration.
//!
//! # Architecture
//!
//! - A nested run builds the logo through the icon loader, with its own
//!   incremental-cache namespace and per-entry parameters
//! - The loader result travels through the pipeline between two sentinel
//!   markers and is cut out of the finalized chunk
//! - A cache record is reused only when the logo fingerprint, the options
//!   fingerprint and the tool version all match
//!
//! # Modules
//!
//! - `domain`: Data structures (ProcessingOptions, Fingerprint, CacheRecord)
//! - `core`: Persistent cache, sub-build orchestrator, payload markers
//! - `build`: In-process host pipeline (Compiler, Compilation, NestedRun)
//! - `adapters`: Loader and image backend traits, icon loader
//! - `plugin`: Favicons plugin wiring cache and sub-build into a build
//! - `config`: Config file discovery and resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Build once
//! iconforge build --logo assets/logo.png --output dist
//!
//! # Rebuild on logo changes
//! iconforge watch --logo assets/logo.png
//!
//! # Inspect the cache file for the current options
//! iconforge cache --logo assets/logo.png
//! ```

pub mod adapters;
pub mod build;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod plugin;

// Re-export main types at crate root for convenience
pub use adapters::{IconGenerator, IconLoader, IconManifest, Loader, PassthroughGenerator};
pub use build::{Compilation, Compiler, OutputOptions, Plugin};
pub use config::ConfigError;
pub use core::{CacheError, PersistentCache, SubBuildError, SubBuildOrchestrator, SubBuildOutput};
pub use domain::{CacheRecord, Fingerprint, ProcessingOptions, SubBuildResult};
pub use plugin::FaviconsPlugin;
