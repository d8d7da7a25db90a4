//! Persistent result cache.
//!
//! One JSON record per plugin instance, stored inside the build output next
//! to the icons it describes, so cleaning the output also clears the cache.
//! A record is reused only if the input fingerprint, the fingerprint of the
//! full options and the tool version all match the current build.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::domain::{CacheRecord, Fingerprint, ProcessingOptions, SubBuildResult};

use super::template::render_asset_path;

/// Version stamped into every record; an upgrade invalidates all records
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name appended to the resolved prefix
const CACHE_FILE_SUFFIX: &str = ".cache";

/// Cache failures.
///
/// A missing or outdated record is not an error; these are.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to read cache file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache file {} is not a valid cache record: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize cache record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A cache record ready to be emitted into the build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedCacheFile {
    /// Path relative to the output root
    pub path: String,

    /// UTF-8 JSON contents
    pub contents: Vec<u8>,
}

/// Why a stored record cannot be reused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "check")]
pub enum StaleReason {
    /// The source image changed
    InputChanged,

    /// Some processing option changed
    OptionsChanged,

    /// The record was written by another tool version
    VersionChanged { stored: String },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputChanged => write!(f, "input changed"),
            Self::OptionsChanged => write!(f, "options changed"),
            Self::VersionChanged { stored } => write!(f, "written by version {}", stored),
        }
    }
}

/// State of the cache file for a given input and options
#[derive(Debug, Clone, PartialEq)]
pub enum CacheStatus {
    /// `persistent_cache` is off
    Disabled,

    /// No file at the derived path
    Missing,

    /// Record passes all checks
    Valid(SubBuildResult),

    /// Record exists but fails one or more checks
    Stale(Vec<StaleReason>),

    /// File exists but does not parse as a record
    Corrupt(String),
}

/// Option-aware, content-addressed result cache rooted at a build output
#[derive(Debug, Clone)]
pub struct PersistentCache {
    output_root: PathBuf,
    tool_version: String,
}

impl PersistentCache {
    /// Cache for the build writing into `output_root`
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            tool_version: TOOL_VERSION.to_string(),
        }
    }

    /// Override the version stamp (used to simulate tool upgrades)
    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = version.into();
        self
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Cache file name relative to the output root: resolved prefix + `.cache`
    pub fn cache_file_name(&self, input: &Fingerprint, options: &ProcessingOptions) -> String {
        format!(
            "{}{}",
            render_asset_path(&options.prefix, input.as_str()),
            CACHE_FILE_SUFFIX
        )
    }

    /// Absolute cache file location
    pub fn cache_file_path(&self, input: &Fingerprint, options: &ProcessingOptions) -> PathBuf {
        self.output_root.join(self.cache_file_name(input, options))
    }

    /// Run the three independent checks and report every failing one
    pub fn stale_reasons(
        &self,
        record: &CacheRecord,
        input: &Fingerprint,
        options: &ProcessingOptions,
    ) -> Result<Vec<StaleReason>, CacheError> {
        let option_hash = Fingerprint::of_canonical(options)?;
        let mut reasons = Vec::new();

        if record.hash != *input {
            reasons.push(StaleReason::InputChanged);
        }
        if record.option_hash != option_hash {
            reasons.push(StaleReason::OptionsChanged);
        }
        if record.version != self.tool_version {
            reasons.push(StaleReason::VersionChanged {
                stored: record.version.clone(),
            });
        }

        Ok(reasons)
    }

    /// A record is valid iff hash, option hash and version all match
    pub fn is_valid(
        &self,
        record: &CacheRecord,
        input: &Fingerprint,
        options: &ProcessingOptions,
    ) -> Result<bool, CacheError> {
        Ok(self.stale_reasons(record, input, options)?.is_empty())
    }

    /// Look up a stored result.
    ///
    /// `Ok(None)` when the cache is disabled, the file is absent, or the
    /// record fails validation. Read failures and unparsable files are
    /// errors so callers can tell them apart from a clean miss.
    pub async fn try_load(
        &self,
        input: &Fingerprint,
        options: &ProcessingOptions,
    ) -> Result<Option<SubBuildResult>, CacheError> {
        if !options.persistent_cache {
            debug!("Persistent cache disabled");
            return Ok(None);
        }

        let Some(record) = self.read_record(input, options).await? else {
            return Ok(None);
        };

        let reasons = self.stale_reasons(&record, input, options)?;
        if !reasons.is_empty() {
            let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
            info!(reasons = %reasons.join(", "), "Cached result is stale");
            return Ok(None);
        }

        info!(input = %input, "Reusing cached result");
        Ok(Some(record.result))
    }

    /// Describe the cache file for `input` and `options` without failing on
    /// corrupt content
    pub async fn inspect(
        &self,
        input: &Fingerprint,
        options: &ProcessingOptions,
    ) -> Result<CacheStatus, CacheError> {
        if !options.persistent_cache {
            return Ok(CacheStatus::Disabled);
        }

        let record = match self.read_record(input, options).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(CacheStatus::Missing),
            Err(CacheError::Corrupt { source, .. }) => {
                return Ok(CacheStatus::Corrupt(source.to_string()))
            }
            Err(e) => return Err(e),
        };

        let reasons = self.stale_reasons(&record, input, options)?;
        if reasons.is_empty() {
            Ok(CacheStatus::Valid(record.result))
        } else {
            Ok(CacheStatus::Stale(reasons))
        }
    }

    /// Build the record for a fresh result.
    ///
    /// Returns `None` when the cache is disabled. Writing is left to the
    /// caller's build output.
    pub fn store(
        &self,
        input: &Fingerprint,
        options: &ProcessingOptions,
        result: &SubBuildResult,
    ) -> Result<Option<SerializedCacheFile>, CacheError> {
        if !options.persistent_cache {
            return Ok(None);
        }

        let record = CacheRecord {
            hash: input.clone(),
            version: self.tool_version.clone(),
            option_hash: Fingerprint::of_canonical(options)?,
            result: result.clone(),
        };

        Ok(Some(SerializedCacheFile {
            path: self.cache_file_name(input, options),
            contents: serde_json::to_vec(&record)?,
        }))
    }

    async fn read_record(
        &self,
        input: &Fingerprint,
        options: &ProcessingOptions,
    ) -> Result<Option<CacheRecord>, CacheError> {
        let path = self.cache_file_path(input, options);

        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache file");
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| CacheError::Corrupt { path, source })
    }
}
