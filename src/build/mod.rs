//! In-process host pipeline.
//!
//! A small build system exposing what the favicon core consumes from its
//! host: plugin phases, nested runs scoped to one entry, an asset map keyed
//! by output filename, hash-aware output names, and the errors a nested run
//! reports.

pub mod asset;
pub mod cache;
pub mod compilation;
pub mod nested;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use asset::{Asset, AssetMap};
pub use cache::{BuildCache, CacheNamespace, CachedModule};
pub use compilation::{BuildStats, Compilation, Compiler, OutputOptions, Plugin};
pub use nested::{ChildCompilation, ChunkAssetHook, NestedRun, NestedRunOptions, SingleEntry};

/// Failures of the build machinery itself
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Nested run '{name}' has no entry")]
    NoEntry { name: String },

    #[error("Failed to write asset {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An error reported while building a module.
///
/// Reported errors do not abort a nested run; they are collected and
/// surfaced once the run completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleError {
    pub message: String,
    pub cause: Option<String>,
}

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}:\n{}", self.message, cause),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ModuleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_error_display() {
        assert_eq!(ModuleError::new("bad icon size").to_string(), "bad icon size");
        assert_eq!(
            ModuleError::new("Module build failed")
                .with_cause("unexpected EOF")
                .to_string(),
            "Module build failed:\nunexpected EOF"
        );
    }
}
