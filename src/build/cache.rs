//! Incremental in-memory build cache.
//!
//! Owned by a `Compiler` and shared by every compilation it runs. Nested
//! runs that share a namespace share memoized modules, so each nested run
//! that must not see (or pollute) another's state gets its own namespace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::Fingerprint;

use super::asset::AssetMap;

/// Memoized loader output for one module
#[derive(Debug, Clone)]
pub struct CachedModule {
    /// Fingerprint of the resource bytes the module was built from
    pub source_fingerprint: Fingerprint,

    /// Loader output before module wrapping
    pub source: String,

    /// Files the loader emitted while building the module
    pub emitted: AssetMap,
}

/// One isolated set of memoized modules
#[derive(Debug, Clone)]
pub struct CacheNamespace {
    name: Arc<str>,
    modules: Arc<Mutex<HashMap<String, CachedModule>>>,
}

impl CacheNamespace {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            modules: Arc::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<CachedModule> {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: impl Into<String>, module: CachedModule) {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), module);
    }

    pub fn len(&self) -> usize {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Root namespace plus named child namespaces
#[derive(Debug, Clone)]
pub struct BuildCache {
    root: CacheNamespace,
    namespaces: Arc<Mutex<HashMap<String, CacheNamespace>>>,
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildCache {
    pub fn new() -> Self {
        Self {
            root: CacheNamespace::new(""),
            namespaces: Arc::default(),
        }
    }

    /// Namespace used by nested runs that were not given their own
    pub fn root(&self) -> CacheNamespace {
        self.root.clone()
    }

    /// Get or create the namespace called `name`
    pub fn namespace(&self, name: &str) -> CacheNamespace {
        self.namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| CacheNamespace::new(name))
            .clone()
    }
}
