//! Nested runs: a child build over a single entry resource.
//!
//! A nested run reads its entry, builds it through the entry's loader,
//! wraps the loader output in module boilerplate, lets registered hooks
//! rewrite the resulting chunk asset, then names the chunk from the output
//! template and the chunk's content hash. On success its assets are merged
//! into the parent compilation.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{Loader, LoaderContext};
use crate::core::template::render_asset_path;
use crate::domain::{canonical_json, Fingerprint};

use super::asset::{Asset, AssetMap};
use super::cache::{CacheNamespace, CachedModule};
use super::compilation::Compilation;
use super::{BuildError, ModuleError};

const MODULE_PROLOGUE: &str = "/******/ (function(modules) { // bootstrap\n\
/******/ \tvar module = { exports: {} };\n\
/******/ \tmodules[0](module, module.exports);\n\
/******/ \treturn module.exports;\n\
/******/ })\n\
/******/ ([\n\
/* 0 */\n\
/***/ (function(module, exports) {\n\n";

const MODULE_EPILOGUE: &str = "\n\n/***/ })\n/******/ ]);\n";

/// Chunk name of the single entry
const ENTRY_CHUNK: &str = "main";

/// Rewrites the chunk asset before it is named and merged
pub type ChunkAssetHook = Box<dyn Fn(&str, &mut Asset) -> Result<(), ModuleError> + Send + Sync>;

/// Output settings of a nested run
#[derive(Debug, Clone)]
pub struct NestedRunOptions {
    /// Output name template for the entry chunk
    pub filename: String,

    /// Directory relative entry resources resolve against
    pub context: PathBuf,
}

/// The resource a nested run builds and how
#[derive(Clone)]
pub struct SingleEntry {
    pub resource: PathBuf,
    pub loader: Arc<dyn Loader>,

    /// Loader parameters, scoped to this entry
    pub params: serde_json::Value,
}

/// Outcome of a nested run that executed
#[derive(Debug, Clone)]
pub struct ChildCompilation {
    /// Nested run identity
    pub name: String,

    /// Content hash of the finalized entry chunk
    pub hash: String,

    /// Every asset the run produced
    pub assets: AssetMap,

    /// Output names of the entry chunk
    pub entry_files: Vec<String>,

    /// Errors reported while building
    pub errors: Vec<ModuleError>,
}

impl ChildCompilation {
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn errors(&self) -> &[ModuleError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A configured, not yet executed nested run
pub struct NestedRun<'a> {
    parent: &'a Compilation,
    name: String,
    options: NestedRunOptions,
    entry: Option<SingleEntry>,
    cache: CacheNamespace,
    hooks: Vec<ChunkAssetHook>,
}

impl<'a> NestedRun<'a> {
    pub(crate) fn new(parent: &'a Compilation, name: String, options: NestedRunOptions) -> Self {
        Self {
            cache: parent.cache().root(),
            parent,
            name,
            options,
            entry: None,
            hooks: Vec::new(),
        }
    }

    pub fn set_entry(&mut self, entry: SingleEntry) {
        self.entry = Some(entry);
    }

    /// Memoize modules in `namespace` instead of the parent's root namespace
    pub fn use_cache(&mut self, namespace: CacheNamespace) {
        self.cache = namespace;
    }

    /// Register a hook run on the entry chunk before it is finalized
    pub fn on_chunk_asset<F>(&mut self, hook: F)
    where
        F: Fn(&str, &mut Asset) -> Result<(), ModuleError> + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Execute the run as a child of the parent compilation.
    ///
    /// `Err` means the run could not execute. Build problems are returned
    /// as reported errors on the `ChildCompilation`.
    #[instrument(skip(self), fields(nested = %self.name))]
    pub async fn run_as_child(self) -> Result<ChildCompilation, BuildError> {
        let entry = self.entry.clone().ok_or_else(|| BuildError::NoEntry {
            name: self.name.clone(),
        })?;

        let resource = self.options.context.join(&entry.resource);
        let mut errors = Vec::new();
        let mut assets = AssetMap::new();
        let mut entry_files = Vec::new();
        let mut hash = Fingerprint::of(b"").to_string();

        let module = match fs::read(&resource).await {
            Ok(bytes) => self.build_module(&entry, &resource, &bytes, &mut errors).await,
            Err(e) => {
                errors.push(
                    ModuleError::new(format!("Module not found: {}", resource.display()))
                        .with_cause(e.to_string()),
                );
                None
            }
        };

        if let Some((source, emitted)) = module {
            let mut chunk = Asset::from(render_module(&source));
            for hook in &self.hooks {
                if let Err(e) = hook(ENTRY_CHUNK, &mut chunk) {
                    errors.push(e);
                }
            }

            hash = Fingerprint::of(chunk.contents()).to_string();
            let filename = render_asset_path(&self.options.filename, &hash);
            assets.merge(emitted);
            assets.insert(filename.clone(), chunk);
            entry_files.push(filename);
        }

        if errors.is_empty() {
            self.parent.merge_assets(assets.clone());
            info!(%hash, assets = assets.len(), "Nested run completed");
        } else {
            warn!(errors = errors.len(), "Nested run reported errors");
        }

        Ok(ChildCompilation {
            name: self.name,
            hash,
            assets,
            entry_files,
            errors,
        })
    }

    /// Run the loader, or restore its output from the cache namespace when
    /// the resource is unchanged
    async fn build_module(
        &self,
        entry: &SingleEntry,
        resource: &std::path::Path,
        bytes: &[u8],
        errors: &mut Vec<ModuleError>,
    ) -> Option<(String, AssetMap)> {
        let params = match canonical_json(&entry.params) {
            Ok(params) => params,
            Err(e) => {
                errors.push(ModuleError::new("Invalid loader parameters").with_cause(e.to_string()));
                return None;
            }
        };
        let key = format!("{}!{}?{}", entry.loader.name(), resource.display(), params);
        let source_fingerprint = Fingerprint::of(bytes);

        if let Some(cached) = self.cache.get(&key) {
            if cached.source_fingerprint == source_fingerprint {
                debug!(namespace = %self.cache.name(), "Restored module from cache");
                return Some((cached.source, cached.emitted));
            }
        }

        let mut ctx = LoaderContext::new(
            resource.to_path_buf(),
            entry.params.clone(),
            self.parent.public_path().to_string(),
        );
        let result = entry.loader.load(&mut ctx, bytes).await;
        let (emitted, reported) = ctx.into_parts();
        let had_reports = !reported.is_empty();
        errors.extend(reported);

        match result {
            Ok(source) => {
                if !had_reports {
                    self.cache.insert(
                        key,
                        CachedModule {
                            source_fingerprint,
                            source: source.clone(),
                            emitted: emitted.clone(),
                        },
                    );
                }
                Some((source, emitted))
            }
            Err(e) => {
                errors.push(e);
                None
            }
        }
    }
}

fn render_module(source: &str) -> String {
    format!("{}{}{}", MODULE_PROLOGUE, source, MODULE_EPILOGUE)
}
