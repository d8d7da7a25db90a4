//! Compiler and per-run compilation state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::core::template::render_asset_path;

use super::asset::{Asset, AssetMap};
use super::cache::BuildCache;
use super::nested::{NestedRun, NestedRunOptions};
use super::BuildError;

/// A participant in a build
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Human-readable plugin name
    fn name(&self) -> &str;

    /// Resource discovery phase; the run waits for every plugin to finish
    async fn make(&self, compilation: &Compilation) -> Result<()>;

    /// Finalize phase, after every `make` succeeded and before assets are written
    async fn emit(&self, _compilation: &Compilation) -> Result<()> {
        Ok(())
    }
}

/// Where and how assets are written
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Output directory
    pub path: PathBuf,

    /// URL prefix under which the output directory is served
    pub public_path: String,
}

impl OutputOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            public_path: String::new(),
        }
    }

    pub fn with_public_path(mut self, public_path: impl Into<String>) -> Self {
        self.public_path = public_path.into();
        self
    }
}

/// Summary of one completed build
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Names of the assets written
    pub assets: Vec<String>,
}

/// Runs builds; keeps the incremental cache between runs
pub struct Compiler {
    context: PathBuf,
    output: OutputOptions,
    cache: BuildCache,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Compiler {
    pub fn new(context: impl Into<PathBuf>, output: OutputOptions) -> Self {
        Self {
            context: context.into(),
            output,
            cache: BuildCache::new(),
            plugins: Vec::new(),
        }
    }

    /// Register a plugin
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn output(&self) -> &OutputOptions {
        &self.output
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Run one build: every plugin's `make` concurrently, then every
    /// `emit`, then write the asset map into the output directory.
    #[instrument(skip(self), fields(output = %self.output.path.display()))]
    pub async fn run(&self) -> Result<BuildStats> {
        let started_at = Utc::now();
        let start = Instant::now();
        let compilation = Compilation::new(&self.context, self.output.clone(), self.cache.clone());
        info!(id = %compilation.id(), "Starting build");

        try_join_all(self.plugins.iter().map(|plugin| {
            let compilation = &compilation;
            async move {
                plugin
                    .make(compilation)
                    .await
                    .with_context(|| format!("Plugin '{}' failed", plugin.name()))
            }
        }))
        .await?;

        for plugin in &self.plugins {
            plugin
                .emit(&compilation)
                .await
                .with_context(|| format!("Plugin '{}' failed during emit", plugin.name()))?;
        }

        let assets = compilation.write_assets().await?;
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(id = %compilation.id(), assets = assets.len(), duration_ms, "Build completed");

        Ok(BuildStats {
            id: compilation.id(),
            started_at,
            duration_ms,
            assets,
        })
    }
}

/// State of one build run
pub struct Compilation {
    id: Uuid,
    context: PathBuf,
    output: OutputOptions,
    cache: BuildCache,
    assets: Mutex<AssetMap>,
}

impl Compilation {
    pub fn new(context: impl Into<PathBuf>, output: OutputOptions, cache: BuildCache) -> Self {
        Self {
            id: Uuid::new_v4(),
            context: context.into(),
            output,
            cache,
            assets: Mutex::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn output_path(&self) -> &Path {
        &self.output.path
    }

    pub fn public_path(&self) -> &str {
        &self.output.public_path
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Resolve hash placeholders in an output name template
    pub fn asset_path(&self, template: &str, hash: &str) -> String {
        render_asset_path(template, hash)
    }

    /// Add or replace an output file
    pub fn emit_asset(&self, name: impl Into<String>, asset: Asset) {
        self.lock_assets().insert(name, asset);
    }

    pub fn remove_asset(&self, name: &str) -> Option<Asset> {
        self.lock_assets().remove(name)
    }

    pub fn asset(&self, name: &str) -> Option<Asset> {
        self.lock_assets().get(name).cloned()
    }

    pub fn asset_names(&self) -> Vec<String> {
        self.lock_assets().names()
    }

    /// Snapshot of the current asset map
    pub fn assets(&self) -> AssetMap {
        self.lock_assets().clone()
    }

    pub(crate) fn merge_assets(&self, assets: AssetMap) {
        self.lock_assets().merge(assets);
    }

    /// Create a nested run writing into this compilation
    pub fn create_nested_run(&self, name: impl Into<String>, options: NestedRunOptions) -> NestedRun<'_> {
        NestedRun::new(self, name.into(), options)
    }

    /// Write every asset below the output directory
    pub async fn write_assets(&self) -> Result<Vec<String>, BuildError> {
        let assets = self.assets();
        let mut written = Vec::with_capacity(assets.len());

        for (name, asset) in assets {
            let path = self.output.path.join(&name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| BuildError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            fs::write(&path, asset.contents())
                .await
                .map_err(|source| BuildError::Write {
                    path: path.clone(),
                    source,
                })?;
            debug!(asset = %name, size = asset.size(), "Wrote asset");
            written.push(name);
        }

        Ok(written)
    }

    fn lock_assets(&self) -> std::sync::MutexGuard<'_, AssetMap> {
        self.assets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
