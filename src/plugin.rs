//! Favicons plugin: wires the persistent cache and the sub-build into the
//! host's `make` and `emit` phases.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{IconGenerator, IconManifest};
use crate::build::{Asset, Compilation, Plugin};
use crate::config::ConfigError;
use crate::core::{CacheError, PersistentCache, SubBuildOrchestrator, TOOL_VERSION};
use crate::domain::{Fingerprint, ProcessingOptions, SubBuildResult};

/// What the last `make` produced
#[derive(Debug, Clone, PartialEq)]
pub struct PluginOutput {
    /// Resolved name of the stats asset
    pub stats_asset: String,
    pub result: SubBuildResult,
    /// Whether the result came from the persistent cache
    pub from_cache: bool,
}

/// Generates favicons for one logo per build
pub struct FaviconsPlugin {
    options: ProcessingOptions,
    orchestrator: SubBuildOrchestrator,
    tool_version: String,
    output: Mutex<Option<PluginOutput>>,
}

impl FaviconsPlugin {
    /// Validate `options` and create the plugin with the built-in generator
    pub fn new(options: ProcessingOptions) -> Result<Self, ConfigError> {
        Self::with_orchestrator(options, SubBuildOrchestrator::new())
    }

    /// Plugin rendering icons through a custom image backend
    pub fn with_generator(
        options: ProcessingOptions,
        generator: Arc<dyn IconGenerator>,
    ) -> Result<Self, ConfigError> {
        Self::with_orchestrator(options, SubBuildOrchestrator::with_generator(generator))
    }

    pub fn with_orchestrator(
        options: ProcessingOptions,
        orchestrator: SubBuildOrchestrator,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            options,
            orchestrator,
            tool_version: TOOL_VERSION.to_string(),
            output: Mutex::new(None),
        })
    }

    /// Stamp cache records with another version
    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = version.into();
        self
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    /// Output of the most recent `make`
    pub fn output(&self) -> Option<PluginOutput> {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn result(&self) -> Option<SubBuildResult> {
        self.output().map(|output| output.result)
    }

    /// Typed manifest of the most recent result, for markup templating
    pub fn manifest(&self) -> Option<IconManifest> {
        self.output()
            .and_then(|output| IconManifest::try_from(&output.result).ok())
    }

    fn logo_path(&self, compilation: &Compilation) -> PathBuf {
        compilation.context().join(&self.options.logo)
    }

    async fn load_cached(
        &self,
        cache: &PersistentCache,
        input: &Fingerprint,
    ) -> Result<Option<SubBuildResult>> {
        match cache.try_load(input, &self.options).await {
            Ok(result) => Ok(result),
            Err(e @ CacheError::Corrupt { .. }) => {
                warn!(error = %e, "Ignoring corrupt cache file");
                Ok(None)
            }
            Err(e) => Err(e).context("Persistent cache is unreadable"),
        }
    }
}

#[async_trait]
impl Plugin for FaviconsPlugin {
    fn name(&self) -> &str {
        "iconforge"
    }

    #[instrument(skip(self, compilation), fields(logo = %self.options.logo.display()))]
    async fn make(&self, compilation: &Compilation) -> Result<()> {
        self.options.validate_in(compilation.context())?;
        let logo = self.logo_path(compilation);
        let bytes = fs::read(&logo)
            .await
            .with_context(|| format!("Failed to read logo: {}", logo.display()))?;
        let input = Fingerprint::of(&bytes);
        let cache = PersistentCache::new(compilation.output_path()).with_tool_version(&self.tool_version);

        let (result, stats_asset, from_cache) = match self.load_cached(&cache, &input).await? {
            Some(result) => {
                let json = result
                    .to_canonical_json()
                    .context("Failed to serialize cached result")?;
                let stats_asset = compilation.asset_path(
                    &self.options.stats_filename,
                    Fingerprint::of(json.as_bytes()).as_str(),
                );
                compilation.emit_asset(stats_asset.clone(), Asset::from(json));
                (result, stats_asset, true)
            }
            None => {
                debug!(input = %input, "No reusable cached result");
                let output = self
                    .orchestrator
                    .run_sub_build(&self.options, compilation.context(), compilation)
                    .await?;
                if let Some(file) = cache.store(&input, &self.options, &output.result)? {
                    debug!(path = %file.path, "Emitting cache file");
                    compilation.emit_asset(file.path, Asset::new(file.contents));
                }
                (output.result, output.name, false)
            }
        };

        info!(%stats_asset, from_cache, "Favicons ready");
        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(PluginOutput {
            stats_asset,
            result,
            from_cache,
        });
        Ok(())
    }

    async fn emit(&self, compilation: &Compilation) -> Result<()> {
        if self.options.emit_stats {
            return Ok(());
        }
        if let Some(output) = self.output() {
            compilation.remove_asset(&output.stats_asset);
        }
        Ok(())
    }
}
