//! Sub-build orchestrator.
//!
//! Runs the icon loader over the logo in a nested run of the enclosing
//! compilation, strips the module boilerplate the pipeline wraps around the
//! loader output, and returns the parsed result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument};

use crate::adapters::{IconGenerator, IconLoader, IconLoaderParams, Loader, PassthroughGenerator};
use crate::build::{BuildError, Compilation, ModuleError, NestedRunOptions, SingleEntry};
use crate::domain::{ProcessingOptions, SubBuildResult};

use super::payload::extract_payload;

/// Sub-build failures
#[derive(Debug, Error)]
pub enum SubBuildError {
    /// The nested run could not execute at all
    #[error(transparent)]
    Infrastructure(#[from] BuildError),

    /// The nested run executed and reported errors
    #[error("Child compilation failed:\n{details}")]
    Reported { details: String },

    #[error("Child compilation produced no asset named '{name}'")]
    MissingOutput { name: String },

    #[error("Child compilation output '{name}' is not valid JSON: {source}")]
    InvalidOutput {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode loader parameters: {0}")]
    Params(#[source] serde_json::Error),
}

impl SubBuildError {
    /// Aggregate reported errors into one failure, one error per line
    pub fn reported(errors: &[ModuleError]) -> Self {
        let details = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        Self::Reported { details }
    }
}

/// Identity of the nested run for `resource`: the absolute path, or the
/// path relative to `context` when that is shorter
pub fn nested_run_name(context: &Path, resource: &Path) -> String {
    let absolute = if resource.is_absolute() {
        resource.to_path_buf()
    } else {
        context.join(resource)
    };
    let relative = absolute
        .strip_prefix(context)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| absolute.clone());

    let absolute = absolute.display().to_string();
    let relative = relative.display().to_string();
    let shortest = if !relative.is_empty() && relative.len() < absolute.len() {
        relative
    } else {
        absolute
    };
    format!("iconforge for \"{}\"", shortest)
}

/// A completed sub-build
#[derive(Debug, Clone, PartialEq)]
pub struct SubBuildOutput {
    /// Name the nested run gave its entry chunk in the parent's asset map
    pub name: String,
    pub result: SubBuildResult,
}

/// Spawns nested icon builds
pub struct SubBuildOrchestrator {
    loader: Arc<dyn Loader>,
}

impl Default for SubBuildOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SubBuildOrchestrator {
    /// Orchestrator using the icon loader with the passthrough generator
    pub fn new() -> Self {
        Self::with_generator(Arc::new(PassthroughGenerator::new()))
    }

    /// Orchestrator using the icon loader with a custom image backend
    pub fn with_generator(generator: Arc<dyn IconGenerator>) -> Self {
        Self::with_loader(Arc::new(IconLoader::new(generator)))
    }

    /// Orchestrator running an arbitrary loader as the transform step
    pub fn with_loader(loader: Arc<dyn Loader>) -> Self {
        Self { loader }
    }

    /// Run one nested build over `options.logo` and return its result
    /// together with the output name the result was emitted under.
    ///
    /// Never resolves partially: any reported error fails the whole call.
    #[instrument(skip(self, options, context, parent), fields(logo = %options.logo.display()))]
    pub async fn run_sub_build(
        &self,
        options: &ProcessingOptions,
        context: &Path,
        parent: &Compilation,
    ) -> Result<SubBuildOutput, SubBuildError> {
        let name = nested_run_name(context, &options.logo);
        let params = serde_json::to_value(IconLoaderParams::from(options)).map_err(SubBuildError::Params)?;

        let mut nested = parent.create_nested_run(
            name.clone(),
            NestedRunOptions {
                filename: options.stats_filename.clone(),
                context: context.to_path_buf(),
            },
        );
        nested.set_entry(SingleEntry {
            resource: PathBuf::from(&options.logo),
            loader: self.loader.clone(),
            params,
        });
        nested.use_cache(parent.cache().namespace(&name));
        nested.on_chunk_asset(|chunk, asset| {
            let payload = {
                let text = asset.text();
                extract_payload(&text).map(str::to_owned)
            };
            let payload = payload.ok_or_else(|| {
                ModuleError::new(format!("Chunk '{}' contains no loader payload", chunk))
            })?;
            asset.replace(payload);
            Ok(())
        });

        let child = nested.run_as_child().await?;

        if child.has_errors() {
            let err = SubBuildError::reported(child.errors());
            error!(%name, errors = child.errors().len(), "Sub-build failed");
            return Err(err);
        }

        let output_name = parent.asset_path(&options.stats_filename, &child.hash);
        let asset = child
            .asset(&output_name)
            .ok_or_else(|| SubBuildError::MissingOutput {
                name: output_name.clone(),
            })?;
        let result = SubBuildResult::from_json(&asset.text()).map_err(|source| {
            SubBuildError::InvalidOutput {
                name: output_name.clone(),
                source,
            }
        })?;

        info!(%name, output = %output_name, "Sub-build completed");
        Ok(SubBuildOutput {
            name: output_name,
            result,
        })
    }
}
