//! Icon loader: the transform adapter run inside the nested build.
//!
//! Generates icons from the logo, emits them under the resolved prefix and
//! returns the manifest describing them as a sentinel-wrapped JSON payload.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build::ModuleError;
use crate::core::payload::wrap_payload;
use crate::core::template::render_asset_path;
use crate::domain::{canonical_json, Fingerprint, IconPlatforms, ProcessingOptions, SubBuildResult};

use super::{GenerateRequest, IconGenerator, Loader, LoaderContext};

/// Parameters passed to the loader per entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconLoaderParams {
    /// Prefix template; `[hash]` resolves to the logo fingerprint
    pub output_file_prefix: String,
    pub icons: IconPlatforms,
    pub background: Option<String>,
    pub app_name: Option<String>,
}

impl From<&ProcessingOptions> for IconLoaderParams {
    fn from(options: &ProcessingOptions) -> Self {
        Self {
            output_file_prefix: options.prefix.clone(),
            icons: options.icons,
            background: options.background.clone(),
            app_name: options.title.clone(),
        }
    }
}

/// Result of an icon build: where the files went and how to reference them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconManifest {
    /// Resolved prefix every file lives under
    pub output_file_prefix: String,

    /// Markup for the document head, hrefs already prefixed
    pub html: Vec<String>,

    /// Output names of every emitted file
    pub files: Vec<String>,
}

impl TryFrom<&SubBuildResult> for IconManifest {
    type Error = serde_json::Error;

    fn try_from(result: &SubBuildResult) -> Result<Self, Self::Error> {
        serde_json::from_value(result.value().clone())
    }
}

/// Loader delegating image work to an `IconGenerator`
pub struct IconLoader {
    generator: Arc<dyn IconGenerator>,
}

impl IconLoader {
    pub fn new(generator: Arc<dyn IconGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Loader for IconLoader {
    fn name(&self) -> &str {
        "icon-loader"
    }

    async fn load(&self, ctx: &mut LoaderContext, source: &[u8]) -> Result<String, ModuleError> {
        let params: IconLoaderParams = ctx.params()?;
        let input = Fingerprint::of(source);
        let prefix = render_asset_path(&params.output_file_prefix, input.as_str());

        let request = GenerateRequest {
            source_name: ctx
                .resource()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            app_name: params.app_name.clone(),
            background: params.background.clone(),
            icons: params.icons,
        };

        debug!(generator = self.generator.name(), %prefix, "Generating icons");
        let generated = self
            .generator
            .generate(source, &request)
            .await
            .map_err(|e| {
                ModuleError::new(format!(
                    "Icon generation failed for {}",
                    ctx.resource().display()
                ))
                .with_cause(format!("{:#}", e))
            })?;

        let href_prefix = format!("href=\"{}{}", ctx.public_path(), prefix);
        let html = generated
            .html
            .iter()
            .filter(|tag| !tag.contains("manifest"))
            .map(|tag| tag.replace("href=\"", &href_prefix))
            .collect();

        let mut files = Vec::with_capacity(generated.images.len() + generated.files.len());
        for file in generated.images.into_iter().chain(generated.files) {
            let name = format!("{}{}", prefix, file.name);
            ctx.emit_file(name.clone(), file.contents);
            files.push(name);
        }

        let manifest = IconManifest {
            output_file_prefix: prefix,
            html,
            files,
        };
        let payload = canonical_json(&manifest)
            .map_err(|e| ModuleError::new("Failed to serialize icon manifest").with_cause(e.to_string()))?;

        Ok(wrap_payload(&payload))
    }
}
