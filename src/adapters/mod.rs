//! Adapter interfaces for the transform chain.
//!
//! A `Loader` turns an entry resource into module source inside a nested
//! run. An `IconGenerator` is the image backend the icon loader delegates
//! rasterization to.

pub mod generator;
pub mod icons;

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::build::{Asset, AssetMap, ModuleError};
use crate::domain::IconPlatforms;

pub use generator::PassthroughGenerator;
pub use icons::{IconLoader, IconLoaderParams, IconManifest};

/// Per-module state handed to a loader
#[derive(Debug)]
pub struct LoaderContext {
    resource: PathBuf,
    params: serde_json::Value,
    public_path: String,
    emitted: AssetMap,
    errors: Vec<ModuleError>,
}

impl LoaderContext {
    pub fn new(resource: PathBuf, params: serde_json::Value, public_path: String) -> Self {
        Self {
            resource,
            params,
            public_path,
            emitted: AssetMap::new(),
            errors: Vec::new(),
        }
    }

    /// Absolute path of the resource being loaded
    pub fn resource(&self) -> &Path {
        &self.resource
    }

    /// Public path of the enclosing build
    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Deserialize the entry's loader parameters
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, ModuleError> {
        serde_json::from_value(self.params.clone())
            .map_err(|e| ModuleError::new("Invalid loader parameters").with_cause(e.to_string()))
    }

    /// Add a file to the nested run's output
    pub fn emit_file(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.emitted.insert(name, Asset::new(contents));
    }

    /// Report an error without aborting the loader
    pub fn emit_error(&mut self, error: ModuleError) {
        self.errors.push(error);
    }

    pub fn emitted(&self) -> &AssetMap {
        &self.emitted
    }

    pub(crate) fn into_parts(self) -> (AssetMap, Vec<ModuleError>) {
        (self.emitted, self.errors)
    }
}

/// Transform step run over an entry resource
#[async_trait]
pub trait Loader: Send + Sync {
    /// Identifier used in module cache keys
    fn name(&self) -> &str;

    /// Produce module source from the resource bytes
    async fn load(&self, ctx: &mut LoaderContext, source: &[u8]) -> Result<String, ModuleError>;
}

/// What to generate from a source image
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// File name of the source image
    pub source_name: String,
    pub app_name: Option<String>,
    pub background: Option<String>,
    pub icons: IconPlatforms,
}

/// One generated output file, named relative to the icon prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl GeneratedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Everything a generator produced
#[derive(Debug, Clone, Default)]
pub struct GeneratedIcons {
    pub images: Vec<GeneratedFile>,
    pub files: Vec<GeneratedFile>,
    /// Markup referencing the generated files by bare name
    pub html: Vec<String>,
}

/// Image backend
#[async_trait]
pub trait IconGenerator: Send + Sync {
    /// Human-readable generator name
    fn name(&self) -> &str;

    /// Generate icons from the source image bytes
    async fn generate(&self, source: &[u8], request: &GenerateRequest) -> Result<GeneratedIcons>;
}
