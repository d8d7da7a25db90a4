//! Processing options for a single favicon build.
//!
//! Options are plain values: two options are interchangeable for caching
//! purposes iff their canonical serialization is byte-identical.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Configuration for one plugin instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    /// Source image the icons are derived from
    pub logo: PathBuf,

    /// Prefix template for generated files (`[hash]` = input fingerprint)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Keep the result manifest in the final output
    #[serde(default)]
    pub emit_stats: bool,

    /// Output name template for the result manifest (`[hash]` = nested run hash)
    #[serde(default = "default_stats_filename")]
    pub stats_filename: String,

    /// Reuse results stored next to the build output
    #[serde(default = "default_persistent_cache")]
    pub persistent_cache: bool,

    /// Display name baked into the generated manifest
    #[serde(default)]
    pub title: Option<String>,

    /// Background color for platforms that need one
    #[serde(default)]
    pub background: Option<String>,

    /// Which icon families to generate
    #[serde(default)]
    pub icons: IconPlatforms,
}

fn default_prefix() -> String {
    "icons-[hash]/".to_string()
}
fn default_stats_filename() -> String {
    "iconstats-[hash].json".to_string()
}
fn default_persistent_cache() -> bool {
    true
}

impl ProcessingOptions {
    /// Options for `logo` with every other field at its default
    pub fn new(logo: impl Into<PathBuf>) -> Self {
        Self {
            logo: logo.into(),
            prefix: default_prefix(),
            emit_stats: false,
            stats_filename: default_stats_filename(),
            persistent_cache: default_persistent_cache(),
            title: None,
            background: None,
            icons: IconPlatforms::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_stats_filename(mut self, stats_filename: impl Into<String>) -> Self {
        self.stats_filename = stats_filename.into();
        self
    }

    pub fn with_emit_stats(mut self, emit_stats: bool) -> Self {
        self.emit_stats = emit_stats;
        self
    }

    pub fn with_persistent_cache(mut self, persistent_cache: bool) -> Self {
        self.persistent_cache = persistent_cache;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    pub fn with_icons(mut self, icons: IconPlatforms) -> Self {
        self.icons = icons;
        self
    }

    /// Source image path
    pub fn logo(&self) -> &Path {
        &self.logo
    }

    /// Check the options before any build work starts.
    ///
    /// A relative logo can only be checked once the build context is known;
    /// see [`validate_in`](Self::validate_in). Configuration errors are fatal
    /// and never retried.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check(None)
    }

    /// Like [`validate`](Self::validate), resolving a relative logo against
    /// `context`, the directory builds read it from
    pub fn validate_in(&self, context: &Path) -> Result<(), ConfigError> {
        self.check(Some(context))
    }

    fn check(&self, context: Option<&Path>) -> Result<(), ConfigError> {
        if self.logo.as_os_str().is_empty() {
            return Err(ConfigError::MissingInput);
        }
        let logo = match context {
            Some(context) => context.join(&self.logo),
            None => self.logo.clone(),
        };
        if logo.is_absolute() && !logo.exists() {
            return Err(ConfigError::InputNotFound(logo));
        }
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate { field: "prefix" });
        }
        if self.stats_filename.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate {
                field: "stats_filename",
            });
        }
        Ok(())
    }
}

/// Icon families handed to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconPlatforms {
    #[serde(default = "enabled")]
    pub android: bool,
    #[serde(default = "enabled")]
    pub apple_icon: bool,
    #[serde(default = "enabled")]
    pub apple_startup: bool,
    #[serde(default = "enabled")]
    pub coast: bool,
    #[serde(default = "enabled")]
    pub favicons: bool,
    #[serde(default = "enabled")]
    pub firefox: bool,
    #[serde(default = "enabled")]
    pub opengraph: bool,
    #[serde(default = "enabled")]
    pub twitter: bool,
    #[serde(default = "enabled")]
    pub windows: bool,
    #[serde(default = "enabled")]
    pub yandex: bool,
}

fn enabled() -> bool {
    true
}

impl Default for IconPlatforms {
    fn default() -> Self {
        Self {
            android: true,
            apple_icon: true,
            apple_startup: true,
            coast: true,
            favicons: true,
            firefox: true,
            opengraph: true,
            twitter: true,
            windows: true,
            yandex: true,
        }
    }
}

impl IconPlatforms {
    /// Names of the enabled families, in declaration order
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("android", self.android),
            ("appleIcon", self.apple_icon),
            ("appleStartup", self.apple_startup),
            ("coast", self.coast),
            ("favicons", self.favicons),
            ("firefox", self.firefox),
            ("opengraph", self.opengraph),
            ("twitter", self.twitter),
            ("windows", self.windows),
            ("yandex", self.yandex),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}
