//! Build configuration.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags
//! 2. Environment variables (ICONFORGE_OUTPUT, ICONFORGE_PUBLIC_PATH)
//! 3. Config file (.iconforge/config.yaml)
//! 4. Defaults (output `dist`, empty public path)
//!
//! Config file discovery:
//! - Searches the current directory and its parents for .iconforge/config.yaml
//! - Paths in the config file are relative to the project root (the parent
//!   of .iconforge/)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{IconPlatforms, ProcessingOptions};

pub const CONFIG_DIR: &str = ".iconforge";
pub const CONFIG_FILE: &str = "config.yaml";

pub const ENV_OUTPUT: &str = "ICONFORGE_OUTPUT";
pub const ENV_PUBLIC_PATH: &str = "ICONFORGE_PUBLIC_PATH";

const DEFAULT_OUTPUT: &str = "dist";

/// Configuration errors. Fatal, raised before any build work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("An input file is required")]
    MissingInput,

    #[error("Input file path does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Option '{field}' must not be empty")]
    EmptyTemplate { field: &'static str },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    /// Output directory (relative to project root)
    pub output: Option<String>,
    pub public_path: Option<String>,
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Processing options as written in the config file; all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsConfig {
    /// Source image (relative to project root)
    pub logo: Option<String>,
    pub prefix: Option<String>,
    pub emit_stats: Option<bool>,
    pub stats_filename: Option<String>,
    pub persistent_cache: Option<bool>,
    pub title: Option<String>,
    pub background: Option<String>,
    pub icons: Option<IconPlatforms>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub logo: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub public_path: Option<String>,
    pub prefix: Option<String>,
    pub stats_filename: Option<String>,
    /// Only `true` overrides the file
    pub emit_stats: bool,
    /// Only `true` overrides the file
    pub no_persistent_cache: bool,
    pub title: Option<String>,
    pub background: Option<String>,
}

/// Fully resolved configuration for one build
#[derive(Debug, Clone)]
pub struct ResolvedBuildConfig {
    /// Directory relative resources resolve against
    pub context: PathBuf,
    /// Absolute output directory
    pub output: PathBuf,
    pub public_path: String,
    pub options: ProcessingOptions,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Project root for a config file: the parent of `.iconforge/`
fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent().and_then(Path::parent)
}

/// Resolve the build configuration from every source.
///
/// `explicit` is a config file given with `--config`; otherwise the file is
/// discovered upward from `cwd`. Options are validated.
pub fn resolve(
    cwd: &Path,
    explicit: Option<&Path>,
    overrides: &Overrides,
) -> Result<ResolvedBuildConfig, ConfigError> {
    resolve_with_env(cwd, explicit, overrides, |name| std::env::var(name).ok())
}

fn resolve_with_env(
    cwd: &Path,
    explicit: Option<&Path>,
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedBuildConfig, ConfigError> {
    let config_file = match explicit {
        Some(path) => Some(resolve_path(cwd, path)),
        None => find_config_file(cwd),
    };

    let (file, root) = match &config_file {
        Some(path) => {
            let file = load_config_file(path)?;
            let root = project_root(path).unwrap_or(cwd).to_path_buf();
            (Some(file), root)
        }
        None => (None, cwd.to_path_buf()),
    };
    let file_options = file
        .as_ref()
        .map(|f| f.options.clone())
        .unwrap_or_default();

    let logo = match (&overrides.logo, &file_options.logo) {
        (Some(logo), _) => resolve_path(cwd, logo),
        (None, Some(logo)) => resolve_path(&root, Path::new(logo)),
        (None, None) => PathBuf::new(),
    };

    let output = if let Some(output) = &overrides.output {
        resolve_path(cwd, output)
    } else if let Some(output) = env(ENV_OUTPUT) {
        resolve_path(cwd, Path::new(&output))
    } else if let Some(output) = file.as_ref().and_then(|f| f.output.as_deref()) {
        resolve_path(&root, Path::new(output))
    } else {
        root.join(DEFAULT_OUTPUT)
    };

    let public_path = overrides
        .public_path
        .clone()
        .or_else(|| env(ENV_PUBLIC_PATH))
        .or_else(|| file.as_ref().and_then(|f| f.public_path.clone()))
        .unwrap_or_default();

    let mut options = ProcessingOptions::new(logo);
    if let Some(prefix) = overrides.prefix.clone().or(file_options.prefix) {
        options.prefix = prefix;
    }
    if let Some(stats_filename) = overrides.stats_filename.clone().or(file_options.stats_filename) {
        options.stats_filename = stats_filename;
    }
    options.emit_stats = overrides.emit_stats || file_options.emit_stats.unwrap_or(false);
    options.persistent_cache =
        !overrides.no_persistent_cache && file_options.persistent_cache.unwrap_or(true);
    options.title = overrides.title.clone().or(file_options.title);
    options.background = overrides.background.clone().or(file_options.background);
    if let Some(icons) = file_options.icons {
        options.icons = icons;
    }

    options.validate_in(&root)?;

    Ok(ResolvedBuildConfig {
        context: root,
        output,
        public_path,
        options,
        config_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("assets")).unwrap();
        std::fs::write(temp.path().join("assets/logo.png"), b"png").unwrap();
        temp
    }

    fn write_config(root: &Path, body: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", body).unwrap();
        config_path
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = project();
        let config_path = write_config(
            temp.path(),
            r#"
version: "1.0"
output: build
public_path: /static/
options:
  logo: assets/logo.png
  prefix: "favicons/[hash:8]/"
  emit_stats: true
  icons:
    yandex: false
"#,
        );

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.output.as_deref(), Some("build"));
        assert_eq!(config.options.prefix.as_deref(), Some("favicons/[hash:8]/"));
        assert_eq!(config.options.emit_stats, Some(true));
        assert!(!config.options.icons.unwrap().yandex);
    }

    #[test]
    fn test_discovery_from_nested_directory() {
        let temp = project();
        let config_path = write_config(temp.path(), "version: \"1.0\"");
        let nested = temp.path().join("src/components");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file(&nested), Some(config_path));
    }

    #[test]
    fn test_resolve_paths_relative_to_project_root() {
        let temp = project();
        write_config(
            temp.path(),
            "version: \"1.0\"\noutput: build\noptions:\n  logo: assets/logo.png\n",
        );
        let nested = temp.path().join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let resolved = resolve_with_env(&nested, None, &Overrides::default(), no_env).unwrap();

        assert_eq!(resolved.context, temp.path());
        assert_eq!(resolved.output, temp.path().join("build"));
        assert_eq!(resolved.options.logo, temp.path().join("assets/logo.png"));
        assert!(resolved.options.persistent_cache);
        assert!(resolved.config_file.is_some());
    }

    #[test]
    fn test_flags_override_env_override_file() {
        let temp = project();
        write_config(
            temp.path(),
            "version: \"1.0\"\noutput: build\npublic_path: /file/\noptions:\n  logo: assets/logo.png\n  title: From File\n",
        );
        let env = |name: &str| match name {
            ENV_OUTPUT => Some("env-out".to_string()),
            ENV_PUBLIC_PATH => Some("/env/".to_string()),
            _ => None,
        };
        let overrides = Overrides {
            public_path: Some("/flag/".to_string()),
            title: Some("From Flag".to_string()),
            no_persistent_cache: true,
            ..Default::default()
        };

        let resolved = resolve_with_env(temp.path(), None, &overrides, env).unwrap();

        assert_eq!(resolved.output, temp.path().join("env-out"));
        assert_eq!(resolved.public_path, "/flag/");
        assert_eq!(resolved.options.title.as_deref(), Some("From Flag"));
        assert!(!resolved.options.persistent_cache);
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = project();
        let overrides = Overrides {
            logo: Some(PathBuf::from("assets/logo.png")),
            ..Default::default()
        };

        let resolved = resolve_with_env(temp.path(), None, &overrides, no_env).unwrap();

        assert_eq!(resolved.output, temp.path().join("dist"));
        assert_eq!(resolved.public_path, "");
        assert_eq!(resolved.options.prefix, "icons-[hash]/");
        assert!(resolved.config_file.is_none());
    }

    #[test]
    fn test_missing_logo_is_config_error() {
        let temp = project();
        let result = resolve_with_env(temp.path(), None, &Overrides::default(), no_env);
        assert!(matches!(result, Err(ConfigError::MissingInput)));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let temp = project();
        let config_path = write_config(temp.path(), "version: [unclosed");

        let result = load_config_file(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, Path::new("./subdir")),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, Path::new("/absolute/path")),
            PathBuf::from("/absolute/path")
        );
    }
}
