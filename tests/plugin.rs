//! Plugin Integration Tests
//!
//! End-to-end builds through the Compiler: cache hits skip the sub-build,
//! stats emission, and recovery from bad cache files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use iconforge::adapters::{
    GenerateRequest, GeneratedFile, GeneratedIcons, IconGenerator, Loader, LoaderContext,
};
use iconforge::build::{Compiler, ModuleError, OutputOptions};
use iconforge::core::{wrap_payload, PersistentCache, SubBuildOrchestrator};
use iconforge::domain::{CacheRecord, Fingerprint, ProcessingOptions, SubBuildResult};
use iconforge::{ConfigError, FaviconsPlugin};
use serde_json::json;
use tempfile::TempDir;

/// Generator writing a marker file next to the favicon
#[derive(Default)]
struct MarkerGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl IconGenerator for MarkerGenerator {
    fn name(&self) -> &str {
        "marker"
    }

    async fn generate(&self, source: &[u8], _request: &GenerateRequest) -> anyhow::Result<GeneratedIcons> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedIcons {
            images: vec![GeneratedFile::new("favicon.png", source.to_vec())],
            files: vec![GeneratedFile::new("marker.txt", "generated")],
            html: vec![r#"<link rel="icon" href="favicon.png">"#.to_string()],
        })
    }
}

impl MarkerGenerator {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Loader returning valid JSON that is not in canonical form
struct RawJsonLoader;

#[async_trait]
impl Loader for RawJsonLoader {
    fn name(&self) -> &str {
        "raw-json"
    }

    async fn load(&self, _ctx: &mut LoaderContext, _source: &[u8]) -> Result<String, ModuleError> {
        Ok(wrap_payload(r#"{"html": [], "files": []}"#))
    }
}

struct Project {
    temp: TempDir,
    generator: Arc<MarkerGenerator>,
}

impl Project {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("logo.png"), b"\x89PNG test logo").unwrap();
        Self {
            temp,
            generator: Arc::new(MarkerGenerator::default()),
        }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn output(&self) -> PathBuf {
        self.root().join("dist")
    }

    fn options(&self) -> ProcessingOptions {
        ProcessingOptions::new(self.root().join("logo.png"))
    }

    fn input(&self) -> Fingerprint {
        Fingerprint::of(b"\x89PNG test logo")
    }

    /// Run a build with a fresh Compiler, as a separate process would
    async fn build(&self, plugin: FaviconsPlugin) -> anyhow::Result<Vec<String>> {
        let compiler = Compiler::new(self.root(), OutputOptions::new(self.output()))
            .with_plugin(Arc::new(plugin));
        Ok(compiler.run().await?.assets)
    }

    fn plugin(&self, options: ProcessingOptions) -> FaviconsPlugin {
        FaviconsPlugin::with_generator(options, self.generator.clone()).unwrap()
    }

    fn cache_file(&self, options: &ProcessingOptions) -> PathBuf {
        PersistentCache::new(self.output()).cache_file_path(&self.input(), options)
    }

    /// Every file below the output directory with its contents
    fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut dirs = vec![self.output()];
        while let Some(dir) = dirs.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    dirs.push(path);
                } else {
                    let contents = std::fs::read(&path).unwrap();
                    files.insert(path.strip_prefix(self.output()).unwrap().to_path_buf(), contents);
                }
            }
        }
        files
    }
}

#[tokio::test]
async fn test_first_build_writes_icons_and_cache_file() {
    let project = Project::new();

    let assets = project.build(project.plugin(project.options())).await.unwrap();

    let prefix = format!("icons-{}/", project.input());
    assert!(assets.contains(&format!("{}favicon.png", prefix)));
    assert!(assets.contains(&format!("{}marker.txt", prefix)));
    assert!(assets.contains(&format!("{}.cache", prefix)));
    // Stats are dropped unless requested
    assert!(!assets.iter().any(|name| name.starts_with("iconstats-")));
    assert!(project.cache_file(&project.options()).exists());
}

#[tokio::test]
async fn test_second_build_is_cache_hit() {
    let project = Project::new();

    project.build(project.plugin(project.options())).await.unwrap();
    let first = project.snapshot();
    project.build(project.plugin(project.options())).await.unwrap();

    assert_eq!(project.generator.calls(), 1);
    assert_eq!(project.snapshot(), first);
}

#[tokio::test]
async fn test_prepopulated_cache_skips_sub_build() {
    let project = Project::new();
    let options = project.options().with_emit_stats(true);
    let stored = SubBuildResult::new(json!({
        "outputFilePrefix": format!("icons-{}/", project.input()),
        "html": ["<link rel=\"icon\" href=\"favicon.png\">"],
        "files": []
    }));
    let record = CacheRecord {
        hash: project.input(),
        version: iconforge::core::TOOL_VERSION.to_string(),
        option_hash: Fingerprint::of_canonical(&options).unwrap(),
        result: stored.clone(),
    };
    let cache_file = project.cache_file(&options);
    std::fs::create_dir_all(cache_file.parent().unwrap()).unwrap();
    std::fs::write(&cache_file, serde_json::to_vec(&record).unwrap()).unwrap();

    let plugin = Arc::new(project.plugin(options));
    let compiler = Compiler::new(project.root(), OutputOptions::new(project.output()))
        .with_plugin(plugin.clone());
    let assets = compiler.run().await.unwrap().assets;

    assert_eq!(project.generator.calls(), 0);
    assert!(!project
        .output()
        .join(format!("icons-{}/marker.txt", project.input()))
        .exists());

    let output = plugin.output().unwrap();
    assert!(output.from_cache);
    assert_eq!(output.result, stored);
    assert_eq!(assets, vec![output.stats_asset.clone()]);
    let written = std::fs::read_to_string(project.output().join(&output.stats_asset)).unwrap();
    assert_eq!(written, stored.to_canonical_json().unwrap());
}

#[tokio::test]
async fn test_emit_stats_keeps_manifest() {
    let project = Project::new();
    let options = project
        .options()
        .with_emit_stats(true)
        .with_persistent_cache(false)
        .with_stats_filename("iconstats.json");

    let assets = project.build(project.plugin(options)).await.unwrap();

    assert!(assets.contains(&"iconstats.json".to_string()));
    assert!(!assets.iter().any(|name| name.ends_with(".cache")));
    let stats: serde_json::Value =
        serde_json::from_slice(&std::fs::read(project.output().join("iconstats.json")).unwrap()).unwrap();
    assert_eq!(stats["outputFilePrefix"], format!("icons-{}/", project.input()));
}

#[tokio::test]
async fn test_changed_options_rebuild() {
    let project = Project::new();

    project.build(project.plugin(project.options())).await.unwrap();
    project
        .build(project.plugin(project.options().with_title("Renamed")))
        .await
        .unwrap();

    assert_eq!(project.generator.calls(), 2);
}

#[tokio::test]
async fn test_tool_upgrade_rebuilds() {
    let project = Project::new();

    project
        .build(project.plugin(project.options()).with_tool_version("0.0.0-old"))
        .await
        .unwrap();
    project.build(project.plugin(project.options())).await.unwrap();

    assert_eq!(project.generator.calls(), 2);
}

#[tokio::test]
async fn test_corrupt_cache_file_is_rebuilt() {
    let project = Project::new();
    let cache_file = project.cache_file(&project.options());
    std::fs::create_dir_all(cache_file.parent().unwrap()).unwrap();
    std::fs::write(&cache_file, "not json").unwrap();

    project.build(project.plugin(project.options())).await.unwrap();

    assert_eq!(project.generator.calls(), 1);
    let record: CacheRecord = serde_json::from_slice(&std::fs::read(&cache_file).unwrap()).unwrap();
    assert_eq!(record.hash, project.input());
}

#[tokio::test]
async fn test_unreadable_cache_fails_build() {
    let project = Project::new();
    std::fs::create_dir_all(project.cache_file(&project.options())).unwrap();

    let err = project
        .build(project.plugin(project.options()))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Persistent cache is unreadable"));
    assert_eq!(project.generator.calls(), 0);
}

#[tokio::test]
async fn test_two_plugins_share_a_logo() {
    let project = Project::new();
    let first = project.plugin(project.options().with_prefix("a-[hash]/").with_persistent_cache(false));
    let second = project.plugin(project.options().with_prefix("b-[hash]/").with_persistent_cache(false));
    let compiler = Compiler::new(project.root(), OutputOptions::new(project.output()))
        .with_plugin(Arc::new(first))
        .with_plugin(Arc::new(second));

    for _ in 0..10 {
        let assets = compiler.run().await.unwrap().assets;

        assert!(assets.contains(&format!("a-{}/favicon.png", project.input())));
        assert!(assets.contains(&format!("b-{}/favicon.png", project.input())));
    }
}

#[tokio::test]
async fn test_stats_dropped_for_non_canonical_loader_output() {
    let project = Project::new();
    let options = project.options().with_persistent_cache(false);
    let orchestrator = SubBuildOrchestrator::with_loader(Arc::new(RawJsonLoader));
    let plugin = FaviconsPlugin::with_orchestrator(options.clone(), orchestrator).unwrap();

    let assets = project.build(plugin).await.unwrap();
    assert!(assets.is_empty(), "unexpected assets: {:?}", assets);

    let orchestrator = SubBuildOrchestrator::with_loader(Arc::new(RawJsonLoader));
    let plugin = Arc::new(FaviconsPlugin::with_orchestrator(options.with_emit_stats(true), orchestrator).unwrap());
    let compiler = Compiler::new(project.root(), OutputOptions::new(project.output()))
        .with_plugin(plugin.clone());
    let assets = compiler.run().await.unwrap().assets;

    let stats = plugin.output().unwrap().stats_asset;
    assert_eq!(assets, vec![stats.clone()]);
    assert_eq!(
        std::fs::read_to_string(project.output().join(&stats)).unwrap(),
        r#"{"html": [], "files": []}"#
    );
}

#[test]
fn test_missing_logo_is_config_error() {
    let result = FaviconsPlugin::new(ProcessingOptions::new(""));
    assert!(matches!(result, Err(ConfigError::MissingInput)));

    let result = FaviconsPlugin::new(ProcessingOptions::new("/no/such/logo.png"));
    assert!(matches!(result, Err(ConfigError::InputNotFound(_))));
}
