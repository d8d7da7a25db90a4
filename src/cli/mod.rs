//! Command-line interface for iconforge.
//!
//! Provides commands for building favicons once, rebuilding on logo
//! changes, and inspecting the persistent cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;

use crate::build::{Compiler, OutputOptions};
use crate::config::{self, Overrides, ResolvedBuildConfig};
use crate::core::{CacheStatus, PersistentCache};
use crate::domain::Fingerprint;
use crate::plugin::FaviconsPlugin;

/// iconforge - favicon builds with a persistent result cache
#[derive(Parser, Debug)]
#[command(name = "iconforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build favicons once
    Build(BuildArgs),

    /// Build, then rebuild whenever the logo changes
    Watch(BuildArgs),

    /// Report the state of the persistent cache for the given options
    Cache(BuildArgs),
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Source image
    #[arg(short, long)]
    pub logo: Option<PathBuf>,

    /// Output directory [default: dist]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (discovered from .iconforge/config.yaml if not given)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Prefix template for generated files
    #[arg(long)]
    pub prefix: Option<String>,

    /// Output name template for the result manifest
    #[arg(long)]
    pub stats_filename: Option<String>,

    /// Keep the result manifest in the output
    #[arg(long)]
    pub emit_stats: bool,

    /// Always rebuild, never read or write the cache file
    #[arg(long)]
    pub no_persistent_cache: bool,

    /// App name baked into the manifest
    #[arg(long)]
    pub title: Option<String>,

    /// Background color
    #[arg(long)]
    pub background: Option<String>,

    /// URL prefix the output directory is served under
    #[arg(long)]
    pub public_path: Option<String>,
}

impl BuildArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            logo: self.logo.clone(),
            output: self.output.clone(),
            public_path: self.public_path.clone(),
            prefix: self.prefix.clone(),
            stats_filename: self.stats_filename.clone(),
            emit_stats: self.emit_stats,
            no_persistent_cache: self.no_persistent_cache,
            title: self.title.clone(),
            background: self.background.clone(),
        }
    }

    fn resolve(&self) -> Result<ResolvedBuildConfig> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        let resolved = config::resolve(&cwd, self.config.as_deref(), &self.overrides())?;
        if let Some(path) = &resolved.config_file {
            tracing::debug!("Using config file {}", path.display());
        }
        Ok(resolved)
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Build(args) => build(&args).await,
            Commands::Watch(args) => watch(&args).await,
            Commands::Cache(args) => show_cache(&args).await,
        }
    }
}

fn compiler_for(config: &ResolvedBuildConfig) -> Result<Compiler> {
    let plugin = FaviconsPlugin::new(config.options.clone())?;
    let output = OutputOptions::new(&config.output).with_public_path(&config.public_path);
    Ok(Compiler::new(&config.context, output).with_plugin(Arc::new(plugin)))
}

async fn run_once(compiler: &Compiler) -> Result<()> {
    let stats = compiler.run().await?;

    for asset in &stats.assets {
        println!("  {}", asset);
    }
    eprintln!(
        "\n[Build {} wrote {} assets to {} in {}ms]",
        stats.id,
        stats.assets.len(),
        compiler.output().path.display(),
        stats.duration_ms
    );
    Ok(())
}

async fn build(args: &BuildArgs) -> Result<()> {
    let config = args.resolve()?;
    let compiler = compiler_for(&config)?;
    run_once(&compiler).await
}

async fn watch(args: &BuildArgs) -> Result<()> {
    let config = args.resolve()?;
    let compiler = compiler_for(&config)?;
    let logo = config.options.logo.clone();

    if let Err(e) = run_once(&compiler).await {
        eprintln!("\n[Build failed: {:#}]", e);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut debouncer = new_debouncer(Duration::from_millis(300), move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })?;
    let watch_dir = logo.parent().unwrap_or(Path::new("."));
    debouncer
        .watcher()
        .watch(watch_dir, RecursiveMode::NonRecursive)?;

    tracing::info!("Watching {} for changes", logo.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Watcher stopping...");
                break;
            }
            event = rx.recv() => match event {
                Some(Ok(events)) => {
                    if !events.iter().any(|event| is_same_file(&event.path, &logo)) {
                        continue;
                    }
                    tracing::info!("Logo changed, rebuilding");
                    if let Err(e) = run_once(&compiler).await {
                        eprintln!("\n[Build failed: {:#}]", e);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("Watcher error: {:?}", e);
                }
                None => {
                    tracing::error!("Watcher channel disconnected");
                    break;
                }
            }
        }
    }

    Ok(())
}

fn is_same_file(event_path: &Path, logo: &Path) -> bool {
    if event_path == logo {
        return true;
    }
    match (event_path.canonicalize(), logo.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => event_path.file_name() == logo.file_name(),
    }
}

async fn show_cache(args: &BuildArgs) -> Result<()> {
    let config = args.resolve()?;
    let logo = &config.options.logo;
    let bytes = tokio::fs::read(logo)
        .await
        .with_context(|| format!("Failed to read logo: {}", logo.display()))?;
    let input = Fingerprint::of(&bytes);
    let cache = PersistentCache::new(&config.output);

    println!("Input: {}", input);
    println!(
        "Cache file: {}",
        cache.cache_file_path(&input, &config.options).display()
    );

    match cache.inspect(&input, &config.options).await? {
        CacheStatus::Disabled => println!("Status: disabled"),
        CacheStatus::Missing => println!("Status: missing"),
        CacheStatus::Valid(result) => {
            println!("Status: valid");
            println!("{}", serde_json::to_string_pretty(result.value())?);
        }
        CacheStatus::Stale(reasons) => {
            println!("Status: stale");
            for reason in reasons {
                println!("  - {}", reason);
            }
        }
        CacheStatus::Corrupt(error) => println!("Status: corrupt ({})", error),
    }

    Ok(())
}
