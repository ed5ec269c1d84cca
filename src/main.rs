mod cli;

use nekoview::{
    config::{self, Config, FilePreferenceStore, Preferences},
    fetch::{FetchEvent, FetchOrchestrator, Session},
    source::{FetchedImage, ProviderRegistry},
};
use nekoview_common::paths::is_image_file;
use nekoview_common::NsfwMode;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, PrefsAction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

const PREFERENCE_KEYS: [&str; 5] = [
    Preferences::NSFW_MODE,
    Preferences::SOURCE,
    Preferences::AUTO_RELOAD_ENABLED,
    Preferences::AUTO_RELOAD_INTERVAL,
    Preferences::E621_TAGS,
];

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "nekoview=debug,nekoview_common=debug".to_string()
        } else {
            "nekoview=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch {
            source,
            nsfw,
            output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(fetch_once(
                cli.config.as_deref(),
                source,
                nsfw,
                output,
            ))
        }
        Commands::Watch { interval, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(watch(cli.config.as_deref(), interval, output))
        }
        Commands::Sources => list_sources(cli.config.as_deref()),
        Commands::Prefs { action } => prefs(cli.config.as_deref(), action),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("nekoview {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load the config and open the preference file it points at.
fn open_preferences(config_path: Option<&Path>) -> Result<(Config, Preferences)> {
    let config = config::load_config_or_default(config_path)?;
    let path = config::preferences_path(&config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create preferences directory: {:?}", parent))?;
    }
    let store = FilePreferenceStore::open(&path, &Preferences::defaults())?;
    tracing::debug!("Using preferences at {:?}", path);
    Ok((config, Preferences::new(Arc::new(store))))
}

fn build_registry(config: &Config, prefs: &Preferences) -> Result<Arc<ProviderRegistry>> {
    let registry = ProviderRegistry::with_defaults(config, Some(prefs.clone()))?;
    Ok(Arc::new(registry))
}

async fn fetch_once(
    config_path: Option<&Path>,
    source: Option<String>,
    nsfw: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (config, prefs) = open_preferences(config_path)?;
    let registry = build_registry(&config, &prefs)?;

    let source = source.or_else(|| prefs.source());
    let mode = nsfw
        .as_deref()
        .map(NsfwMode::parse_lenient)
        .unwrap_or_else(|| prefs.nsfw_mode());

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    let mut orchestrator = FetchOrchestrator::new(registry, tx);
    orchestrator.request_fetch(source.as_deref(), mode);

    let completion = rx
        .recv()
        .await
        .context("Fetch task ended without reporting a result")?;

    match orchestrator.complete(completion) {
        Some(FetchEvent::Loaded(image)) => {
            let path = save_image(&image, output.as_deref())?;
            print_image(&image);
            println!("Saved: {}", path.display());
            Ok(())
        }
        Some(FetchEvent::Failed { source_id, error }) => {
            anyhow::bail!("Fetch from {} failed: {}", source_id, error)
        }
        _ => anyhow::bail!("Fetch did not complete"),
    }
}

async fn watch(
    config_path: Option<&Path>,
    interval: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (config, prefs) = open_preferences(config_path)?;
    let registry = build_registry(&config, &prefs)?;

    if let Some(dir) = &output {
        if is_image_file(dir) {
            anyhow::bail!("watch --output expects a directory, got an image path: {:?}", dir);
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    }

    let (session, handle) = Session::new(registry, prefs);
    let mut events = handle.subscribe();
    let session_task = tokio::spawn(session.run());

    if let Some(secs) = interval {
        handle.set_interval_secs(secs).await?;
    }
    handle.set_auto_reload(true).await?;
    handle.reload().await?;

    let snapshot = handle.snapshot().await?;
    println!(
        "Watching; reloading every {}s (Ctrl-C to stop)",
        snapshot.interval_secs
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(FetchEvent::Started { source_id }) => {
                    tracing::debug!("Fetching from {}", source_id);
                }
                Ok(FetchEvent::Loaded(image)) => {
                    print_image(&image);
                    if let Some(dir) = &output {
                        match save_image(&image, Some(dir)) {
                            Ok(path) => println!("Saved: {}", path.display()),
                            Err(e) => tracing::warn!("Failed to save image: {:#}", e),
                        }
                    }
                }
                Ok(FetchEvent::Failed { source_id, error }) => {
                    eprintln!("Fetch from {} failed: {}", source_id, error);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} fetch events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Ctrl-C stops the loop; the saved auto-reload flag is left untouched.
    handle.shutdown().await.ok();
    let _ = session_task.await;
    Ok(())
}

/// Save to `output`. A path with an image extension is used as the file
/// name; anything else is a directory (created if missing) that receives the
/// suggested filename.
fn save_image(image: &FetchedImage, output: Option<&Path>) -> Result<PathBuf> {
    let path = match output {
        Some(file) if is_image_file(file) && !file.is_dir() => file.to_path_buf(),
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
            dir.join(image.suggested_filename())
        }
        None => PathBuf::from(image.suggested_filename()),
    };
    image.save(&path)?;
    Ok(path)
}

fn print_image(image: &FetchedImage) {
    let result = &image.result;
    println!("Source: {}", result.source_id);
    println!("URL: {}", result.image_url);
    println!("Artist: {}", result.artist_label());
    if let Some(ref link) = result.source_link {
        println!("Link: {}", link);
    }
    println!("Size: {} bytes", image.bytes.len());
}

fn list_sources(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let registry = ProviderRegistry::with_defaults(&config, None)?;

    for source in registry.list() {
        println!("{:<10} {:<10} {}", source.id, source.display_name, source.description);
    }

    Ok(())
}

fn prefs(config_path: Option<&Path>, action: PrefsAction) -> Result<()> {
    let (_, prefs) = open_preferences(config_path)?;

    match action {
        PrefsAction::Get { key: Some(key) } => match prefs.get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Preference not set: {}", key),
        },
        PrefsAction::Get { key: None } => {
            for key in PREFERENCE_KEYS {
                match prefs.get(key) {
                    Some(value) => println!("{} = {}", key, value),
                    None => println!("{} (unset)", key),
                }
            }
        }
        PrefsAction::Set { key, value } => {
            set_preference(&prefs, &key, &value)?;
            if let Some(stored) = prefs.get(&key) {
                println!("{} = {}", key, stored);
            }
        }
    }

    Ok(())
}

fn set_preference(prefs: &Preferences, key: &str, value: &str) -> Result<()> {
    match key {
        Preferences::NSFW_MODE => {
            let mode = NsfwMode::ALL
                .into_iter()
                .find(|m| m.as_str() == value)
                .with_context(|| {
                    format!("Invalid nsfw_mode {:?}; expected block, allow_mixed or only_nsfw", value)
                })?;
            prefs.set_nsfw_mode(mode)
        }
        Preferences::SOURCE => prefs.set_source(value),
        Preferences::AUTO_RELOAD_ENABLED => {
            let enabled: bool = value
                .parse()
                .with_context(|| format!("Invalid boolean: {:?}", value))?;
            prefs.set_auto_reload_enabled(enabled)
        }
        Preferences::AUTO_RELOAD_INTERVAL => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("Invalid interval: {:?}", value))?;
            prefs.set_auto_reload_interval(secs).map(|_| ())
        }
        Preferences::E621_TAGS => prefs.set_e621_tags(value),
        other => anyhow::bail!("Unknown preference: {}", other),
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_config(&Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("  nekos.moe: {}", config.providers.nekos_moe.api_base);
    println!("  waifu.im: {}", config.providers.waifu_im.api_base);
    println!(
        "  e621: {} ({} req/s)",
        config.providers.e621.api_base, config.providers.e621.requests_per_second
    );
    println!(
        "  Timeouts: metadata {}s, download {}s",
        config.http.metadata_timeout_secs, config.http.download_timeout_secs
    );
    println!("  Preferences: {:?}", config::preferences_path(config));
}
