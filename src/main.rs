//! Copysubs - Subtitle Placement for Finished Downloads
//!
//! Entry point used by the download client's completion hook: finds the best
//! subtitle folder for every video folder of a download and copies the
//! subtitles next to the videos.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use copysubs::cli::{Args, Commands, ConfigAction};
use copysubs::config::Config;
use copysubs::events::JsonLinesSink;
use copysubs::selector::Selection;
use copysubs::workflow::{DeclaredFile, DownloadFinished, Workflow};

const DEFAULT_CONFIG: &str = "copysubs.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = if config_path.exists() {
        info!("Loading configuration from {}", config_path.display());
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };

    match args.command {
        Commands::Process {
            location,
            download_id,
            files,
            manifest,
            events,
        } => {
            let mut declared: Vec<DeclaredFile> = files.into_iter().map(|path| DeclaredFile { path }).collect();
            if let Some(manifest) = manifest {
                declared.extend(read_manifest(&manifest)?);
            }
            if declared.is_empty() {
                anyhow::bail!("No declared files: pass --file or --manifest");
            }

            let mut workflow = Workflow::new(config)?;
            if let Some(events) = events {
                workflow = workflow.with_sink(Arc::new(JsonLinesSink::new(events)));
            }

            let download = DownloadFinished {
                download_id: download_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                location,
                files: declared,
            };

            let results = workflow.handle_download(&download).await?;
            let copied: usize = results.iter().map(|event| event.path_pairs.len()).sum();
            info!(
                "Download {}: {} folder(s) processed, {} file(s) copied",
                download.download_id,
                results.len(),
                copied
            );
        }
        Commands::Inspect { folder } => {
            let workflow = Workflow::new(config)?;

            match workflow.select(&folder) {
                Selection::AlreadySatisfied { .. } => {
                    println!("{}: subtitles already present, nothing to do", folder.display());
                }
                Selection::NoCandidate => {
                    println!("{}: no folder with subtitles found", folder.display());
                }
                Selection::Candidate(_) => {
                    println!("\nCandidates for {} (best first):", folder.display());
                    println!("{:<16} {:<60}", "Score", "Folder");
                    println!("{}", "-".repeat(76));
                    for candidate in workflow.rank(&folder) {
                        println!("{:<16} {:<60}", candidate.score.to_string(), candidate.folder.display().to_string());
                        for file in &candidate.files {
                            println!("{:<16}   {} [{}]", "", file.file_name, file.label.as_deref().unwrap_or("-"));
                        }
                    }
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                for (key, value) in config.get_entries()? {
                    println!("{} = {}", key, value);
                }
            }
            ConfigAction::Set { entries } => {
                let updates = parse_entries(&entries)?;
                let updated = config.set_entries(&updates)?;
                updated.save_to_file(&config_path)?;
                info!("Saved {} setting(s) to {}", updates.len(), config_path.display());
            }
        },
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".copysubs").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "copysubs.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn read_manifest(path: &Path) -> Result<Vec<DeclaredFile>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse manifest {}", path.display()))
}

fn parse_entries(entries: &[String]) -> Result<BTreeMap<String, String>> {
    entries
        .iter()
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("Expected key=value, got '{}'", entry))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}
