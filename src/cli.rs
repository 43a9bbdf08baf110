use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy subtitles for a finished download
    Process {
        /// Directory the download was saved to
        #[arg(short, long)]
        location: PathBuf,

        /// Identifier of the download, reported back in events
        #[arg(short, long)]
        download_id: Option<String>,

        /// Declared file path, relative to the location (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// JSON file with the declared file list: [{"path": "..."}]
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Append copy-completed events to this JSON lines file
        #[arg(short, long)]
        events: Option<PathBuf>,
    },

    /// Show how subtitle sources for a video folder would be ranked
    Inspect {
        /// Folder containing the videos
        #[arg(short, long)]
        folder: PathBuf,
    },

    /// Read or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print every setting as key = value
    Show,

    /// Replace settings and save them to the config file
    Set {
        /// Settings as key=value, e.g. lang=en|eng|english
        #[arg(required = true)]
        entries: Vec<String>,
    },
}
