use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nekoview")]
#[command(author, version, about = "Fetch random images from online galleries")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one random image and save it
    Fetch {
        /// Source id (defaults to the saved source, then the first one)
        #[arg(short, long)]
        source: Option<String>,

        /// Content filter: block, allow_mixed or only_nsfw
        #[arg(long, value_parser = ["block", "allow_mixed", "only_nsfw"])]
        nsfw: Option<String>,

        /// Image file (e.g. out.png) or directory to save into (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Keep fetching on the auto-reload interval until interrupted
    Watch {
        /// Seconds between reloads (saved to preferences)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Directory to save every loaded image into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available sources
    Sources,

    /// Read or change saved preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Print every preference, or a single key
    Get {
        key: Option<String>,
    },

    /// Set a preference
    Set {
        key: String,
        value: String,
    },
}
