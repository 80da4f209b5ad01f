use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "subbrain")]
#[command(about = "Control panel for a remote Subgen instance", long_about = None)]
pub struct Cli {
    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control-panel service URL (overrides config and SUBBRAIN_PANEL_URL)
    #[arg(long, global = true)]
    pub panel: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the candidate addresses and list what answers
    Discover {
        /// Probe candidates from this machine instead of through the panel
        #[arg(long)]
        direct: bool,

        /// Make the first working candidate the active endpoint
        #[arg(long)]
        select: bool,

        /// Extra candidate addresses (direct mode only)
        #[arg(long = "candidate")]
        candidates: Vec<String>,
    },

    /// Probe a single address without selecting it
    Test { url: String },

    /// Probe an address and make it the active endpoint if it answers
    Connect { url: String },

    /// Forget the active endpoint for this run
    Disconnect,

    /// Show the active endpoint and its health
    Status {
        /// Keep polling and print every change
        #[arg(short, long)]
        watch: bool,
    },

    /// Inspect and change engine settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Show recent log lines
    Logs {
        /// engine or local
        #[arg(short, long, default_value = "engine")]
        source: String,

        /// Case-insensitive substring filter
        #[arg(short, long)]
        filter: Option<String>,

        /// Keep tailing until interrupted
        #[arg(long)]
        follow: bool,

        /// Write the filtered view into this directory
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Show the panel host's hardware profile
    Hardware,

    /// Show tuning recommendations for the detected hardware
    Recommendations,

    /// Show which host platform the panel runs on
    Platform,

    /// List per-language decoding profiles, or show one
    Languages {
        /// Language code such as en or ja
        code: Option<String>,
    },

    /// Start a library scan on the active engine
    Scan {
        /// smart, forward or reverse
        #[arg(short, long, default_value = "smart")]
        kind: String,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings
    Show {
        /// Raw JSON instead of a field listing
        #[arg(long)]
        json: bool,
    },

    /// Replace one field and save
    Set { field: String, value: String },

    /// Custom environment entries
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// Path mapping between host and engine container
    Paths {
        #[command(subcommand)]
        command: PathsCommand,
    },

    /// Print the settings the panel suggests for its hardware
    Defaults {
        /// Raw JSON instead of a field listing
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Add or overwrite an entry and save
    Set { key: String, value: String },
    /// Remove an entry and save
    Unset { key: String },
}

#[derive(Subcommand)]
pub enum PathsCommand {
    /// Syntactic check of a mapping, no network
    Check { host: String, container: String },

    /// Ask the panel whether the container path exists.
    /// Without arguments the saved mapping is tested.
    Test {
        host: Option<String>,
        container: Option<String>,
    },

    /// Adopt the panel's suggested mapping and save
    Detect {
        /// Only show the suggestion
        #[arg(long)]
        dry_run: bool,
    },

    /// Set the mapping and save
    Set {
        host: String,
        container: String,

        /// Also enable path mapping
        #[arg(long)]
        enable: bool,
    },
}
