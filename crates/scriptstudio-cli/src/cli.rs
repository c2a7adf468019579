use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use scriptstudio_core::Collection;

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Manage ScriptStudio records offline and sync them when connected")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// JSON file with sync settings (environment variables are used otherwise)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Never contact the remote API; writes are queued
    #[arg(long, global = true)]
    pub offline: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a record
    #[command(alias = "new")]
    Create {
        /// Target collection
        collection: Collection,
        /// Field assignment `key=value`; values parse as JSON, else as text
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// List records of a collection
    List {
        /// Target collection
        collection: Collection,
        /// Sort field, `-field` for descending
        #[arg(short, long, default_value = "-updated_date", allow_hyphen_values = true)]
        sort: String,
        /// Number of records to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one record
    Get {
        collection: Collection,
        /// Record ID
        id: String,
    },
    /// Merge field changes into a record
    #[command(alias = "edit")]
    Update {
        collection: Collection,
        /// Record ID
        id: String,
        /// Field assignment `key=value`; values parse as JSON, else as text
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Delete a record
    Delete {
        collection: Collection,
        /// Record ID
        id: String,
    },
    /// Replay queued mutations against the remote API
    Sync {
        /// Keep running and replay on reconnect and on a timer until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Show queued mutations
    Queue,
    /// Re-arm queued mutations that exhausted their retries
    RetryFailed,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
