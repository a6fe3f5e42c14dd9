use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Install, activate and compare versions of a command-line tool
#[derive(Debug, Parser)]
#[command(name = "cvm", version, about)]
pub struct Cli {
    /// Mirror debug logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Activate a version, alias, constraint or `latest`; without a token
    /// the project marker file is read
    Use { token: Option<String> },

    /// Download a release into the versions directory
    Install {
        /// X.Y.Z or `latest`
        version: String,

        /// Expected SHA-256 of the downloaded binary
        #[arg(long)]
        sha256: Option<String>,

        /// Reinstall even if the version is already present
        #[arg(long)]
        force: bool,
    },

    /// List installed versions
    List,

    /// Delete an installed version
    Remove { version: String },

    /// Delete every installed version
    Clear,

    /// Manage version aliases
    #[command(subcommand)]
    Alias(AliasCommand),

    /// Register a local binary as a named pseudo-version
    Link {
        #[arg(long)]
        from: PathBuf,

        #[arg(long)]
        name: String,
    },

    /// Run the same command against two versions and diff the output
    Compare {
        left: String,
        right: String,

        #[arg(long, value_enum, default_value_t = DiffFormat::Table)]
        format: DiffFormat,

        /// Arguments passed to both versions, after `--`
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Time the same command across comma-separated versions
    Benchmark {
        versions: String,

        /// Runs per version; a trailing `--iterations N` after `--` works too
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        iterations: Option<u32>,

        /// Arguments passed to every version, after `--`
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Show, summarize, clear or replay recorded invocations
    #[command(args_conflicts_with_subcommands = true)]
    History(HistoryArgs),

    /// Refuse to activate a version
    Block { version: String },

    /// Allow a blocked version again
    Unblock { version: String },

    /// List blocked versions
    ListBlocked,

    /// Print the active version
    Current,

    /// Diagnose the installation
    HealthCheck,

    /// Print effective paths and settings
    Config,
}

#[derive(Debug, Subcommand)]
pub enum AliasCommand {
    /// Point an alias at an installed version
    Set {
        name: String,
        version: String,

        #[arg(long)]
        description: Option<String>,
    },
    Get {
        name: String,
    },
    Remove {
        name: String,
    },
    List,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DiffFormat {
    #[default]
    Table,
    Unified,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub action: Option<HistoryCommand>,

    /// `!<id>` replays that entry
    pub entry: Option<String>,

    /// Show only the most recent N entries
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, conflicts_with = "clear")]
    pub stats: bool,

    #[arg(long)]
    pub clear: bool,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Re-run an entry on its recorded version
    Replay { id: String },

    /// Endpoint the shim calls after each invocation
    #[command(hide = true)]
    Record(RecordArgs),
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[arg(long)]
    pub version: String,

    #[arg(long, allow_hyphen_values = true)]
    pub exit_code: i32,

    #[arg(long)]
    pub duration_ms: u64,

    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub stdout: String,

    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub stderr: String,

    #[arg(last = true)]
    pub command: Vec<String>,
}
