//! Clap derive structures for the `netdraw` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// netdraw -- headless client for collaborative network topology diagrams
#[derive(Debug, Parser)]
#[command(
    name = "netdraw",
    version,
    about = "Edit, replay and export network topology diagrams",
    long_about = "A headless client for the collaborative topology editor.\n\n\
        Joins a live topology session over WebSocket, replays recorded\n\
        test traces offline, and exports snapshots as YAML or JSON.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "NETDRAW_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "NETDRAW_SERVER", global = true)]
    pub server: Option<String>,

    /// Inventory id whose topology is edited
    #[arg(long, short = 'i', env = "NETDRAW_INVENTORY", global = true)]
    pub inventory: Option<u64>,

    /// API token
    #[arg(long, env = "NETDRAW_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NETDRAW_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "NETDRAW_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "NETDRAW_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Also write JSON logs to this file
    #[arg(long, env = "NETDRAW_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Join a live topology session and follow it until Ctrl-C
    Connect(ConnectArgs),

    /// Run recorded test cases offline through the editor
    Replay(ReplayArgs),

    /// Re-emit a snapshot file as YAML or JSON
    Export(ExportArgs),

    /// Browse the inventory behind a topology
    #[command(alias = "inv")]
    Inventory(InventoryArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Connect ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Skip the test channel (no recordings or scripted tests)
    #[arg(long)]
    pub no_test_channel: bool,

    /// Leave after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,
}

// ── Replay ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Test case files (a JSON object or an array of them)
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

// ── Export ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Snapshot file (JSON or YAML)
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Document format to write
    #[arg(long, short = 'f', default_value = "yaml")]
    pub format: ExportFormat,

    /// Omit the fitted viewport
    #[arg(long)]
    pub no_viewport: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Yaml,
    Json,
}

// ── Inventory ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InventoryArgs {
    #[command(subcommand)]
    pub command: InventoryCommand,
}

#[derive(Debug, Subcommand)]
pub enum InventoryCommand {
    /// List inventory hosts and the device type each becomes
    #[command(alias = "ls")]
    Hosts,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Store a profile's API token in the system keyring
    SetToken {
        /// Read the token from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
