//! CLI argument definitions.
//!
//! All argument structs use `clap` derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::schema::duration;
use crate::observability::LogFormat;

/// Live workshop session host: teams, timed pitches, audience voting.
#[derive(Parser, Debug)]
#[command(name = "pitchroom", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(
        long,
        default_value = "auto",
        global = true,
        env = "PITCHROOM_COLOR"
    )]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(
        long,
        default_value = "human",
        global = true,
        env = "PITCHROOM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the session host.
    Serve(ServeArgs),

    /// Print the team context catalog.
    Contexts(ContextsArgs),

    /// Generate shell completions.
    Completions(CompletionsArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

// ============================================================================
// Serve
// ============================================================================

/// Arguments for `pitchroom serve`.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Path to a YAML configuration file.
    #[arg(short, long, env = "PITCHROOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address (`host:port`, `:port` or `port`).
    #[arg(long, env = "PITCHROOM_BIND")]
    pub bind: Option<String>,

    /// Shared credential required for host actions.
    #[arg(long, env = "PITCHROOM_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Externally reachable base URL shown in the banner.
    #[arg(long, env = "PITCHROOM_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Default prep countdown (`300`, `5m`, `90s`).
    #[arg(long, value_parser = duration::parse)]
    pub prep_duration: Option<Duration>,

    /// Append session events as JSON lines to this file.
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "PITCHROOM_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Contexts
// ============================================================================

/// Arguments for `pitchroom contexts`.
#[derive(Args, Debug)]
pub struct ContextsArgs {
    /// Read the catalog from this configuration file instead of the defaults.
    #[arg(short, long, env = "PITCHROOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions & Version
// ============================================================================

/// Arguments for `pitchroom completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell.
    pub shell: Shell,
}

/// Arguments for `pitchroom version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Value Enums
// ============================================================================

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal support.
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

/// Output format for informational commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// JSON.
    Json,
}

/// Shells supported by `completions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash
    Bash,
    /// Zsh
    Zsh,
    /// Fish
    Fish,
    /// `PowerShell`
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish
    Elvish,
}
