//! Logging initialization.
//!
//! Session logs go to stderr through `tracing`, as text or JSON lines.
//! Stdout is left for the startup banner and command output.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "PITCHROOM_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Filter directive for a `-v` count.
///
/// Dependencies stay at `warn` until `-vv`, so HTTP plumbing does not drown
/// out session transitions.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,pitchroom=info",
        1 => "warn,pitchroom=debug",
        2 => "info,pitchroom=trace",
        _ => "trace",
    }
}

fn ansi_enabled(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global subscriber on stderr.
///
/// `verbosity` is the raw `-v` count. [`LOG_LEVEL_ENV`] replaces the
/// derived filter entirely when set. A second call is a no-op.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));
    // Module paths only help once someone is debugging.
    let show_target = verbosity >= 1;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(show_target)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Human => builder.with_ansi(ansi_enabled(color)).try_init(),
        LogFormat::Json => builder.json().with_ansi(false).try_init(),
    };
}
