//! `pitchroom` - live workshop session host

use clap::Parser;

use pitchroom::cli::args::Cli;
use pitchroom::cli::commands;
use pitchroom::cli::shutdown::Shutdown;
use pitchroom::error::ExitCode;
use pitchroom::observability::{StopReason, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    match commands::dispatch(cli, shutdown).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// First SIGINT/SIGTERM cancels gracefully; a second one exits immediately.
async fn shutdown_on_signal(shutdown: Shutdown) {
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                shutdown.trigger(StopReason::Interrupted);
                return;
            }
        };

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => StopReason::Interrupted,
        _ = sigterm.recv() => StopReason::Terminated,
    };

    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    shutdown.trigger(reason);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
        _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
    }
}
