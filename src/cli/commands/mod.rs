//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod contexts;
pub mod serve;
pub mod version;

use crate::cli::args::{Cli, Commands};
use crate::cli::shutdown::Shutdown;
use crate::error::PitchroomError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `shutdown` fires on the first signal; only long-running commands
/// observe it.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, shutdown: Shutdown) -> Result<(), PitchroomError> {
    match cli.command {
        Commands::Serve(args) => serve::run(&args, shutdown).await,
        Commands::Contexts(args) => contexts::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
