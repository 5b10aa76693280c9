//! `pitchroom contexts`: print the team context catalog.

use crate::cli::args::{ContextsArgs, OutputFormat};
use crate::config::ConfigLoader;
use crate::error::PitchroomError;
use crate::session::ContextPool;

/// Prints the catalog that `serve` would use with the same configuration.
///
/// # Errors
///
/// Returns a configuration error if `--config` cannot be loaded.
pub fn run(args: &ContextsArgs) -> Result<(), PitchroomError> {
    let pool = match &args.config {
        Some(path) => ConfigLoader::default().load(path)?.config.context_pool(),
        None => ContextPool::default(),
    };
    println!("{}", render(&pool, args.format)?);
    Ok(())
}

/// Renders the catalog as numbered lines or a JSON array.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn render(pool: &ContextPool, format: OutputFormat) -> Result<String, PitchroomError> {
    Ok(match format {
        OutputFormat::Human => pool
            .contexts()
            .iter()
            .enumerate()
            .map(|(i, context)| format!("{:>3}. {context}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => serde_json::to_string_pretty(pool.contexts())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_listing_is_numbered() {
        let pool = ContextPool::new(vec!["Harbor".into(), "Bakery".into()]);
        assert_eq!(
            render(&pool, OutputFormat::Human).unwrap(),
            "  1. Harbor\n  2. Bakery"
        );
    }

    #[test]
    fn json_listing_round_trips() {
        let pool = ContextPool::default();
        let json = render(&pool, OutputFormat::Json).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pool.contexts());
    }
}
