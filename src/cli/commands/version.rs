//! Version information display.

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};

/// Renders the version line for the requested format.
#[must_use]
pub fn render(format: OutputFormat) -> String {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    match format {
        OutputFormat::Human => format!("{name} {version}"),
        OutputFormat::Json => json!({ "name": name, "version": version }).to_string(),
    }
}

/// Print version information.
pub fn run(args: &VersionArgs) {
    println!("{}", render(args.format));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_and_json() {
        assert!(render(OutputFormat::Human).starts_with("pitchroom "));
        let value: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!(value["name"], "pitchroom");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    }
}
