//! Configuration validation
//!
//! Semantic checks on a deserialized [`PitchroomConfig`]. Validation collects
//! every issue instead of stopping at the first, so one run reports
//! everything that needs fixing.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::schema::PitchroomConfig;
use crate::error::{Severity, ValidationIssue};
use crate::transport::parse_bind_addr;

/// Quorum grace periods above this are almost certainly a unit mistake.
const MAX_REASONABLE_GRACE: Duration = Duration::from_secs(10);

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &PitchroomConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_server(config);
        self.validate_scores(config);
        self.validate_durations(config);
        self.validate_contexts(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_server(&mut self, config: &PitchroomConfig) {
        let server = &config.server;
        if let Err(e) = parse_bind_addr(&server.bind) {
            self.add_error("server.bind", e.to_string());
        }

        if let Some(url) = &server.public_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            self.add_error(
                "server.public_url",
                format!("'{url}' must start with http:// or https://"),
            );
        }

        match server.admin_token.as_deref() {
            Some(token) if token.trim().is_empty() => {
                self.add_error("server.admin_token", "admin token cannot be blank");
            }
            Some(_) => {}
            None => self.add_warning(
                "server.admin_token",
                "no admin token set; anyone can drive the session",
            ),
        }
    }

    fn validate_scores(&mut self, config: &PitchroomConfig) {
        let s = &config.session;
        if s.min_score > s.max_score {
            self.add_error(
                "session.min_score",
                format!(
                    "min_score ({}) must not exceed max_score ({})",
                    s.min_score, s.max_score
                ),
            );
        }
        if s.min_score == s.max_score {
            self.add_warning(
                "session.max_score",
                "min_score equals max_score; every vote scores the same",
            );
        }
    }

    fn validate_durations(&mut self, config: &PitchroomConfig) {
        let s = &config.session;
        for (path, value) in [
            ("session.presentation_duration", s.presentation_duration),
            ("session.prep_reset_duration", s.prep_reset_duration),
            ("session.tick_interval", s.tick_interval),
        ] {
            if value.is_zero() {
                self.add_error(path, "must be greater than zero");
            }
        }
        if s.prep_duration.is_zero() {
            self.add_warning(
                "session.prep_duration",
                "zero prep duration; prep ends on the first monitor tick",
            );
        }
        if s.tick_interval > Duration::from_secs(1) {
            self.add_warning(
                "session.tick_interval",
                "countdowns update less than once per second",
            );
        }
        if s.quorum_grace > MAX_REASONABLE_GRACE {
            self.add_warning(
                "session.quorum_grace",
                format!(
                    "{} is unusually long for a quorum grace period",
                    humantime::format_duration(s.quorum_grace)
                ),
            );
        }
    }

    fn validate_contexts(&mut self, config: &PitchroomConfig) {
        let mut seen = HashSet::new();
        for (i, context) in config.contexts.iter().enumerate() {
            let path = format!("contexts[{i}]");
            if context.trim().is_empty() {
                self.add_error(&path, "context cannot be blank");
            } else if !seen.insert(context.as_str()) {
                self.add_warning(&path, format!("duplicate context '{context}'"));
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(yaml: &str) -> ValidationResult {
        let config: PitchroomConfig = serde_yaml::from_str(yaml).unwrap();
        Validator::new().validate(&config)
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn defaults_with_token_are_clean() {
        let result = validate("server:\n  admin_token: abc\n");
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_token_is_a_warning() {
        let result = validate("{}");
        assert!(result.is_valid());
        assert_eq!(paths(&result.warnings), vec!["server.admin_token"]);
    }

    #[test]
    fn collects_every_error() {
        let yaml = "
server:
  bind: nowhere
  public_url: ftp://x
  admin_token: '  '
session:
  min_score: 8
  max_score: 3
  presentation_duration: 0
contexts: ['', 'Harbor']
";
        let result = validate(yaml);
        assert!(result.has_errors());
        let errors = paths(&result.errors);
        for expected in [
            "server.bind",
            "server.public_url",
            "server.admin_token",
            "session.min_score",
            "session.presentation_duration",
            "contexts[0]",
        ] {
            assert!(errors.contains(&expected), "missing {expected}: {errors:?}");
        }
    }

    #[test]
    fn suspicious_values_warn() {
        let yaml = "
server:
  admin_token: abc
session:
  prep_duration: 0
  quorum_grace: 1m
  tick_interval: 5s
contexts: [Harbor, Harbor]
";
        let result = validate(yaml);
        assert!(result.is_valid());
        let warnings = paths(&result.warnings);
        assert!(warnings.contains(&"session.prep_duration"));
        assert!(warnings.contains(&"session.quorum_grace"));
        assert!(warnings.contains(&"session.tick_interval"));
        assert!(warnings.contains(&"contexts[1]"));
    }
}
