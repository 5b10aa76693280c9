//! Error types for `pitchroom`
//!
//! A top-level error aggregates configuration, transport and session
//! failures and maps each onto a process exit code. Session errors are
//! local and non-fatal: the engine validates before it mutates, so a
//! rejected action never leaves the session half-updated.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::Phase;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `pitchroom` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (bind failure, session actor gone)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `pitchroom` operations.
#[derive(Debug, Error)]
pub enum PitchroomError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport layer error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session rule violation surfaced outside the request path
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PitchroomError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Session(_) => ExitCode::ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({message})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message supplied with the `${VAR:?message}` reference
        message: String,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "session.min_score")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Errors from the HTTP front door and the channel to the session actor.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during transport operations
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to bind the listener
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// The session actor has shut down and no longer accepts commands
    #[error("session is no longer running")]
    SessionClosed,
}

// ============================================================================
// Session Errors
// ============================================================================

/// Rejections produced by the session engine.
///
/// Each variant carries enough context for a human-readable reply to the
/// requester. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// More teams were requested than there are connected participants
    #[error("cannot form {requested} teams with only {connected} connected participants")]
    InsufficientParticipants {
        /// Number of teams requested
        requested: usize,
        /// Number of connected participants
        connected: usize,
    },

    /// A team count of zero was requested
    #[error("team count must be at least 1")]
    InvalidTeamCount,

    /// The action is not available in the current phase
    #[error("{action} is not allowed during {phase}")]
    WrongPhase {
        /// Name of the rejected action
        action: &'static str,
        /// Phase the session was in
        phase: Phase,
    },

    /// A timer operation was requested while no timer is active
    #[error("no timer is active during {phase}")]
    TimerInactive {
        /// Phase the session was in
        phase: Phase,
    },

    /// The vote was rejected
    #[error("vote rejected: {0}")]
    InvalidVote(VoteRejection),

    /// The join request was malformed
    #[error("invalid join: {0}")]
    InvalidJoin(String),
}

/// Reason a vote was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteRejection {
    /// Votes are only accepted during VOTING
    #[error("voting is not open")]
    WrongPhase,
    /// No team is currently presenting
    #[error("no team is presenting")]
    NoPresentingTeam,
    /// The voter has never joined the session
    #[error("unknown voter")]
    UnknownVoter,
    /// Presenting-team members cannot vote for themselves
    #[error("members cannot vote for their own team")]
    OwnTeam,
    /// The voter already voted this round
    #[error("already voted this round")]
    AlreadyVoted,
    /// The score lies outside the configured range
    #[error("score {score} outside {min}..={max}")]
    OutOfRange {
        /// Submitted score
        score: u32,
        /// Lowest accepted score
        min: u32,
        /// Highest accepted score
        max: u32,
    },
}

impl From<VoteRejection> for SessionError {
    fn from(reason: VoteRejection) -> Self {
        Self::InvalidVote(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_category() {
        let err = PitchroomError::Config(ConfigError::MissingFile {
            path: PathBuf::from("x.yaml"),
        });
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);

        let err = PitchroomError::Transport(TransportError::SessionClosed);
        assert_eq!(err.exit_code(), ExitCode::TRANSPORT_ERROR);

        let err = PitchroomError::Usage("bad flag".into());
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);

        let err = PitchroomError::Io(std::io::Error::other("boom"));
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn insufficient_participants_message() {
        let err = SessionError::InsufficientParticipants {
            requested: 5,
            connected: 3,
        };
        assert_eq!(
            err.to_string(),
            "cannot form 5 teams with only 3 connected participants"
        );
    }

    #[test]
    fn wrong_phase_message_names_phase() {
        let err = SessionError::WrongPhase {
            action: "start_voting",
            phase: Phase::Lobby,
        };
        assert_eq!(err.to_string(), "start_voting is not allowed during LOBBY");
    }

    #[test]
    fn vote_rejection_converts() {
        let err: SessionError = VoteRejection::OwnTeam.into();
        assert_eq!(
            err.to_string(),
            "vote rejected: members cannot vote for their own team"
        );
    }

    #[test]
    fn validation_error_lists_issues() {
        let err = ConfigError::ValidationError {
            path: "workshop.yaml".into(),
            errors: vec![ValidationIssue {
                path: "session.min_score".into(),
                message: "must not exceed max_score".into(),
                severity: Severity::Error,
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("workshop.yaml"));
        assert!(msg.contains("error: must not exceed max_score at session.min_score"));
    }
}
