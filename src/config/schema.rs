//! Configuration schema types
//!
//! These types are deserialized from the YAML configuration file. Every
//! section is optional; an empty mapping yields the built-in defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::RuntimeOptions;
use crate::session::{ContextPool, RestartPolicy, SessionSettings};

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PitchroomConfig {
    /// Listener and access settings
    #[serde(default)]
    pub server: ServerSection,

    /// Session rules and timings
    #[serde(default)]
    pub session: SessionSection,

    /// Team context catalog; the built-in catalog when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
}

impl PitchroomConfig {
    /// Engine rules derived from the `session` section.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        let s = &self.session;
        SessionSettings {
            prep_duration: s.prep_duration,
            prep_reset_duration: s.prep_reset_duration,
            presentation_duration: s.presentation_duration,
            min_score: s.min_score,
            max_score: s.max_score,
            restart_policy: s.restart_policy,
        }
    }

    /// Actor settings derived from the `session` section.
    #[must_use]
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            auto_advance_on_quorum: self.session.auto_advance_on_quorum,
            quorum_grace: self.session.quorum_grace,
            tick_interval: self.session.tick_interval,
            ..RuntimeOptions::default()
        }
    }

    /// The context catalog.
    #[must_use]
    pub fn context_pool(&self) -> ContextPool {
        ContextPool::new(self.contexts.clone())
    }
}

// ============================================================================
// Server Section
// ============================================================================

/// Listener and access settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Listen address (`host:port`, `:port` or `port`)
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Externally reachable base URL, when behind a proxy or tunnel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Shared host credential; host actions are open when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_url: None,
            admin_token: None,
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

// ============================================================================
// Session Section
// ============================================================================

/// Session rules and timings.
///
/// Durations accept integer seconds (`300`) or humantime strings (`"5m"`,
/// `"750ms"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionSection {
    /// Prep countdown when the host does not give one
    #[serde(with = "duration")]
    pub prep_duration: Duration,

    /// Prep countdown restored by a timer reset
    #[serde(with = "duration")]
    pub prep_reset_duration: Duration,

    /// Countdown for each presentation
    #[serde(with = "duration")]
    pub presentation_duration: Duration,

    /// Lowest accepted vote
    pub min_score: u32,

    /// Highest accepted vote
    pub max_score: u32,

    /// What a restart does with the roster
    pub restart_policy: RestartPolicy,

    /// Tally and advance automatically once every eligible voter has voted
    pub auto_advance_on_quorum: bool,

    /// Delay between reaching quorum and acting on it
    #[serde(with = "duration")]
    pub quorum_grace: Duration,

    /// Timer monitor period
    #[serde(with = "duration")]
    pub tick_interval: Duration,
}

impl Default for SessionSection {
    fn default() -> Self {
        let engine = SessionSettings::default();
        let runtime = RuntimeOptions::default();
        Self {
            prep_duration: engine.prep_duration,
            prep_reset_duration: engine.prep_reset_duration,
            presentation_duration: engine.presentation_duration,
            min_score: engine.min_score,
            max_score: engine.max_score,
            restart_policy: engine.restart_policy,
            auto_advance_on_quorum: runtime.auto_advance_on_quorum,
            quorum_grace: runtime.quorum_grace,
            tick_interval: runtime.tick_interval,
        }
    }
}

// ============================================================================
// Duration encoding
// ============================================================================

/// Serde adapter for durations written as seconds or humantime strings.
pub mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    /// Parses `"90"`, `"90s"`, `"5m"`, `"750ms"` and the like.
    ///
    /// # Errors
    ///
    /// Returns the humantime parse error message for anything else.
    pub fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        if let Ok(secs) = text.parse::<u64>() {
            return Ok(Duration::from_secs(secs));
        }
        humantime::parse_duration(text).map_err(|e| format!("invalid duration '{text}': {e}"))
    }

    /// Serializes as a humantime string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    /// Deserializes from integer seconds or a humantime string.
    ///
    /// # Errors
    ///
    /// Fails on negative numbers and unparseable strings.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }
}
