//! Messages flowing into and out of the session actor.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::session::{SessionSnapshot, Standing, User, UserId};

// ============================================================================
// Inbound events
// ============================================================================

/// A participant or host action, as received from the front door.
///
/// Serialized with an `action` tag:
/// `{"action": "cast_vote", "user_id": "u1", "score": 7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Register or re-attach a participant.
    Join {
        /// Client-chosen stable id
        user_id: UserId,
        /// Display name
        name: String,
    },
    /// Form `count` teams from the connected participants.
    CreateTeams {
        /// Number of teams
        count: usize,
    },
    /// Start the prep countdown.
    StartPrep {
        /// Countdown length; the configured default when omitted
        #[serde(default)]
        seconds: Option<u64>,
    },
    /// Put the next team on stage.
    AdvancePresentation,
    /// Phase-aware "next".
    NextStep,
    /// Score the presenting team.
    CastVote {
        /// Voter
        user_id: UserId,
        /// Score
        score: u32,
    },
    /// Pause the countdown.
    PauseTimer,
    /// Resume the countdown.
    ResumeTimer,
    /// Shift the countdown.
    AdjustTimer {
        /// Seconds to add (negative to subtract)
        delta_seconds: i64,
    },
    /// Restart the countdown at the phase's canonical duration.
    ResetTimer,
    /// Return to the lobby.
    RestartSession,
    /// Mark a participant disconnected.
    Disconnect {
        /// Participant
        user_id: UserId,
    },
}

impl InboundEvent {
    /// Wire name of the action, also used as a metrics label.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::CreateTeams { .. } => "create_teams",
            Self::StartPrep { .. } => "start_prep",
            Self::AdvancePresentation => "advance_presentation",
            Self::NextStep => "next_step",
            Self::CastVote { .. } => "cast_vote",
            Self::PauseTimer => "pause_timer",
            Self::ResumeTimer => "resume_timer",
            Self::AdjustTimer { .. } => "adjust_timer",
            Self::ResetTimer => "reset_timer",
            Self::RestartSession => "restart_session",
            Self::Disconnect { .. } => "disconnect",
        }
    }

    /// Whether the action is reserved for the host.
    ///
    /// Participants only join and vote. Their connection state follows their
    /// event streams, so marking someone disconnected is a host action.
    #[must_use]
    pub const fn is_host_action(&self) -> bool {
        !matches!(self, Self::Join { .. } | Self::CastVote { .. })
    }
}

/// Reply to an inbound event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventReply {
    /// Whether the action took effect
    pub accepted: bool,
    /// Human-readable detail, mostly for rejections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The participant record, for `join`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Whether a team took the stage, for presentation advances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_teams: Option<bool>,
}

impl EventReply {
    /// An accepted action with no payload.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            ..Self::default()
        }
    }

    /// A rejected action with a reason.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Attaches a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// Outbound messages
// ============================================================================

/// Message pushed to every observer.
///
/// Serialized as `{"event": "state_update", "data": {...}}` or
/// `{"event": "session_restart"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    /// Full session snapshot.
    StateUpdate(Box<SessionSnapshot>),
    /// The roster was cleared; clients must forget their identity and rejoin.
    SessionRestart,
}

impl Outbound {
    /// SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StateUpdate(_) => "state_update",
            Self::SessionRestart => "session_restart",
        }
    }
}

// ============================================================================
// Actor commands
// ============================================================================

/// Work item for the session actor.
#[derive(Debug)]
pub enum Command {
    /// An inbound event with its reply slot.
    Event {
        /// The action
        event: InboundEvent,
        /// Reply slot
        reply: oneshot::Sender<EventReply>,
    },
    /// A live stream opened for a known participant.
    Attach {
        /// Participant
        user_id: UserId,
    },
    /// The participant's last live stream closed.
    Detach {
        /// Participant
        user_id: UserId,
    },
    /// Read the current snapshot.
    Snapshot {
        /// Reply slot
        reply: oneshot::Sender<SessionSnapshot>,
    },
    /// Read the leaderboard.
    Leaderboard {
        /// Reply slot
        reply: oneshot::Sender<Vec<Standing>>,
    },
    /// Periodic tick from the timer monitor.
    Tick {
        /// Monitor generation that produced the tick
        generation: u64,
    },
    /// Debounced quorum re-check.
    QuorumCheck {
        /// Presentation round the check was scheduled for
        round: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn inbound_event_parses_tagged_json() {
        let event: InboundEvent =
            serde_json::from_str(r#"{"action":"cast_vote","user_id":"u1","score":7}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::CastVote {
                user_id: UserId::new("u1"),
                score: 7
            }
        );
        assert_eq!(event.action(), "cast_vote");
        assert!(!event.is_host_action());

        let prep: InboundEvent = serde_json::from_str(r#"{"action":"start_prep"}"#).unwrap();
        assert_eq!(prep, InboundEvent::StartPrep { seconds: None });
        assert!(prep.is_host_action());

        let kick: InboundEvent =
            serde_json::from_str(r#"{"action":"disconnect","user_id":"u2"}"#).unwrap();
        assert!(kick.is_host_action());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<InboundEvent>(r#"{"action":"launch"}"#).is_err());
    }

    #[test]
    fn reply_skips_empty_fields() {
        let json = serde_json::to_value(EventReply::accepted()).unwrap();
        assert_eq!(json, serde_json::json!({"accepted": true}));

        let json = serde_json::to_value(EventReply::rejected("nope")).unwrap();
        assert_eq!(json["message"], "nope");
    }

    #[test]
    fn outbound_wire_shape() {
        let snapshot = SessionSnapshot::capture(&SessionState::default(), 0);
        let json = serde_json::to_value(Outbound::StateUpdate(Box::new(snapshot))).unwrap();
        assert_eq!(json["event"], "state_update");
        assert_eq!(json["data"]["phase"], "LOBBY");

        let json = serde_json::to_value(Outbound::SessionRestart).unwrap();
        assert_eq!(json, serde_json::json!({"event": "session_restart"}));
    }
}
