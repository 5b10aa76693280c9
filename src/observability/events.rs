//! Structured session event stream.
//!
//! Discrete, typed events emitted as the workshop runs. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number, so a session can be replayed or audited
//! after the fact.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::{Phase, RestartPolicy, TeamId, UserId};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Why the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Shutdown requested without a signal.
    Shutdown,
    /// Interrupted by SIGINT.
    Interrupted,
    /// Terminated by SIGTERM.
    Terminated,
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a workshop session.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The server is listening.
    ServerStarted {
        /// When the server started.
        timestamp: DateTime<Utc>,
        /// Address the listener is bound to.
        bind: String,
        /// Base URL advertised to participants.
        public_url: String,
    },

    /// The server has stopped.
    ServerStopped {
        /// When the server stopped.
        timestamp: DateTime<Utc>,
        /// Why it stopped.
        reason: StopReason,
    },

    /// A participant joined or re-attached.
    ParticipantJoined {
        /// When the join was processed.
        timestamp: DateTime<Utc>,
        /// Participant id.
        user_id: UserId,
        /// Display name.
        name: String,
    },

    /// Teams were (re)formed.
    TeamsCreated {
        /// When the teams were formed.
        timestamp: DateTime<Utc>,
        /// Number of teams.
        count: usize,
        /// Number of participants dealt into teams.
        participants: usize,
    },

    /// The session moved to a new phase.
    PhaseEntered {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Phase that was left.
        from: Phase,
        /// Phase that was entered.
        to: Phase,
        /// Team on stage after the transition, if any.
        presenting_team_id: Option<TeamId>,
    },

    /// A vote was recorded.
    VoteCast {
        /// When the vote was recorded.
        timestamp: DateTime<Utc>,
        /// Voter.
        user_id: UserId,
        /// Team that received the vote.
        team_id: TeamId,
        /// Submitted score.
        score: u32,
    },

    /// A presentation round was scored.
    ScoresTallied {
        /// When the tally happened.
        timestamp: DateTime<Utc>,
        /// Scored team.
        team_id: TeamId,
        /// Mean of the round's votes.
        mean: f64,
        /// Team's cumulative score after the tally.
        total: f64,
    },

    /// The session returned to the lobby.
    SessionRestarted {
        /// When the restart happened.
        timestamp: DateTime<Utc>,
        /// What happened to the roster.
        policy: RestartPolicy,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line, and flushes the underlying
/// writer. Serialization or I/O failures are dropped; the event stream
/// must never take the session down.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`, truncating it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(line) = serde_json::to_string(&envelope)
        {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing emitter output in tests.
    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event::ParticipantJoined {
            timestamp: DateTime::parse_from_rfc3339("2025-02-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            user_id: UserId::new("u-1"),
            name: "Ada".to_owned(),
        }
    }

    #[test]
    fn event_serializes_with_snake_case_tag() {
        let json = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(json["type"], "participant_joined");
        assert_eq!(json["user_id"], "u-1");
        assert_eq!(json["timestamp"], "2025-02-04T10:15:30Z");
    }

    #[test]
    fn emitter_writes_jsonl_with_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());
        emitter.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            from: Phase::Lobby,
            to: Phase::Prep,
            presenting_team_id: None,
        });

        assert_eq!(emitter.event_count(), 2);
        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["type"], "phase_entered");
        assert_eq!(lines[1]["to"], "PREP");
        assert!(lines[1].get("event").is_none(), "event should be flattened");
    }

    #[test]
    fn stop_reason_and_policy_render_snake_case() {
        let stopped = serde_json::to_value(Event::ServerStopped {
            timestamp: Utc::now(),
            reason: StopReason::Interrupted,
        })
        .unwrap();
        assert_eq!(stopped["reason"], "interrupted");

        let restarted = serde_json::to_value(Event::SessionRestarted {
            timestamp: Utc::now(),
            policy: RestartPolicy::ClearRoster,
        })
        .unwrap();
        assert_eq!(restarted["policy"], "clear_roster");
    }

    #[test]
    fn noop_emitter_still_counts() {
        let emitter = EventEmitter::noop();
        emitter.emit(sample_event());
        assert_eq!(emitter.event_count(), 1);
    }
}
