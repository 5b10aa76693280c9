//! `pitchroom` - live workshop session host
//!
//! Participants join, are dealt into teams, present in turn under a
//! countdown and score each other's pitches; a leaderboard closes the
//! session. One actor owns the session state and fans snapshots out to
//! every connected client over server-sent events.

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod runtime;
pub mod session;
pub mod transport;
