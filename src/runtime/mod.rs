//! Session runtime
//!
//! Serializes every mutation of the session through a single actor task.
//!
//! - [`actor`]: the actor, its [`SessionHandle`], and quorum debouncing
//! - [`monitor`]: the once-per-interval timer monitor and tick evaluation
//! - [`command`]: inbound events, replies, outbound messages and the queue protocol

pub mod actor;
pub mod command;
pub mod monitor;

pub use actor::{RuntimeOptions, SessionHandle, spawn_session};
pub use command::{EventReply, InboundEvent, Outbound};
pub use monitor::{TickOutcome, evaluate_tick};
