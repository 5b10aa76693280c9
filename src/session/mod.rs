//! Workshop session core
//!
//! The session state machine: participants join, are dealt into teams,
//! prepare against a countdown, present in a random but exhaustive order,
//! and are scored by the audience.
//!
//! # Architecture
//!
//! - [`SessionState`]: users, teams, phase, timer and presentation ledger
//! - [`Timer`]: the countdown with exactly one authoritative representation
//! - [`SessionEngine`]: transition functions enforcing the session rules
//! - [`ContextPool`]: catalog of team flavors sampled at team creation
//! - [`Clock`]: injectable time source
//! - [`SessionSnapshot`]: the serializable outbound view

pub mod clock;
pub mod contexts;
pub mod engine;
pub mod model;
pub mod snapshot;
pub mod timer;

pub use clock::{Clock, ManualClock, TokioClock};
pub use contexts::ContextPool;
pub use engine::{SessionEngine, SessionSettings, StepOutcome};
pub use model::{Phase, RestartPolicy, SessionState, Team, TeamId, User, UserId};
pub use snapshot::{SessionSnapshot, Standing};
pub use timer::{MAX_COUNTDOWN, Timer};
