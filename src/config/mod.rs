//! Configuration module
//!
//! Loading and validation of the YAML configuration file: listener and
//! access settings, session timings and rules, and the team context
//! catalog.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::{PitchroomConfig, ServerSection, SessionSection};
pub use validation::{ValidationResult, Validator};
