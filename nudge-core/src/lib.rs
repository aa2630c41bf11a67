//! nudge-core: shared error taxonomy and configuration for the nudge crates.

pub mod config;
pub mod errors;

pub use config::{NudgeConfig, NudgeConfigSnapshot};
pub use errors::{ErrorKind, NudgeError, NudgeResult};
