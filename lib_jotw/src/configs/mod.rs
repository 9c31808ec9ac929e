//! # Configuration Modules
//!
//! Validated poll settings shared by every binary. Where the values come from
//! (file, environment, CLI) is the binary's business.

/// Collection window, weekly trigger, timezone and symbol pool.
pub mod config_poll;

pub use config_poll::{ConfigError, PollSettings};
