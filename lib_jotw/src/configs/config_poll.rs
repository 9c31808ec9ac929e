use std::fmt;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use crate::core::scheduler::DEFAULT_CRON;
use crate::core::symbols::{SymbolPool, SymbolPoolError};

/// Ten minutes, as the bot has always run.
pub const DEFAULT_WINDOW_SECS: u64 = 10 * 60;
/// Longest accepted collection window: one day.
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Poll window must be between 1 and {MAX_WINDOW_SECS} seconds, got {0}")]
    InvalidWindow(u64),

    #[error("Cron expression must not be empty")]
    EmptyCron,

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid symbol pool: {0}")]
    InvalidSymbols(#[from] SymbolPoolError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub window: Duration,
    pub cron: String,
    pub timezone: Tz,
    pub symbols: SymbolPool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            cron: DEFAULT_CRON.to_string(),
            timezone: chrono_tz::UTC,
            symbols: SymbolPool::default(),
        }
    }
}

impl PollSettings {
    /// Builds settings from optional raw values, falling back to defaults for
    /// anything not given.
    pub fn from_parts(
        window_secs: Option<u64>,
        cron: Option<&str>,
        timezone: Option<&str>,
        symbols: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let window = match window_secs {
            Some(secs) if secs == 0 || secs > MAX_WINDOW_SECS => return Err(ConfigError::InvalidWindow(secs)),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.window,
        };

        let cron = match cron.map(str::trim) {
            Some("") => return Err(ConfigError::EmptyCron),
            Some(expr) => expr.to_string(),
            None => defaults.cron,
        };

        let timezone = match timezone.map(str::trim) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))?,
            None => defaults.timezone,
        };

        let symbols = match symbols {
            Some(list) => SymbolPool::parse(list)?,
            None => defaults.symbols,
        };

        Ok(Self {
            window,
            cron,
            timezone,
            symbols,
        })
    }
}

impl fmt::Display for PollSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PollSettings
    Window: {}s,
    Cron: {},
    Timezone: {},
    Symbols ({}): {}
",
            self.window.as_secs(),
            self.cron,
            self.timezone.name(),
            self.symbols.len(),
            self.symbols.iter().collect::<Vec<_>>().join(" ")
        )
    }
}
