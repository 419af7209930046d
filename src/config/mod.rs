//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Everything has a
//! default, so an empty environment yields a runnable simulation.

pub mod timing;

use crate::error::{Error, Result};

pub use timing::{DelayRange, Timing};

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of participant actors.
    pub participants: u32,
    /// Items placed on the new-work queue before any actor starts.
    pub initial_work: u32,
    pub timing: Timing,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            participants: 4,
            initial_work: 0,
            timing: Timing::default(),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let timing = Timing {
            convener_wait: delay_var("CONVENE_CONVENER_WAIT_MS", defaults.timing.convener_wait)?,
            mingle: delay_var("CONVENE_MINGLE_MS", defaults.timing.mingle)?,
            quest: delay_var("CONVENE_QUEST_MS", defaults.timing.quest)?,
            produce: delay_var("CONVENE_PRODUCE_MS", defaults.timing.produce)?,
        };

        let participants = parsed_var("CONVENE_PARTICIPANTS", defaults.participants)?;
        if participants == 0 {
            return Err(Error::Config(
                "CONVENE_PARTICIPANTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            participants,
            initial_work: parsed_var("CONVENE_INITIAL_WORK", defaults.initial_work)?,
            timing,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parsed_var(name: &str, default: u32) -> Result<u32> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw:?} is not a count: {e}"))),
        Err(_) => Ok(default),
    }
}

fn delay_var(name: &str, default: DelayRange) -> Result<DelayRange> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}
