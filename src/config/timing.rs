//! Delay ranges for the actor loops.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// An inclusive range of milliseconds to sample a delay from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// Draw a delay uniformly from the range.
    pub fn sample(&self, rng: &mut impl Rng) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

impl std::fmt::Display for DelayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min_ms == self.max_ms {
            write!(f, "{}ms", self.min_ms)
        } else {
            write!(f, "{}..{}ms", self.min_ms, self.max_ms)
        }
    }
}

/// Accepts `"250"` or `"100..400"` (milliseconds).
impl FromStr for DelayRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid milliseconds {part:?}: {e}"))
        };

        let range = match s.split_once("..") {
            Some((min, max)) => Self::new(parse(min)?, parse(max)?),
            None => Self::fixed(parse(s)?),
        };
        if range.min_ms > range.max_ms {
            return Err(format!("empty range {s:?}"));
        }
        Ok(range)
    }
}

/// How long each actor pauses between protocol steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Convener's pause before each entry.
    pub convener_wait: DelayRange,
    /// Participant's pause after entering and after standing up.
    pub mingle: DelayRange,
    /// Participant's time away completing a work item.
    pub quest: DelayRange,
    /// Producer's pause between new items.
    pub produce: DelayRange,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            convener_wait: DelayRange::new(500, 1500),
            mingle: DelayRange::new(100, 500),
            quest: DelayRange::new(500, 2000),
            produce: DelayRange::new(200, 800),
        }
    }
}

impl Timing {
    /// Every delay zero; useful for tests.
    pub const fn immediate() -> Self {
        Self {
            convener_wait: DelayRange::fixed(0),
            mingle: DelayRange::fixed(0),
            quest: DelayRange::fixed(0),
            produce: DelayRange::fixed(0),
        }
    }
}
