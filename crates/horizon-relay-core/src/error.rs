//! Error types for Horizon Relay core.

use std::fmt;

/// Timer-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// A repeating timer cannot run on a zero period. Carries the timer name.
    ZeroPeriod(&'static str),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPeriod(name) => write!(f, "Timer '{name}' needs a non-zero period"),
        }
    }
}

impl std::error::Error for TimerError {}
