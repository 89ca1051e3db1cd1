//! Leveled log sinks.
//!
//! Network components report their diagnostics through the [`LogSink`]
//! capability rather than calling a logger directly. A sink is always
//! present: components hold an `Arc<dyn LogSink>` and default to
//! [`TracingLogSink`], so call sites never check for a missing logger.
//!
//! - [`TracingLogSink`]: forwards to the `tracing` crate. Install a subscriber
//!   (for example `tracing_subscriber::fmt::init()`) in the application to see
//!   the output.
//! - [`NullLogSink`]: discards everything.
//! - [`MemoryLogSink`]: records entries in memory, mostly for tests.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_relay_core::{LogLevel, LogSink, MemoryLogSink};
//!
//! let sink = Arc::new(MemoryLogSink::new());
//! sink.info("listening on port 9000");
//!
//! assert_eq!(sink.count(LogLevel::Info), 1);
//! assert!(sink.contains("port 9000"));
//! ```

use std::fmt;

use parking_lot::Mutex;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_relay_core::signal";
    /// Interval timer target.
    pub const TIMER: &str = "horizon_relay_core::timer";
    /// Target used by [`TracingLogSink`](super::TracingLogSink).
    pub const SINK: &str = "horizon_relay";
}

/// Severity of a log entry, from most to least severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
            Self::Info => write!(f, "INFO"),
            Self::Debug => write!(f, "DEBUG"),
        }
    }
}

/// A consumer of leveled text messages.
///
/// Only [`log`](Self::log) is required; the per-level methods forward to it.
pub trait LogSink: Send + Sync {
    /// Write a message at the given level.
    fn log(&self, level: LogLevel, message: &str);

    fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

/// Forwards messages to `tracing`, tagged with a component name.
#[derive(Clone, Debug)]
pub struct TracingLogSink {
    component: &'static str,
}

impl TracingLogSink {
    /// Create a sink whose events carry `component` as a field.
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    /// The component name attached to every event.
    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl Default for TracingLogSink {
    fn default() -> Self {
        Self::new("relay")
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        let component = self.component;
        match level {
            LogLevel::Critical => {
                tracing::error!(target: targets::SINK, component, critical = true, "{message}")
            }
            LogLevel::Error => tracing::error!(target: targets::SINK, component, "{message}"),
            LogLevel::Warning => tracing::warn!(target: targets::SINK, component, "{message}"),
            LogLevel::Info => tracing::info!(target: targets::SINK, component, "{message}"),
            LogLevel::Debug => tracing::debug!(target: targets::SINK, component, "{message}"),
        }
    }
}

/// A sink that discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// A sink that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of all recorded entries, oldest first.
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().clone()
    }

    /// Messages recorded at exactly `level`.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Number of entries recorded at exactly `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.lock().iter().filter(|(l, _)| *l == level).count()
    }

    /// Whether any entry contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|(_, m)| m.contains(needle))
    }

    /// Drop all recorded entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries.lock().push((level, message.to_string()));
    }
}
