//! Core systems for Horizon Relay.
//!
//! This crate provides the runtime pieces shared by the networking layer:
//!
//! - **Signal/Slot System**: Type-safe observer registration for events
//! - **Log Sinks**: Leveled diagnostics with a `tracing` default
//! - **Interval Timers**: Repeating tokio timers that drop overlapping ticks
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_relay_core::Signal;
//!
//! let connected = Signal::<()>::new();
//! let id = connected.connect(|_| println!("connected"));
//!
//! connected.emit(());
//! connected.disconnect(id);
//! ```

mod error;
pub mod log;
pub mod signal;
mod timer;

pub use error::TimerError;
pub use log::{LogLevel, LogSink, MemoryLogSink, NullLogSink, TracingLogSink};
pub use signal::{Signal, SlotId};
pub use timer::IntervalTimer;
