//! Networking module for Horizon Relay.
//!
//! This crate provides a resilient TCP layer for applications that must keep
//! talking to a peer across network failures:
//!
//! - **Sender**: One outbound connection, re-established on a fixed interval
//!   after every failure, with an optional heartbeat
//! - **Listener**: Accepts many inbound connections and broadcasts to them
//! - **Settings**: JSON persistence for both configurations
//!
//! # Sender
//!
//! ```ignore
//! use horizon_relay_net::tcp::{ConnectionConfig, Sender};
//!
//! let sender = Sender::new(
//!     ConnectionConfig::new("10.0.0.5", 7000)
//!         .retry_interval_ms(2_000)
//!         .alive_check(10_000, "PING"),
//! )?;
//!
//! sender.disconnected.connect(|_| println!("link lost, retrying"));
//! sender.start();
//!
//! // Returns false instead of failing while the link is down.
//! let delivered = sender.send("reading=42").await;
//! ```
//!
//! # Listener
//!
//! ```ignore
//! use horizon_relay_net::tcp::{Listener, ListenerConfig};
//!
//! let listener = Listener::new(ListenerConfig::any_address(7000))?;
//! listener.data_received.connect(|(id, text)| println!("{id}: {text}"));
//!
//! let addr = listener.start().await?;
//! let reached = listener.broadcast("shutdown in 5m").await;
//! listener.stop();
//! ```
//!
//! # Logging
//!
//! Diagnostics go through a [`LogSink`](horizon_relay_core::LogSink). The
//! default sink forwards to `tracing`; use `with_log_sink` to route them
//! elsewhere, or [`NullLogSink`](horizon_relay_core::NullLogSink) to silence
//! them.

mod error;
pub mod settings;
pub mod tcp;

pub use error::{NetworkError, Result};

// Re-export commonly used types at the crate root
pub use horizon_relay_core::{LogLevel, LogSink, MemoryLogSink, NullLogSink, TracingLogSink};
pub use settings::{load_settings, save_settings};
pub use tcp::{
    ClientId, ClientInfo, ConnectionConfig, ConnectionEvent, Listener, ListenerConfig,
    ListenerEvent, ListenerState, Sender, SenderState,
};
