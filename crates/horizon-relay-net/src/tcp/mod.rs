//! Resilient TCP sender and broadcasting TCP listener.
//!
//! This module provides two endpoints:
//! - **Sender**: Keeps one outbound connection alive with a fixed-interval
//!   reconnect timer and an optional heartbeat
//! - **Listener**: Accepts any number of inbound connections and broadcasts
//!   text to all of them
//!
//! Both deliver events through [`Signal`](horizon_relay_core::Signal)s, or as
//! a channel through `subscribe()`. Payloads are raw text; reads are not
//! framed.
//!
//! # Sender Example
//!
//! ```ignore
//! use horizon_relay_net::tcp::{ConnectionConfig, Sender};
//!
//! let config = ConnectionConfig::new("127.0.0.1", 7000)
//!     .retry_interval_ms(2_000)
//!     .alive_check(10_000, "PING");
//!
//! let sender = Sender::new(config)?;
//!
//! sender.connected.connect(|_| {
//!     println!("Connected to server!");
//! });
//!
//! sender.data_received.connect(|text| {
//!     println!("Received: {text}");
//! });
//!
//! sender.start();
//! sender.send("Hello, Server!").await;
//! ```
//!
//! # Listener Example
//!
//! ```ignore
//! use horizon_relay_net::tcp::{Listener, ListenerConfig};
//!
//! let listener = Listener::new(ListenerConfig::any_address(7000))?;
//!
//! listener.client_connected.connect(|client| {
//!     println!("New connection from {}", client.peer_addr);
//! });
//!
//! listener.start().await?;
//! let delivered = listener.broadcast("status: ok").await;
//! ```

mod client;
mod config;
mod event;
mod link;
mod listener;
mod sender;
mod state;

pub use client::{ClientConnection, ClientId, ClientInfo};
pub use config::{
    ConnectionConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_RETRY_INTERVAL_MS, ListenerConfig,
};
pub use event::{ConnectionEvent, ListenerEvent};
pub use listener::Listener;
pub use sender::Sender;
pub use state::{ListenerState, SenderState};
