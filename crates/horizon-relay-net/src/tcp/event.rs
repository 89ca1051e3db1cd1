//! Channel-based views of sender and listener signals.
//!
//! Signals call slots synchronously on the I/O task. Async consumers that
//! would rather `await` events can take a receiver from `subscribe()`; each
//! event is forwarded in the order the signals were emitted.

use std::sync::Arc;

use horizon_relay_core::Signal;
use tokio::sync::mpsc::UnboundedSender;

use super::client::{ClientId, ClientInfo};

/// Events raised by a [`Sender`](super::Sender).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection to the endpoint was established.
    Connected,
    /// An established connection was lost.
    Disconnected,
    /// Text decoded from one read.
    DataReceived(String),
}

/// Events raised by a [`Listener`](super::Listener).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A client was accepted.
    ClientConnected(ClientInfo),
    /// A client's connection ended.
    ClientDisconnected(ClientId),
    /// Text decoded from one read on the given client.
    DataReceived(ClientId, String),
}

/// Forward `signal` into `tx`, mapping each emission with `map`.
///
/// The slot stays connected after the receiver is dropped; sends to a closed
/// channel are ignored.
pub(crate) fn forward<Args, E, F>(signal: &Arc<Signal<Args>>, tx: &UnboundedSender<E>, map: F)
where
    Args: Send + 'static,
    E: Send + 'static,
    F: Fn(&Args) -> E + Send + Sync + 'static,
{
    let tx = tx.clone();
    signal.connect(move |args| {
        let _ = tx.send(map(args));
    });
}
