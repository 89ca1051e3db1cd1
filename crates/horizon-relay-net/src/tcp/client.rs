//! Accepted client connections and the listener's connection registry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::tcp::OwnedWriteHalf;

use super::link::Link;
use crate::Result;
use crate::error::NetworkError;

/// Unique identifier for an accepted client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Identity of an accepted client, as delivered to listener subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientInfo {
    /// The listener-assigned connection ID.
    pub id: ClientId,
    /// The remote socket address.
    pub peer_addr: SocketAddr,
}

/// One inbound connection accepted by a [`Listener`](super::Listener).
///
/// The listener's registry owns these. A connection stops reporting itself
/// connected once it is closed locally or its read loop has ended.
#[derive(Debug)]
pub struct ClientConnection {
    id: ClientId,
    peer_addr: SocketAddr,
    pub(crate) link: Link,
}

impl ClientConnection {
    pub(crate) fn new(id: ClientId, peer_addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            id,
            peer_addr,
            link: Link::new(writer),
        }
    }

    /// Get the unique connection ID.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Get the peer socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Summary used in listener events.
    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id,
            peer_addr: self.peer_addr,
        }
    }

    /// Check if the connection is still active.
    pub fn is_connected(&self) -> bool {
        !self.link.is_closing()
    }

    /// Write `message` to the peer.
    pub async fn send(&self, message: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(NetworkError::NotConnected);
        }
        self.link
            .write_all(message.as_bytes())
            .await
            .map_err(|e| NetworkError::TcpSocket(e.to_string()))
    }

    /// Close the connection. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.link.close()
    }
}

/// The set of connections a listener currently tracks.
///
/// Not synchronized itself; the listener keeps it behind its state mutex so
/// the accept loop (insert) and read loops (remove) never race.
#[derive(Debug, Default)]
pub(crate) struct ClientRegistry {
    clients: HashMap<ClientId, Arc<ClientConnection>>,
}

impl ClientRegistry {
    pub(crate) fn insert(&mut self, client: Arc<ClientConnection>) {
        self.clients.insert(client.id(), client);
    }

    pub(crate) fn remove(&mut self, id: ClientId) -> Option<Arc<ClientConnection>> {
        self.clients.remove(&id)
    }

    pub(crate) fn get(&self, id: ClientId) -> Option<Arc<ClientConnection>> {
        self.clients.get(&id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }

    /// Ids in ascending (accept) order.
    pub(crate) fn ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
        ids.sort();
        ids
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.clients.values().cloned().collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<Arc<ClientConnection>> {
        self.clients.drain().map(|(_, client)| client).collect()
    }
}
