//! TCP listener that tracks accepted connections and broadcasts to them.

use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use horizon_relay_core::{LogSink, Signal, TracingLogSink};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::client::{ClientConnection, ClientId, ClientInfo, ClientRegistry};
use super::config::ListenerConfig;
use super::event::{ListenerEvent, forward};
use super::link::{ReadEnd, read_loop};
use super::state::ListenerState;
use crate::Result;
use crate::error::NetworkError;

/// Pause after a failed accept before accepting again.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// The bound socket, shared by the accept task and `stop`.
///
/// The accept task only borrows the socket while polling, so closing it drops
/// the socket, and releases the port, on the calling thread.
struct AcceptSocket {
    listener: Mutex<Option<TcpListener>>,
}

impl AcceptSocket {
    fn new(listener: TcpListener) -> Self {
        Self {
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Wait for the next connection. `None` once the socket is closed.
    async fn accept(&self) -> Option<io::Result<(TcpStream, SocketAddr)>> {
        poll_fn(|cx| match self.listener.lock().as_ref() {
            Some(listener) => listener.poll_accept(cx).map(Some),
            None => Poll::Ready(None),
        })
        .await
    }

    /// Drop the socket. Returns `false` if it was already closed.
    fn close(&self) -> bool {
        self.listener.lock().take().is_some()
    }
}

/// Internal state for the listener.
struct ListenerInner {
    state: ListenerState,
    local_addr: Option<SocketAddr>,
    socket: Option<Arc<AcceptSocket>>,
    accept_task: Option<JoinHandle<()>>,
    clients: ClientRegistry,
}

struct ListenerShared {
    config: ListenerConfig,
    log: Arc<dyn LogSink>,
    inner: Mutex<ListenerInner>,
    client_connected: Arc<Signal<ClientInfo>>,
    client_disconnected: Arc<Signal<ClientId>>,
    data_received: Arc<Signal<(ClientId, String)>>,
}

/// A TCP server that accepts any number of clients.
///
/// Each accepted connection gets its own read loop. A connection is removed
/// from the listener's registry as soon as its read loop sees a zero-length
/// read or an error, so [`broadcast`](Self::broadcast) only reaches clients
/// that have not reported closure.
///
/// # Signals
///
/// - [`client_connected`](Self::client_connected): Emitted when a client is accepted
/// - [`client_disconnected`](Self::client_disconnected): Emitted when a client's read loop ends
/// - [`data_received`](Self::data_received): Emitted with the decoded text of each read
///
/// # Example
///
/// ```ignore
/// let listener = Listener::new(ListenerConfig::any_address(7000))?;
///
/// listener.data_received.connect(|(id, text)| {
///     println!("{id}: {text}");
/// });
///
/// let addr = listener.start().await?;
/// listener.broadcast("hello everyone").await;
/// listener.stop();
/// ```
pub struct Listener {
    shared: Arc<ListenerShared>,

    /// Signal emitted when a new client is accepted.
    pub client_connected: Arc<Signal<ClientInfo>>,
    /// Signal emitted when a client connection ends.
    pub client_disconnected: Arc<Signal<ClientId>>,
    /// Signal emitted when data is received from a client.
    pub data_received: Arc<Signal<(ClientId, String)>>,
}

impl Listener {
    /// Create a listener that logs through `tracing`.
    pub fn new(config: ListenerConfig) -> Result<Self> {
        Self::with_log_sink(config, Arc::new(TracingLogSink::new("listener")))
    }

    /// Create a listener that reports diagnostics to `log`.
    pub fn with_log_sink(config: ListenerConfig, log: Arc<dyn LogSink>) -> Result<Self> {
        config.validate()?;

        let client_connected = Arc::new(Signal::new());
        let client_disconnected = Arc::new(Signal::new());
        let data_received = Arc::new(Signal::new());

        let shared = Arc::new(ListenerShared {
            config,
            log,
            inner: Mutex::new(ListenerInner {
                state: ListenerState::Stopped,
                local_addr: None,
                socket: None,
                accept_task: None,
                clients: ClientRegistry::default(),
            }),
            client_connected: client_connected.clone(),
            client_disconnected: client_disconnected.clone(),
            data_received: data_received.clone(),
        });

        Ok(Self {
            shared,
            client_connected,
            client_disconnected,
            data_received,
        })
    }

    /// Bind, listen, and start accepting connections.
    ///
    /// Returns the bound address; useful when the configured port is 0. If the
    /// listener is already running, returns its current address. A bind
    /// failure is logged and returned.
    pub async fn start(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let bind_addr = self.shared.config.bind_addr();
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.shared
                    .log
                    .error(&format!("Failed to bind {bind_addr}: {e}"));
                return Err(NetworkError::TcpSocket(format!(
                    "Failed to bind {bind_addr}: {e}"
                )));
            }
        };
        let local_addr = listener.local_addr()?;

        {
            let mut inner = self.shared.inner.lock();
            if let Some(addr) = inner.local_addr {
                // Lost a race with a concurrent start.
                return Ok(addr);
            }
            let socket = Arc::new(AcceptSocket::new(listener));
            inner.state = ListenerState::Listening;
            inner.local_addr = Some(local_addr);
            inner.socket = Some(socket.clone());
            let weak = Arc::downgrade(&self.shared);
            inner.accept_task = Some(tokio::spawn(async move {
                while let Some(result) = socket.accept().await {
                    let Some(shared) = weak.upgrade() else {
                        break;
                    };
                    match result {
                        Ok((stream, peer_addr)) => shared.register(stream, peer_addr),
                        Err(e) => {
                            shared.log.error(&format!("Accept failed: {e}"));
                            drop(shared);
                            tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                        }
                    }
                }
            }));
        }

        self.shared
            .log
            .info(&format!("Listening on port {}", local_addr.port()));
        Ok(local_addr)
    }

    /// Stop listening and close every tracked connection.
    ///
    /// Calling `stop` on a listener that is not running does nothing.
    pub fn stop(&self) {
        self.shared.shutdown();
    }

    /// Write `message` to every tracked client that is still connected.
    ///
    /// Clients that report themselves disconnected are skipped, not removed.
    /// Returns the number of clients the message was written to.
    pub async fn broadcast(&self, message: impl AsRef<str>) -> usize {
        let message = message.as_ref();
        let clients = self.shared.inner.lock().clients.snapshot();

        let mut delivered = 0;
        for client in clients {
            if !client.is_connected() {
                continue;
            }
            match client.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) => self.shared.log.warning(&format!(
                    "Broadcast to {} ({}) failed: {e}",
                    client.id(),
                    client.peer_addr()
                )),
            }
        }

        self.shared.log.debug(&format!(
            "Broadcast {} bytes to {delivered} client(s)",
            message.len()
        ));
        delivered
    }

    /// Write `message` to one client. Returns `false` if the client is
    /// unknown, disconnected, or the write fails.
    pub async fn send_to(&self, id: ClientId, message: impl AsRef<str>) -> bool {
        let Some(client) = self.shared.inner.lock().clients.get(id) else {
            return false;
        };
        match client.send(message.as_ref()).await {
            Ok(()) => true,
            Err(e) => {
                self.shared
                    .log
                    .warning(&format!("Send to {id} failed: {e}"));
                false
            }
        }
    }

    /// Close one client's connection. Its read loop removes it from the
    /// registry. Returns `false` if the client is unknown or already closed.
    pub fn disconnect_client(&self, id: ClientId) -> bool {
        let client = self.shared.inner.lock().clients.get(id);
        client.is_some_and(|client| client.close())
    }

    /// Get the current listener state.
    pub fn state(&self) -> ListenerState {
        self.shared.inner.lock().state
    }

    /// Check if the listener is accepting connections.
    pub fn is_listening(&self) -> bool {
        self.state() == ListenerState::Listening
    }

    /// Number of tracked connections.
    pub fn connection_count(&self) -> usize {
        self.shared.inner.lock().clients.len()
    }

    /// Ids of all tracked connections, oldest first.
    pub fn connections(&self) -> Vec<ClientId> {
        self.shared.inner.lock().clients.ids()
    }

    /// Get a tracked connection by id.
    pub fn get_connection(&self, id: ClientId) -> Option<Arc<ClientConnection>> {
        self.shared.inner.lock().clients.get(id)
    }

    /// The bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.inner.lock().local_addr
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> String {
        self.shared.config.bind_addr()
    }

    /// Receive this listener's events through a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ListenerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        forward(&self.client_connected, &tx, |info| {
            ListenerEvent::ClientConnected(*info)
        });
        forward(&self.client_disconnected, &tx, |id| {
            ListenerEvent::ClientDisconnected(*id)
        });
        forward(&self.data_received, &tx, |(id, text)| {
            ListenerEvent::DataReceived(*id, text.clone())
        });
        rx
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("bind_addr", &self.shared.config.bind_addr())
            .field("state", &self.state())
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl ListenerShared {
    /// Track a freshly accepted stream and start its read loop.
    fn register(self: &Arc<Self>, stream: TcpStream, peer_addr: SocketAddr) {
        let id = ClientId::new();
        let (reader, writer) = stream.into_split();
        let client = Arc::new(ClientConnection::new(id, peer_addr, writer));

        {
            let mut inner = self.inner.lock();
            if inner.state != ListenerState::Listening {
                return;
            }
            inner.clients.insert(client.clone());
        }

        self.log.info(&format!(
            "Accepted {id} from {}:{}",
            peer_addr.ip(),
            peer_addr.port()
        ));
        self.client_connected.emit(client.info());

        let weak = Arc::downgrade(self);
        let data_received = self.data_received.clone();
        let log = self.log.clone();
        let buffer_size = self.config.read_buffer_size;
        tokio::spawn(async move {
            let end = read_loop(&client.link, reader, buffer_size, |text| {
                log.debug(&format!("Received from {id} ({peer_addr}): {text}"));
                data_received.emit((id, text));
            })
            .await;
            client.close();
            if let Some(shared) = weak.upgrade() {
                shared.on_read_end(id, peer_addr, end);
            }
        });
    }

    fn on_read_end(&self, id: ClientId, peer_addr: SocketAddr, end: ReadEnd) {
        let removed = self.inner.lock().clients.remove(id);

        match &end {
            ReadEnd::PeerClosed => self
                .log
                .info(&format!("{id} ({peer_addr}) closed the connection")),
            ReadEnd::Failed(e) => self
                .log
                .warning(&format!("Read from {id} ({peer_addr}) failed: {e}")),
            ReadEnd::Shutdown => self
                .log
                .info(&format!("Connection to {id} ({peer_addr}) closed")),
        }

        if removed.is_some() {
            self.client_disconnected.emit(id);
        }
    }

    fn shutdown(&self) {
        let (socket, accept_task, clients, local_addr) = {
            let mut inner = self.inner.lock();
            if inner.state == ListenerState::Stopped {
                return;
            }
            inner.state = ListenerState::Stopped;
            (
                inner.socket.take(),
                inner.accept_task.take(),
                inner.clients.drain(),
                inner.local_addr.take(),
            )
        };

        if let Some(socket) = socket {
            socket.close();
        }
        if let Some(task) = accept_task {
            task.abort();
        }
        for client in clients {
            if !client.close() {
                self.log
                    .debug(&format!("{} was already closed", client.id()));
            }
        }

        match local_addr {
            Some(addr) => self
                .log
                .info(&format!("Stopped listening, released port {}", addr.port())),
            None => self.log.info("Stopped listening"),
        }
    }
}
