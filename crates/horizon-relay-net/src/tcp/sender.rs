//! Reconnecting TCP sender with heartbeat and signal-based event delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use horizon_relay_core::{IntervalTimer, LogSink, Signal, TracingLogSink};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::config::ConnectionConfig;
use super::event::{ConnectionEvent, forward};
use super::link::{Link, ReadEnd, read_loop};
use super::state::SenderState;
use crate::Result;
use crate::error::NetworkError;

/// Mutable sender state. Only transitions touch it.
struct SenderInner {
    state: SenderState,
    running: bool,
    link: Option<Arc<Link>>,
    /// Bumped on every successful connect; stale link notifications carry an
    /// older value and are ignored.
    generation: u64,
}

/// State shared between the public handle and the sender's tasks.
struct SenderShared {
    config: ConnectionConfig,
    log: Arc<dyn LogSink>,
    inner: Mutex<SenderInner>,
    /// Serializes transitions together with the events they raise. Reentrant
    /// so slots may call back into the sender.
    transitions: ReentrantMutex<()>,
    retry_timer: IntervalTimer,
    heartbeat_timer: Option<IntervalTimer>,
    connect_attempts: AtomicU64,
    connected: Arc<Signal<()>>,
    disconnected: Arc<Signal<()>>,
    data_received: Arc<Signal<String>>,
}

/// A TCP client that keeps one connection to a fixed endpoint alive.
///
/// After [`start`](Self::start), a retry timer attempts to connect every
/// `retry_interval_ms` until a connection succeeds. While connected, an
/// optional heartbeat writes `alive_message` every `alive_check_interval_ms`;
/// a failed heartbeat write, a zero-length read or a read error drops the
/// connection and re-arms the retry timer. Attempts continue at the fixed
/// interval until [`stop`](Self::stop).
///
/// Transport failures never surface as errors: they are logged through the
/// sender's [`LogSink`] and become state transitions. `Connected` and
/// `Disconnected` strictly alternate.
///
/// The wire format is raw text with no framing. One `data_received` emission
/// carries whatever a single read returned.
///
/// # Signals
///
/// - [`connected`](Self::connected): Emitted when a connection is established
/// - [`disconnected`](Self::disconnected): Emitted when an established connection is lost
/// - [`data_received`](Self::data_received): Emitted for every non-empty read
///
/// # Example
///
/// ```ignore
/// let config = ConnectionConfig::new("127.0.0.1", 7000)
///     .retry_interval_ms(1_000)
///     .alive_check(5_000, "PING");
///
/// let sender = Sender::new(config)?;
/// sender.connected.connect(|_| println!("Connected!"));
/// sender.data_received.connect(|text| println!("Received: {text}"));
///
/// sender.start();
/// if !sender.send("hello").await {
///     println!("not delivered");
/// }
/// ```
pub struct Sender {
    shared: Arc<SenderShared>,

    /// Signal emitted when a connection is established.
    pub connected: Arc<Signal<()>>,
    /// Signal emitted when an established connection is lost.
    pub disconnected: Arc<Signal<()>>,
    /// Signal emitted with the decoded text of each read.
    pub data_received: Arc<Signal<String>>,
}

impl Sender {
    /// Create a sender that logs through `tracing`.
    ///
    /// Fails with [`NetworkError::InvalidConfig`] if the retry interval is not
    /// positive, the port is 0, or the read buffer size is 0.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_log_sink(config, Arc::new(TracingLogSink::new("sender")))
    }

    /// Create a sender that reports diagnostics to `log`.
    pub fn with_log_sink(config: ConnectionConfig, log: Arc<dyn LogSink>) -> Result<Self> {
        config.validate()?;

        let retry_timer = IntervalTimer::new("sender-retry", config.retry_interval())
            .map_err(|e| NetworkError::InvalidConfig(e.to_string()))?;
        let heartbeat_timer = match config.alive_check_interval() {
            Some(interval) => Some(
                IntervalTimer::new("sender-heartbeat", interval)
                    .map_err(|e| NetworkError::InvalidConfig(e.to_string()))?,
            ),
            None => None,
        };

        let connected = Arc::new(Signal::new());
        let disconnected = Arc::new(Signal::new());
        let data_received = Arc::new(Signal::new());

        let shared = Arc::new(SenderShared {
            config,
            log,
            inner: Mutex::new(SenderInner {
                state: SenderState::Disconnected,
                running: false,
                link: None,
                generation: 0,
            }),
            transitions: ReentrantMutex::new(()),
            retry_timer,
            heartbeat_timer,
            connect_attempts: AtomicU64::new(0),
            connected: connected.clone(),
            disconnected: disconnected.clone(),
            data_received: data_received.clone(),
        });

        Ok(Self {
            shared,
            connected,
            disconnected,
            data_received,
        })
    }

    /// Start connecting. The first attempt is made right away.
    ///
    /// If the sender is already running, this is a no-op. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.running {
                return;
            }
            inner.running = true;
        }
        self.shared
            .log
            .info(&format!("Sender started for {}", self.shared.config.address()));
        SenderShared::arm_retry(&self.shared, true);
    }

    /// Stop the sender.
    ///
    /// Stops both timers and closes the connection if there is one. No events
    /// fire afterwards. Calling `stop` on a stopped sender does nothing.
    pub fn stop(&self) {
        self.shared.shutdown();
    }

    /// Write `message` to the connected endpoint.
    ///
    /// Returns `false` if not connected or if the write fails. A failed send
    /// is not retried and does not close the connection.
    pub async fn send(&self, message: impl AsRef<str>) -> bool {
        let message = message.as_ref();
        let Some((link, _)) = self.shared.current_link() else {
            self.shared.log.warning(&format!(
                "Cannot send to {}: not connected",
                self.shared.config.address()
            ));
            return false;
        };

        match link.write_all(message.as_bytes()).await {
            Ok(()) => {
                self.shared.log.debug(&format!(
                    "Sent {} bytes to {}",
                    message.len(),
                    self.shared.config.address()
                ));
                true
            }
            Err(e) => {
                self.shared.log.error(&format!(
                    "Send to {} failed: {e}",
                    self.shared.config.address()
                ));
                false
            }
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> SenderState {
        self.shared.inner.lock().state
    }

    /// Check if the sender is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == SenderState::Connected
    }

    /// Whether [`start`](Self::start) has been called without a later `stop`.
    pub fn is_running(&self) -> bool {
        self.shared.inner.lock().running
    }

    /// Number of connect attempts made so far.
    pub fn connect_attempts(&self) -> u64 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    /// Whether the reconnect timer is armed.
    pub fn is_retry_active(&self) -> bool {
        self.shared.retry_timer.is_active()
    }

    /// Whether the heartbeat timer is armed.
    pub fn is_heartbeat_active(&self) -> bool {
        self.shared
            .heartbeat_timer
            .as_ref()
            .is_some_and(IntervalTimer::is_active)
    }

    /// Receive this sender's events through a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        forward(&self.connected, &tx, |_| ConnectionEvent::Connected);
        forward(&self.disconnected, &tx, |_| ConnectionEvent::Disconnected);
        forward(&self.data_received, &tx, |text| {
            ConnectionEvent::DataReceived(text.clone())
        });
        rx
    }

    /// The configuration this sender was built with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Get the full address (host:port) this sender connects to.
    pub fn address(&self) -> String {
        self.shared.config.address()
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("address", &self.shared.config.address())
            .field("state", &self.state())
            .field("connect_attempts", &self.connect_attempts())
            .finish()
    }
}

impl SenderShared {
    fn arm_retry(this: &Arc<Self>, immediate: bool) {
        let weak = Arc::downgrade(this);
        let callback = move || {
            let weak = weak.clone();
            async move {
                if let Some(shared) = weak.upgrade() {
                    shared.attempt_connect().await;
                }
            }
        };
        if immediate {
            this.retry_timer.start_immediate(callback);
        } else {
            this.retry_timer.start(callback);
        }
    }

    fn arm_heartbeat(this: &Arc<Self>) {
        let Some(timer) = &this.heartbeat_timer else {
            return;
        };
        let weak = Arc::downgrade(this);
        timer.start(move || {
            let weak = weak.clone();
            async move {
                if let Some(shared) = weak.upgrade() {
                    shared.send_alive().await;
                }
            }
        });
    }

    fn current_link(&self) -> Option<(Arc<Link>, u64)> {
        let inner = self.inner.lock();
        match (&inner.link, inner.state) {
            (Some(link), SenderState::Connected) => Some((link.clone(), inner.generation)),
            _ => None,
        }
    }

    /// Retry timer firing: `Disconnected -> Connecting -> Connected | Disconnected`.
    async fn attempt_connect(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock();
            if !inner.running || inner.state != SenderState::Disconnected {
                return;
            }
            inner.state = SenderState::Connecting;
        }

        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.debug(&format!(
            "Connecting to {} (attempt {attempt})",
            self.config.address()
        ));

        match self.open_stream().await {
            Ok(stream) => self.on_connected(stream),
            Err(e) => {
                {
                    let mut inner = self.inner.lock();
                    if inner.state == SenderState::Connecting {
                        inner.state = SenderState::Disconnected;
                    }
                }
                self.log.error(&format!(
                    "Failed to connect to {}: {e}",
                    self.config.address()
                ));
            }
        }
    }

    async fn open_stream(&self) -> Result<TcpStream> {
        let addr = self.config.address();
        match self.config.connect_timeout() {
            Some(limit) => match timeout(limit, TcpStream::connect(&addr)).await {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(e)) => Err(NetworkError::Connection(e.to_string())),
                Err(_) => Err(NetworkError::Timeout(limit)),
            },
            None => TcpStream::connect(&addr)
                .await
                .map_err(|e| NetworkError::Connection(e.to_string())),
        }
    }

    fn on_connected(self: &Arc<Self>, stream: TcpStream) {
        let (reader, writer) = stream.into_split();

        let _transition = self.transitions.lock();
        let (link, generation) = {
            let mut inner = self.inner.lock();
            if !inner.running || inner.state != SenderState::Connecting {
                drop(inner);
                self.log.info(&format!(
                    "Discarding connection to {}: sender stopped",
                    self.config.address()
                ));
                return;
            }
            inner.generation += 1;
            let link = Arc::new(Link::new(writer));
            inner.link = Some(link.clone());
            inner.state = SenderState::Connected;
            (link, inner.generation)
        };

        Self::arm_heartbeat(self);
        self.retry_timer.stop();
        self.log
            .info(&format!("Connected to {}", self.config.address()));
        self.connected.emit(());

        // Reading starts only after `connected` has been delivered, so the
        // matching `disconnected` can never overtake it.
        let weak = Arc::downgrade(self);
        let data_received = self.data_received.clone();
        let log = self.log.clone();
        let address = self.config.address();
        let buffer_size = self.config.read_buffer_size;
        tokio::spawn(async move {
            let end = read_loop(&link, reader, buffer_size, |text| {
                log.debug(&format!("Received from {address}: {text}"));
                data_received.emit(text);
            })
            .await;
            drop(link);
            if let Some(shared) = weak.upgrade() {
                shared.on_read_end(generation, end);
            }
        });
    }

    fn on_read_end(self: &Arc<Self>, generation: u64, end: ReadEnd) {
        match end {
            ReadEnd::Shutdown => {
                self.log.info(&format!(
                    "Connection to {} closed",
                    self.config.address()
                ));
            }
            ReadEnd::PeerClosed => {
                self.connection_lost(generation, "remote endpoint closed the connection");
            }
            ReadEnd::Failed(e) => {
                self.connection_lost(generation, &format!("read failed: {e}"));
            }
        }
    }

    /// Heartbeat timer firing. A no-op unless connected.
    async fn send_alive(self: &Arc<Self>) {
        let Some((link, generation)) = self.current_link() else {
            return;
        };
        match link.write_all(self.config.alive_message.as_bytes()).await {
            Ok(()) => {
                self.log
                    .debug(&format!("Heartbeat sent to {}", self.config.address()));
            }
            Err(e) => {
                self.log.error(&format!(
                    "Heartbeat to {} failed: {e}",
                    self.config.address()
                ));
                self.connection_lost(generation, "heartbeat write failed");
            }
        }
    }

    /// `Connected -> Disconnected` for the link identified by `generation`.
    ///
    /// Returns `false` if that link is no longer current, in which case
    /// nothing happens.
    fn connection_lost(self: &Arc<Self>, generation: u64, reason: &str) -> bool {
        let _transition = self.transitions.lock();
        let link = {
            let mut inner = self.inner.lock();
            if inner.state != SenderState::Connected || inner.generation != generation {
                return false;
            }
            inner.state = SenderState::Disconnected;
            inner.link.take()
        };

        if let Some(link) = link {
            link.close();
        }
        if let Some(timer) = &self.heartbeat_timer {
            timer.stop();
        }
        Self::arm_retry(self, false);

        self.log.warning(&format!(
            "Lost connection to {}: {reason}",
            self.config.address()
        ));
        self.disconnected.emit(());
        true
    }

    fn shutdown(&self) {
        let _transition = self.transitions.lock();
        let link = {
            let mut inner = self.inner.lock();
            if !inner.running {
                return;
            }
            inner.running = false;
            inner.state = SenderState::Disconnected;
            inner.link.take()
        };

        self.retry_timer.stop();
        if let Some(timer) = &self.heartbeat_timer {
            timer.stop();
        }
        if let Some(link) = link {
            link.close();
        }
        self.log
            .info(&format!("Sender stopped for {}", self.config.address()));
    }
}
