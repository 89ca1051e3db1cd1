//! Tests for the reconnecting TCP sender.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use horizon_relay_net::tcp::{
    ConnectionConfig, ConnectionEvent, Listener, ListenerConfig, Sender, SenderState,
};
use horizon_relay_net::{LogLevel, MemoryLogSink, NetworkError, NullLogSink};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A loopback port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn quiet_sender(config: ConnectionConfig) -> Sender {
    Sender::with_log_sink(config, Arc::new(NullLogSink)).unwrap()
}

#[test]
fn test_non_positive_retry_interval_fails_construction() {
    for ms in [0, -1, -1000, i64::MIN] {
        let config = ConnectionConfig::new("127.0.0.1", 7000).retry_interval_ms(ms);
        let result = Sender::new(config);
        assert!(
            matches!(result, Err(NetworkError::InvalidConfig(_))),
            "retry interval {ms} should be rejected"
        );
    }
}

#[test]
fn test_sender_initial_state() {
    let sender = quiet_sender(ConnectionConfig::new("127.0.0.1", 7000));

    assert_eq!(sender.state(), SenderState::Disconnected);
    assert!(!sender.is_connected());
    assert!(!sender.is_running());
    assert!(!sender.is_retry_active());
    assert!(!sender.is_heartbeat_active());
    assert_eq!(sender.connect_attempts(), 0);
    assert_eq!(sender.address(), "127.0.0.1:7000");
}

#[tokio::test]
async fn test_send_while_disconnected_returns_false() {
    let log = Arc::new(MemoryLogSink::new());
    let sender =
        Sender::with_log_sink(ConnectionConfig::new("127.0.0.1", 7000), log.clone()).unwrap();

    assert!(!sender.send("hello").await);
    assert_eq!(log.count(LogLevel::Warning), 1);
    assert_eq!(sender.state(), SenderState::Disconnected);
}

#[tokio::test]
async fn test_unreachable_endpoint_keeps_retrying() {
    let port = closed_port().await;
    let log = Arc::new(MemoryLogSink::new());
    let config = ConnectionConfig::new("127.0.0.1", port)
        .retry_interval_ms(50)
        .connect_timeout_ms(200);
    let sender = Sender::with_log_sink(config, log.clone()).unwrap();

    let connects = Arc::new(AtomicUsize::new(0));
    let connects_clone = connects.clone();
    sender.connected.connect(move |_| {
        connects_clone.fetch_add(1, Ordering::SeqCst);
    });

    sender.start();
    assert!(wait_until(|| sender.connect_attempts() >= 3).await);

    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert_ne!(sender.state(), SenderState::Connected);
    assert!(sender.is_retry_active());
    assert!(log.count(LogLevel::Error) >= 2);

    sender.stop();
    assert!(!sender.is_retry_active());
}

#[tokio::test]
async fn test_events_alternate_across_reconnects() {
    // Accepts and immediately drops every connection.
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();
    let acceptor = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = server.accept().await else {
                break;
            };
            drop(stream);
        }
    });

    let sender = quiet_sender(ConnectionConfig::new("127.0.0.1", port).retry_interval_ms(30));
    let mut events = sender.subscribe();
    sender.start();

    let mut seen = Vec::new();
    while seen.iter().filter(|e| **e == ConnectionEvent::Disconnected).count() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("sender should keep reconnecting")
            .unwrap();
        seen.push(event);
    }
    sender.stop();
    acceptor.abort();

    for (i, event) in seen.iter().enumerate() {
        let expected = if i % 2 == 0 {
            ConnectionEvent::Connected
        } else {
            ConnectionEvent::Disconnected
        };
        assert_eq!(*event, expected, "event {i} out of order: {seen:?}");
    }
    assert!(sender.connect_attempts() >= 3);
}

#[tokio::test]
async fn test_reconnects_after_peer_closes() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();
    // Drop the first connection, keep the second.
    let acceptor = tokio::spawn(async move {
        let (first, _) = server.accept().await.unwrap();
        drop(first);
        server.accept().await.unwrap().0
    });

    let sender = quiet_sender(ConnectionConfig::new("127.0.0.1", port).retry_interval_ms(50));
    let connects = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    let connects_clone = connects.clone();
    let disconnects_clone = disconnects.clone();
    sender.connected.connect(move |_| {
        connects_clone.fetch_add(1, Ordering::SeqCst);
    });
    sender.disconnected.connect(move |_| {
        disconnects_clone.fetch_add(1, Ordering::SeqCst);
    });

    sender.start();
    let _second = acceptor.await.unwrap();
    assert!(wait_until(|| connects.load(Ordering::SeqCst) == 2 && sender.is_connected()).await);

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert!(!sender.is_retry_active());

    sender.stop();
}

#[tokio::test]
async fn test_data_from_peer_is_delivered() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();
    let peer = tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        stream.write_all(b"status: ok").await.unwrap();
        stream
    });

    let sender = quiet_sender(ConnectionConfig::new("127.0.0.1", port));
    let received = Arc::new(parking_lot::Mutex::new(String::new()));
    let received_clone = received.clone();
    sender.data_received.connect(move |text| {
        received_clone.lock().push_str(text);
    });

    sender.start();
    let _stream = peer.await.unwrap();
    assert!(wait_until(|| received.lock().as_str() == "status: ok").await);

    sender.stop();
}

#[tokio::test]
async fn test_round_trip_with_listener() {
    let listener = Listener::with_log_sink(
        ListenerConfig::new("127.0.0.1", 0),
        Arc::new(NullLogSink),
    )
    .unwrap();
    let addr = listener.start().await.unwrap();

    let at_listener = Arc::new(parking_lot::Mutex::new(String::new()));
    let at_listener_clone = at_listener.clone();
    listener.data_received.connect(move |(_, text)| {
        at_listener_clone.lock().push_str(text);
    });

    let sender = quiet_sender(ConnectionConfig::new("127.0.0.1", addr.port()));
    let at_sender = Arc::new(parking_lot::Mutex::new(String::new()));
    let at_sender_clone = at_sender.clone();
    sender.data_received.connect(move |text| {
        at_sender_clone.lock().push_str(text);
    });

    sender.start();
    assert!(wait_until(|| sender.is_connected() && listener.connection_count() == 1).await);

    assert!(sender.send("hello relay").await);
    assert!(wait_until(|| at_listener.lock().as_str() == "hello relay").await);

    assert_eq!(listener.broadcast("ack").await, 1);
    assert!(wait_until(|| at_sender.lock().as_str() == "ack").await);

    sender.stop();
    assert!(wait_until(|| listener.connection_count() == 0).await);
    listener.stop();
}

#[tokio::test]
async fn test_heartbeat_reaches_peer() {
    let listener = Listener::with_log_sink(
        ListenerConfig::new("127.0.0.1", 0),
        Arc::new(NullLogSink),
    )
    .unwrap();
    let addr = listener.start().await.unwrap();

    let received = Arc::new(parking_lot::Mutex::new(String::new()));
    let received_clone = received.clone();
    listener.data_received.connect(move |(_, text)| {
        received_clone.lock().push_str(text);
    });

    let config = ConnectionConfig::new("127.0.0.1", addr.port()).alive_check(40, "PING");
    let sender = quiet_sender(config);
    sender.start();

    assert!(wait_until(|| sender.is_heartbeat_active()).await);
    assert!(wait_until(|| received.lock().contains("PINGPING")).await);

    sender.stop();
    assert!(!sender.is_heartbeat_active());
    listener.stop();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let port = closed_port().await;
    let sender = quiet_sender(ConnectionConfig::new("127.0.0.1", port).retry_interval_ms(50));

    // Stopping a sender that never started is a no-op.
    sender.stop();

    sender.start();
    assert!(sender.is_running());
    sender.stop();
    sender.stop();

    assert!(!sender.is_running());
    assert!(!sender.is_retry_active());
    assert!(!sender.is_heartbeat_active());
    assert_eq!(sender.state(), SenderState::Disconnected);
}

#[tokio::test]
async fn test_stop_emits_no_disconnect() {
    let listener = Listener::with_log_sink(
        ListenerConfig::new("127.0.0.1", 0),
        Arc::new(NullLogSink),
    )
    .unwrap();
    let addr = listener.start().await.unwrap();

    let sender = quiet_sender(ConnectionConfig::new("127.0.0.1", addr.port()));
    let mut events = sender.subscribe();
    sender.start();
    assert!(wait_until(|| sender.is_connected()).await);

    sender.stop();
    assert!(wait_until(|| listener.connection_count() == 0).await);

    assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Connected);
    assert!(events.try_recv().is_err());
    listener.stop();
}
