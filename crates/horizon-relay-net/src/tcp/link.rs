//! Single-use connection resource shared by the sender and listener.
//!
//! A [`Link`] owns the write half of one TCP stream; its read half belongs to
//! the task running [`read_loop`]. Closing a link is final: the owner drops it
//! and builds a fresh one for the next connection instead of reusing a closed
//! handle.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, Notify};

/// Why a read loop ended.
#[derive(Debug)]
pub(crate) enum ReadEnd {
    /// The peer closed its side (zero-length read).
    PeerClosed,
    /// The read failed with an I/O error.
    Failed(io::Error),
    /// The link was closed locally. Not an error.
    Shutdown,
}

/// The writable side of one connection plus its close state.
#[derive(Debug)]
pub(crate) struct Link {
    writer: Mutex<Option<OwnedWriteHalf>>,
    closing: AtomicBool,
    closed: Notify,
}

impl Link {
    pub(crate) fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            closing: AtomicBool::new(false),
            closed: Notify::new(),
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Write all of `bytes`, then flush.
    pub(crate) async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        if self.is_closing() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => {
                writer.write_all(bytes).await?;
                writer.flush().await
            }
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    /// Close the link and wake its read loop.
    ///
    /// Returns `false` if the link was already closed. The write half is
    /// dropped right away unless a write is in flight, in which case it goes
    /// with the last reference to the link.
    pub(crate) fn close(&self) -> bool {
        if self.closing.swap(true, Ordering::SeqCst) {
            return false;
        }
        // Stores a permit if the reader is not currently waiting.
        self.closed.notify_one();
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        true
    }
}

/// Read from `reader` until the peer closes, an error occurs, or `link` is
/// closed locally. Each non-empty read is decoded as UTF-8 (lossy) and handed
/// to `on_data`; no framing is applied.
pub(crate) async fn read_loop<F>(
    link: &Link,
    mut reader: OwnedReadHalf,
    buffer_size: usize,
    mut on_data: F,
) -> ReadEnd
where
    F: FnMut(String),
{
    let mut buffer = vec![0u8; buffer_size];

    loop {
        tokio::select! {
            biased;

            _ = link.closed.notified() => return ReadEnd::Shutdown,

            result = reader.read(&mut buffer) => match result {
                Ok(0) if link.is_closing() => return ReadEnd::Shutdown,
                Ok(0) => return ReadEnd::PeerClosed,
                Ok(n) => on_data(String::from_utf8_lossy(&buffer[..n]).into_owned()),
                Err(_) if link.is_closing() => return ReadEnd::Shutdown,
                Err(e) => return ReadEnd::Failed(e),
            },
        }
    }
}
