//! State enums for the TCP sender and listener.

/// Current state of a [`Sender`](super::Sender).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SenderState {
    /// No live connection. The retry timer drives the next attempt.
    #[default]
    Disconnected,
    /// A connect attempt is outstanding.
    Connecting,
    /// Connected and ready to send/receive data.
    Connected,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Current state of a [`Listener`](super::Listener).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListenerState {
    /// Not listening.
    #[default]
    Stopped,
    /// Bound and accepting connections.
    Listening,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Listening => write!(f, "Listening"),
        }
    }
}
