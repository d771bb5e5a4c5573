/// Errors surfaced by the channel's public contract.
///
/// Loop-internal I/O failures never propagate here; they flip the channel
/// to disconnected and are only visible through `is_connected()`.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The initial connection attempt failed (manager absent, permission
    /// denied, endpoint in use). Recoverable: callers may retry `connect()`.
    #[error("connect failed: {0}")]
    Connect(#[source] pipelink_transport::TransportError),

    /// A send or receive was attempted while disconnected. Programming
    /// error on the caller's side, surfaced immediately.
    #[error("not connected to manager")]
    NotConnected,

    /// The bounded outbound queue is full; the message was not enqueued.
    #[error("outbound queue full ({capacity} messages)")]
    QueueFull { capacity: usize },

    /// The channel disconnected while a blocking receive was waiting.
    #[error("channel disconnected")]
    Disconnected,

    /// Transport-level failure during connection setup.
    #[error("transport error: {0}")]
    Transport(#[from] pipelink_transport::TransportError),

    /// Frame-level failure during connection setup.
    #[error("frame error: {0}")]
    Frame(#[from] pipelink_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
