//! Framed duplex channel between a game client and its manager process.
//!
//! This is the core value-add layer of pipelink. A [`Channel`] owns one
//! connection to the local manager endpoint and exposes ordered, framed
//! exchange of opaque messages through two bounded queues: an outbound
//! queue drained by a dedicated writer thread and an inbound queue filled
//! by a dedicated reader thread.
//!
//! The channel never interprets payloads; callers bring their own
//! [`WireMessage`] type (raw [`bytes::Bytes`] works out of the box).

pub mod channel;
pub mod error;
pub mod message;

mod queue;

pub use channel::{Channel, ChannelConfig};
pub use error::{ChannelError, Result};
pub use message::WireMessage;
