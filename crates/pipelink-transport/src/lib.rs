//! Platform transport layer for pipelink.
//!
//! Resolves the well-known manager endpoint and opens a duplex byte stream
//! to it over the native local transport:
//! - Unix domain sockets (Linux/macOS)
//! - Named pipes (Windows)
//!
//! This is the lowest layer of pipelink. The framing and channel layers
//! build on the [`IpcStream`] type provided here and never see the
//! platform behind it.

pub mod endpoint;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

#[cfg(windows)]
pub mod winpipe;

pub use endpoint::{Endpoint, PIPE_NAME};
pub use error::{Result, TransportError};
pub use traits::{platform_transport, IpcStream, PlatformTransport};

#[cfg(unix)]
pub use uds::{UdsListener, UdsTransport};

#[cfg(windows)]
pub use winpipe::NamedPipeTransport;
