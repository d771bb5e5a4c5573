use std::io::{Read, Write};

use crate::endpoint::Endpoint;
use crate::error::Result;

/// A platform-specific connection strategy.
///
/// Exactly one implementation is selected at construction time (see
/// [`platform_transport`]); the channel layer never branches on the OS
/// again after that.
pub trait PlatformTransport: Send + Sync {
    /// Attempt one connection to the manager endpoint (blocking).
    fn connect(&self, endpoint: &Endpoint) -> Result<IpcStream>;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str;
}

/// The transport for the current platform.
pub fn platform_transport() -> Box<dyn PlatformTransport> {
    #[cfg(unix)]
    {
        Box::new(crate::uds::UdsTransport)
    }

    #[cfg(windows)]
    {
        Box::new(crate::winpipe::NamedPipeTransport)
    }
}

/// A connected duplex IPC stream implementing `Read` + `Write`.
///
/// On Unix this wraps a Unix domain socket stream; on Windows a named pipe
/// handle. [`IpcStream::shutdown`] unblocks a thread parked in a read or
/// write on any clone of the stream, which is how the channel layer
/// interrupts its loops during disconnect.
pub struct IpcStream {
    inner: IpcStreamInner,
}

enum IpcStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(windows)]
    Pipe(crate::winpipe::PipeHandle),
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.read(buf),
            #[cfg(windows)]
            IpcStreamInner::Pipe(handle) => handle.read(buf),
        }
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.write(buf),
            #[cfg(windows)]
            IpcStreamInner::Pipe(handle) => handle.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.flush(),
            #[cfg(windows)]
            IpcStreamInner::Pipe(handle) => handle.flush(),
        }
    }
}

impl IpcStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: IpcStreamInner::Unix(stream),
        }
    }

    #[cfg(windows)]
    pub(crate) fn from_pipe(handle: crate::winpipe::PipeHandle) -> Self {
        Self {
            inner: IpcStreamInner::Pipe(handle),
        }
    }

    /// Try to clone this stream (creates a new descriptor/handle for the
    /// same underlying connection).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
            #[cfg(windows)]
            IpcStreamInner::Pipe(handle) => {
                let cloned = handle.try_clone()?;
                Ok(Self::from_pipe(cloned))
            }
        }
    }

    /// Shut the connection down, unblocking pending reads and writes on
    /// every clone of this stream.
    ///
    /// Unix: `shutdown(SHUT_RDWR)` on the socket. Windows: cancels pending
    /// I/O on the pipe handle.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .or_else(ignore_not_connected)
                .map_err(Into::into),
            #[cfg(windows)]
            IpcStreamInner::Pipe(handle) => handle.cancel_io().map_err(Into::into),
        }
    }

    /// Set read timeout on the underlying stream (Unix only; no-op on
    /// Windows, where synchronous pipe reads have no per-call deadline).
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(windows)]
            IpcStreamInner::Pipe(_) => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Set write timeout on the underlying stream (Unix only).
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(windows)]
            IpcStreamInner::Pipe(_) => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Get the credentials of the connected peer (Linux only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            IpcStreamInner::Unix(stream) => stream.as_raw_fd(),
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this process.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of the connected peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

/// Shutdown of an already-dead socket is not an error during disconnect.
#[cfg(unix)]
fn ignore_not_connected(err: std::io::Error) -> std::io::Result<()> {
    if err.kind() == std::io::ErrorKind::NotConnected {
        Ok(())
    } else {
        Err(err)
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(_) => f.debug_struct("IpcStream").field("type", &"unix").finish(),
            #[cfg(windows)]
            IpcStreamInner::Pipe(_) => f
                .debug_struct("IpcStream")
                .field("type", &"named-pipe")
                .finish(),
        }
    }
}
