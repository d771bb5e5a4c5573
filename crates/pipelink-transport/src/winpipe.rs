use std::ffi::c_void;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;
use windows_sys::Win32::Foundation::{
    CloseHandle, DuplicateHandle, GetLastError, DUPLICATE_SAME_ACCESS, ERROR_BROKEN_PIPE,
    ERROR_NOT_FOUND, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FlushFileBuffers, ReadFile, WriteFile, OPEN_EXISTING,
};
use windows_sys::Win32::System::Threading::GetCurrentProcess;
use windows_sys::Win32::System::IO::CancelIoEx;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{IpcStream, PlatformTransport};

/// Client-side named pipe transport.
///
/// Opens `\\.\pipe\minecraft_manager` for exclusive bidirectional access.
/// The pipe is used as a byte stream; framing is supplied by the codec
/// layer, identically to the Unix path.
pub struct NamedPipeTransport;

impl PlatformTransport for NamedPipeTransport {
    fn connect(&self, endpoint: &Endpoint) -> Result<IpcStream> {
        let wide: Vec<u16> = endpoint
            .path()
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: `wide` is a valid NUL-terminated UTF-16 path for the duration
        // of the call; all other arguments are plain flags or null.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0, // no sharing
                std::ptr::null(),
                OPEN_EXISTING,
                0,
                std::ptr::null_mut(),
            )
        };

        if handle == INVALID_HANDLE_VALUE {
            return Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        debug!(%endpoint, "connected to manager pipe");
        Ok(IpcStream::from_pipe(PipeHandle {
            handle,
            shut_down: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn name(&self) -> &'static str {
        "named-pipe"
    }
}

/// An open named pipe handle with blocking synchronous I/O.
///
/// All clones of a handle share one shutdown flag. `CancelIoEx` only
/// affects I/O that is pending at the instant of the call; the flag makes
/// the shutdown visible to reads and writes issued afterwards, so the
/// combination behaves like the sticky `shutdown(2)` of a Unix socket.
pub struct PipeHandle {
    handle: HANDLE,
    shut_down: Arc<AtomicBool>,
}

// The handle is used from the reader and writer threads and closed exactly
// once on drop; Win32 pipe handles are safe to use across threads.
unsafe impl Send for PipeHandle {}
unsafe impl Sync for PipeHandle {}

impl PipeHandle {
    /// Duplicate the handle for a second reader/writer.
    pub fn try_clone(&self) -> io::Result<Self> {
        let mut duplicated: HANDLE = std::ptr::null_mut();
        // SAFETY: both process handles are the current process pseudo-handle
        // and `duplicated` is a valid out-pointer.
        let ok = unsafe {
            DuplicateHandle(
                GetCurrentProcess(),
                self.handle,
                GetCurrentProcess(),
                &mut duplicated,
                0,
                0,
                DUPLICATE_SAME_ACCESS,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            handle: duplicated,
            shut_down: Arc::clone(&self.shut_down),
        })
    }

    /// Shut the pipe down: mark every clone as closed and cancel pending
    /// synchronous I/O, unblocking a thread parked in `ReadFile` or
    /// `WriteFile`. Subsequent reads return EOF without touching the OS.
    pub fn cancel_io(&self) -> io::Result<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        // SAFETY: the handle is open; a null overlapped pointer cancels all
        // pending requests on it.
        let ok = unsafe { CancelIoEx(self.handle, std::ptr::null()) };
        if ok == 0 {
            // No pending I/O to cancel is not a failure during shutdown.
            let err = unsafe { GetLastError() };
            if err == ERROR_NOT_FOUND {
                return Ok(());
            }
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl io::Read for PipeHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let mut read: u32 = 0;
        // SAFETY: `buf` is valid for writes of its length and `read` is a
        // valid out-pointer; no overlapped structure is used.
        let ok = unsafe {
            ReadFile(
                self.handle,
                buf.as_mut_ptr().cast::<c_void>(),
                buf.len() as u32,
                &mut read,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            let err = unsafe { GetLastError() };
            // The manager closing its end surfaces as a broken pipe; treat
            // it as EOF so the framing layer sees a clean close.
            if err == ERROR_BROKEN_PIPE {
                return Ok(0);
            }
            return Err(io::Error::last_os_error());
        }
        Ok(read as usize)
    }
}

impl io::Write for PipeHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe has been shut down",
            ));
        }
        let mut written: u32 = 0;
        // SAFETY: `buf` is valid for reads of its length and `written` is a
        // valid out-pointer; no overlapped structure is used.
        let ok = unsafe {
            WriteFile(
                self.handle,
                buf.as_ptr().cast::<c_void>(),
                buf.len() as u32,
                &mut written,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(written as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Ok(());
        }
        // SAFETY: the handle is open for writing.
        let ok = unsafe { FlushFileBuffers(self.handle) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        // SAFETY: the handle is owned by this value and closed exactly once.
        unsafe {
            CloseHandle(self.handle);
        }
    }
}
