use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{IpcStream, PlatformTransport};

/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Default permission mode for created socket paths.
const DEFAULT_SOCKET_MODE: u32 = 0o600;

/// Client-side Unix domain socket transport.
///
/// The manager owns the listening socket; this side only connects to it.
pub struct UdsTransport;

impl PlatformTransport for UdsTransport {
    fn connect(&self, endpoint: &Endpoint) -> Result<IpcStream> {
        let path = endpoint.path();
        validate_path_len(path)?;
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source: e,
        })?;
        debug!(%endpoint, "connected to manager socket");
        Ok(IpcStream::from_unix(stream))
    }

    fn name(&self) -> &'static str {
        "unix-domain-socket"
    }
}

/// Listening side of the socket, standing in for the manager process.
///
/// Used by the CLI `listen` command and by loopback tests; the production
/// manager is an external process. The socket file is created with 0600
/// permissions and removed on drop if its inode is still ours.
pub struct UdsListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UdsListener {
    /// Bind and listen at the endpoint's socket path.
    ///
    /// A stale socket file left by a previous run is removed first; an
    /// existing path that is not a socket is refused.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let path = endpoint.path().to_path_buf();
        validate_path_len(&path)?;

        // Remove stale sockets only, never arbitrary files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                    path: path.clone(),
                    source: e,
                })?;
            } else {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(DEFAULT_SOCKET_MODE))
            .map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        let created_metadata =
            std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        info!(?path, "listening for client connections");

        Ok(Self {
            listener,
            path,
            created_inode,
        })
    }

    /// Accept the next client connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!("accepted client connection");
        Ok(IpcStream::from_unix(stream))
    }

    /// The path this listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UdsListener {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping cleanup"
                    );
                }
            }
        }
    }
}

fn validate_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn temp_endpoint(tag: &str) -> (PathBuf, Endpoint) {
        let dir = std::env::temp_dir().join(format!("pipelink-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("manager.sock");
        (dir, Endpoint::with_path(path))
    }

    #[test]
    fn bind_accept_connect() {
        let (dir, endpoint) = temp_endpoint("uds");
        let listener = UdsListener::bind(&endpoint).unwrap();
        assert!(endpoint.path().exists());

        let client_endpoint = endpoint.clone();
        let handle = std::thread::spawn(move || {
            let mut client = UdsTransport.connect(&client_endpoint).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();

        drop(listener);
        assert!(
            !endpoint.path().exists(),
            "socket file should be cleaned up on drop"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_without_listener_fails() {
        let (dir, endpoint) = temp_endpoint("absent");
        let err = UdsTransport.connect(&endpoint).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long_rejected() {
        let endpoint = Endpoint::with_path(format!("/tmp/{}.sock", "a".repeat(200)));
        let result = UdsListener::bind(&endpoint);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn bind_hardens_permissions() {
        let (dir, endpoint) = temp_endpoint("perms");
        let listener = UdsListener::bind(&endpoint).unwrap();
        let mode = std::fs::metadata(endpoint.path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let (dir, endpoint) = temp_endpoint("regular");
        std::fs::write(endpoint.path(), b"regular-file").unwrap();

        let result = UdsListener::bind(&endpoint);
        assert!(matches!(result, Err(TransportError::Bind { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn drop_does_not_remove_replaced_path() {
        let (dir, endpoint) = temp_endpoint("droprace");
        let listener = UdsListener::bind(&endpoint).unwrap();
        assert!(endpoint.path().exists());

        // Replace the path while the listener is alive.
        std::fs::remove_file(endpoint.path()).unwrap();
        std::fs::write(endpoint.path(), b"replacement-file").unwrap();

        drop(listener);
        assert!(
            endpoint.path().exists(),
            "drop must not remove path if inode identity changed"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn shutdown_unblocks_blocked_read() {
        let (dir, endpoint) = temp_endpoint("shutdown");
        let listener = UdsListener::bind(&endpoint).unwrap();

        let client_endpoint = endpoint.clone();
        let connector =
            std::thread::spawn(move || UdsTransport.connect(&client_endpoint).unwrap());
        let server = listener.accept().unwrap();
        let client = connector.join().unwrap();

        let mut reading_half = client.try_clone().unwrap();
        let reader = std::thread::spawn(move || {
            let mut buf = [0u8; 16];
            reading_half.read(&mut buf)
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        client.shutdown().unwrap();

        // A shut-down socket reads as EOF.
        let read = reader.join().unwrap().unwrap();
        assert_eq!(read, 0);

        drop(server);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn shutdown_is_sticky_for_subsequent_reads() {
        let (dir, endpoint) = temp_endpoint("sticky");
        let listener = UdsListener::bind(&endpoint).unwrap();

        let client_endpoint = endpoint.clone();
        let connector =
            std::thread::spawn(move || UdsTransport.connect(&client_endpoint).unwrap());
        let server = listener.accept().unwrap();
        let client = connector.join().unwrap();

        let mut reading_half = client.try_clone().unwrap();
        client.shutdown().unwrap();

        // Reads issued after the shutdown, on any clone, must not block.
        let mut buf = [0u8; 16];
        assert_eq!(reading_half.read(&mut buf).unwrap(), 0);
        assert_eq!(reading_half.read(&mut buf).unwrap(), 0);

        drop(server);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn accepted_stream_reports_peer_credentials() {
        let (dir, endpoint) = temp_endpoint("peercred");
        let listener = UdsListener::bind(&endpoint).unwrap();

        let client_endpoint = endpoint.clone();
        let connector =
            std::thread::spawn(move || UdsTransport.connect(&client_endpoint).unwrap());
        let server = listener.accept().unwrap();
        let _client = connector.join().unwrap();

        let (uid, gid, pid) = server
            .peer_credentials()
            .expect("local peer credentials should be available");
        // SAFETY: getuid/getgid cannot fail and take no arguments.
        assert_eq!(uid, unsafe { libc::getuid() });
        assert_eq!(gid, unsafe { libc::getgid() });
        assert_eq!(pid, std::process::id());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
