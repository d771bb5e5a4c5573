use std::path::{Path, PathBuf};

/// Base name of the manager endpoint, shared by both platforms.
///
/// The manager process creates the pipe/socket under this name; the client
/// side (us) only ever connects to it.
pub const PIPE_NAME: &str = "minecraft_manager";

/// Resolved location of the manager endpoint.
///
/// On Windows this is a named pipe path (`\\.\pipe\minecraft_manager`).
/// On POSIX it is a Unix domain socket path derived from `XDG_RUNTIME_DIR`,
/// falling back to `/tmp` when that variable is unset or empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: PathBuf,
}

impl Endpoint {
    /// Resolve the well-known manager endpoint for the current platform.
    pub fn resolve() -> Self {
        Self {
            path: default_path(),
        }
    }

    /// Use an explicit path instead of the well-known one.
    ///
    /// Intended for tests and CLI overrides; the manager peer will not be
    /// found here unless it was told about the same path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The platform path of this endpoint.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(windows)]
fn default_path() -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\{PIPE_NAME}"))
}

#[cfg(not(windows))]
fn default_path() -> PathBuf {
    runtime_dir().join(PIPE_NAME)
}

/// Socket directory: `XDG_RUNTIME_DIR` when set and non-empty, else `/tmp`.
///
/// `XDG_RUNTIME_DIR` is preferred because it is per-user and survives
/// sandboxed environments (flatpak) where `/tmp` may be namespaced.
#[cfg(not(windows))]
fn runtime_dir() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("/tmp"),
    }
}
