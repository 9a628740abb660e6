//! Transfer configuration shared by both roles.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use filepush_protocol::{DEFAULT_CLIENT_TIMEOUT_MILLIS, DEFAULT_SERVER_TIMEOUT_MILLIS};

use crate::error::PushError;

/// Immutable description of one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Host to dial (client) or address to bind (server, empty = all IPv4
    /// interfaces).
    pub remote_host: String,
    /// Port as received from the caller; range-checked at `start()`.
    pub port: i32,
    /// Connect timeout (client) or accept timeout (server). 0 = no limit.
    pub timeout_millis: u64,
    /// File to push. Must be a regular file when `start()` runs.
    pub file_path: PathBuf,
}

impl TransferConfig {
    /// Server-side config listening on all interfaces with the default
    /// accept timeout.
    pub fn server(port: i32, file_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_host: String::new(),
            port,
            timeout_millis: DEFAULT_SERVER_TIMEOUT_MILLIS,
            file_path: file_path.into(),
        }
    }

    /// Client-side config with the default connect timeout.
    pub fn client(remote_host: impl Into<String>, port: i32, file_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_host: remote_host.into(),
            port,
            timeout_millis: DEFAULT_CLIENT_TIMEOUT_MILLIS,
            file_path: file_path.into(),
        }
    }

    pub fn with_timeout_millis(mut self, timeout_millis: u64) -> Self {
        self.timeout_millis = timeout_millis;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.remote_host = host.into();
        self
    }

    /// Setup timeout, `None` when unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        setup_timeout(self.timeout_millis)
    }

    /// Checks that the file exists and is a regular file.
    pub(crate) async fn validate_file(&self) -> Result<(), PushError> {
        match tokio::fs::metadata(&self.file_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(PushError::InvalidFile(self.file_path.clone())),
        }
    }

    /// Port to listen on; 0 asks the OS for an ephemeral port.
    pub(crate) fn listen_port(&self) -> Result<u16, PushError> {
        u16::try_from(self.port).map_err(|_| PushError::PortOutOfRange(self.port))
    }

    /// Port to dial; 0 is not a connectable destination.
    pub(crate) fn dial_port(&self) -> Result<u16, PushError> {
        match u16::try_from(self.port) {
            Ok(0) | Err(_) => Err(PushError::PortOutOfRange(self.port)),
            Ok(port) => Ok(port),
        }
    }
}

/// Converts a millisecond setup timeout; 0 means no limit.
pub fn setup_timeout(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

/// Runs a setup step under an optional deadline, turning expiry into the
/// caller's error with `timed_out`.
pub(crate) async fn bounded<T, E, F>(
    limit: Option<Duration>,
    fut: F,
    timed_out: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(limit)),
        },
        None => fut.await,
    }
}
