use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of the setup phase of a push (validate, bind/connect, accept).
///
/// Exactly one value is produced per `start()` call. It never reflects how
/// the background streaming ended; see [`SessionState`](crate::SessionState)
/// for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferResult {
    /// Setup finished and the worker is streaming the file.
    Success,
    /// The file is missing or not a regular file.
    FilePathInvalid,
    /// Nothing is listening on the remote port (connection refused).
    ServerNotStarted,
    /// The remote host name could not be resolved.
    UnknownHost,
    /// Connect or accept did not finish within the configured timeout.
    SocketTimeout,
    /// Port outside 0–65535 (or 0 where a concrete port is required).
    PortOutOfRange,
    /// The listening port is taken by another socket.
    PortAlreadyInUse,
    /// The OS refused the operation (e.g. binding a privileged port).
    SecurityError,
    /// Any other I/O failure during setup.
    IoError,
    /// The server is still streaming a previous activation.
    ServerAlreadyRunning,
    /// The client is still streaming a previous activation.
    ClientAlreadyRunning,
}

impl TransferResult {
    /// Returns `true` only for [`TransferResult::Success`].
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// The stable upper-case name, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::FilePathInvalid => "FILE_PATH_INVALID",
            Self::ServerNotStarted => "SERVER_NOT_STARTED",
            Self::UnknownHost => "UNKNOWN_HOST",
            Self::SocketTimeout => "SOCKET_TIMEOUT",
            Self::PortOutOfRange => "PORT_OUT_OF_RANGE",
            Self::PortAlreadyInUse => "PORT_ALREADY_IN_USE",
            Self::SecurityError => "SECURITY_ERROR",
            Self::IoError => "IO_ERROR",
            Self::ServerAlreadyRunning => "SERVER_ALREADY_RUNNING",
            Self::ClientAlreadyRunning => "CLIENT_ALREADY_RUNNING",
        }
    }
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
