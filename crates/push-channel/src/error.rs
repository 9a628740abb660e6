//! Error types for the push channel.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use filepush_protocol::TransferResult;

/// Failures of the setup phase (validate, bind, connect, accept).
///
/// These never escape `start()`; they are logged and folded into a
/// [`TransferResult`] via [`PushError::result`].
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("not a regular file: {}", .0.display())]
    InvalidFile(PathBuf),

    #[error("port out of range: {0}")]
    PortOutOfRange(i32),

    #[error("unknown host: {host}")]
    UnknownHost {
        host: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server is already streaming")]
    ServerAlreadyRunning,

    #[error("client is already streaming")]
    ClientAlreadyRunning,
}

impl PushError {
    /// Maps the failure onto the result code reported to the caller.
    pub fn result(&self) -> TransferResult {
        match self {
            Self::InvalidFile(_) => TransferResult::FilePathInvalid,
            Self::PortOutOfRange(_) => TransferResult::PortOutOfRange,
            Self::UnknownHost { .. } => TransferResult::UnknownHost,
            Self::Timeout(_) => TransferResult::SocketTimeout,
            Self::Bind(e) => match e.kind() {
                ErrorKind::AddrInUse => TransferResult::PortAlreadyInUse,
                ErrorKind::PermissionDenied => TransferResult::SecurityError,
                _ => TransferResult::IoError,
            },
            Self::Connect(e) => match e.kind() {
                ErrorKind::ConnectionRefused => TransferResult::ServerNotStarted,
                ErrorKind::TimedOut => TransferResult::SocketTimeout,
                ErrorKind::PermissionDenied => TransferResult::SecurityError,
                _ => TransferResult::IoError,
            },
            Self::Accept(e) => match e.kind() {
                ErrorKind::TimedOut => TransferResult::SocketTimeout,
                ErrorKind::PermissionDenied => TransferResult::SecurityError,
                _ => TransferResult::IoError,
            },
            Self::Io(_) => TransferResult::IoError,
            Self::ServerAlreadyRunning => TransferResult::ServerAlreadyRunning,
            Self::ClientAlreadyRunning => TransferResult::ClientAlreadyRunning,
        }
    }
}

/// Errors produced while receiving a pushed file.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}
