use serde::{Deserialize, Serialize};

/// State of a streaming session as published by its worker.
///
/// `Streaming` is the only non-terminal state. A session reaches exactly one
/// of the terminal states and never leaves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Streaming {
        #[serde(rename = "bytesSent")]
        bytes_sent: u64,
    },
    Completed {
        #[serde(rename = "bytesSent")]
        bytes_sent: u64,
    },
    Aborted {
        #[serde(rename = "bytesSent")]
        bytes_sent: u64,
    },
    Failed {
        #[serde(rename = "bytesSent")]
        bytes_sent: u64,
        reason: String,
    },
}

impl SessionState {
    /// Returns `true` once the worker has finished, whatever the outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Streaming { .. })
    }

    /// Bytes written to the socket so far.
    pub fn bytes_sent(&self) -> u64 {
        match self {
            Self::Streaming { bytes_sent }
            | Self::Completed { bytes_sent }
            | Self::Aborted { bytes_sent }
            | Self::Failed { bytes_sent, .. } => *bytes_sent,
        }
    }

    /// Short lowercase label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Streaming { .. } => "streaming",
            Self::Completed { .. } => "completed",
            Self::Aborted { .. } => "aborted",
            Self::Failed { .. } => "failed",
        }
    }
}
