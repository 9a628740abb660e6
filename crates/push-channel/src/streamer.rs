//! Chunked streaming worker.
//!
//! Writes one file to a connected socket in [`CHUNK_SIZE`] writes, checking
//! the session's cancellation token before every chunk. The payload carries
//! no framing: the peer sees the raw file bytes followed by EOF.

use std::path::PathBuf;

use filepush_protocol::{CHUNK_SIZE, SessionState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How the chunk loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamEnd {
    Completed,
    Aborted,
}

/// Owns the socket for the lifetime of one session.
pub(crate) struct ChunkStreamer {
    session: Uuid,
    stream: TcpStream,
    file_path: PathBuf,
    cancel: CancellationToken,
    state_tx: watch::Sender<SessionState>,
}

impl ChunkStreamer {
    pub(crate) fn new(
        session: Uuid,
        stream: TcpStream,
        file_path: PathBuf,
        cancel: CancellationToken,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            session,
            stream,
            file_path,
            cancel,
            state_tx,
        }
    }

    /// Streams the file, tears the socket down and publishes the final state.
    pub(crate) async fn run(mut self) {
        info!(session = %self.session, path = %self.file_path.display(), "sending");

        let mut bytes_sent = 0u64;
        let outcome = self.send_file(&mut bytes_sent).await;
        let teardown = self.close().await;

        let state = match (outcome, teardown) {
            (Err(e), _) => SessionState::Failed {
                bytes_sent,
                reason: e.to_string(),
            },
            (Ok(StreamEnd::Aborted), Err(e)) => {
                debug!(session = %self.session, "teardown after abort failed: {e}");
                SessionState::Aborted { bytes_sent }
            }
            (Ok(StreamEnd::Aborted), Ok(())) => SessionState::Aborted { bytes_sent },
            (Ok(StreamEnd::Completed), Err(e)) => SessionState::Failed {
                bytes_sent,
                reason: format!("closing socket: {e}"),
            },
            (Ok(StreamEnd::Completed), Ok(())) => SessionState::Completed { bytes_sent },
        };

        match &state {
            SessionState::Failed { reason, .. } => {
                warn!(session = %self.session, bytes_sent, "sending failed: {reason}")
            }
            other => info!(session = %self.session, bytes_sent, "sending {}", other.label()),
        }
        self.state_tx.send_replace(state);
    }

    async fn send_file(&mut self, bytes_sent: &mut u64) -> std::io::Result<StreamEnd> {
        let mut file = tokio::fs::File::open(&self.file_path).await?;
        self.stream.flush().await?;

        let state_tx = &self.state_tx;
        write_chunks(
            &mut file,
            &mut self.stream,
            &self.cancel,
            bytes_sent,
            |sent| {
                state_tx.send_replace(SessionState::Streaming { bytes_sent: sent });
            },
        )
        .await
    }

    /// Flushes and shuts down the write half so queued bytes drain before the
    /// peer observes EOF. Dropping the stream afterwards closes both halves.
    async fn close(&mut self) -> std::io::Result<()> {
        self.stream.flush().await?;
        self.stream.shutdown().await
    }
}

/// Copies `reader` to `writer` one full chunk per write.
///
/// Every write is exactly [`CHUNK_SIZE`] bytes except the last one of the
/// input. Cancellation is only observed between chunks, so an abort
/// truncates the output at a chunk boundary.
pub(crate) async fn write_chunks<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
    bytes_sent: &mut u64,
    mut on_chunk: F,
) -> std::io::Result<StreamEnd>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(u64),
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Ok(StreamEnd::Aborted);
        }

        let n = fill_chunk(reader, &mut buf).await?;
        if n == 0 {
            return Ok(StreamEnd::Completed);
        }

        writer.write_all(&buf[..n]).await?;
        *bytes_sent += n as u64;
        on_chunk(*bytes_sent);

        if n < CHUNK_SIZE {
            return Ok(StreamEnd::Completed);
        }
    }
}

/// Reads until `buf` is full or the reader hits EOF.
async fn fill_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
