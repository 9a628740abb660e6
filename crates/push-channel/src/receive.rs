//! Receiving end of a push.
//!
//! Reads the raw byte stream until the sender closes the connection and
//! writes it to a destination file, hashing as it goes so the result can be
//! compared with the sender's logged digest.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::bounded;
use crate::digest::{DigestAlgorithm, DigestHasher};
use crate::error::ReceiveError;

/// Read buffer size (64 KiB).
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// What a completed receive produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveSummary {
    pub peer: SocketAddr,
    pub bytes_received: u64,
    pub digest: String,
    pub algorithm: DigestAlgorithm,
}

/// Receives one pushed file into `dest`.
pub struct Receiver {
    dest: PathBuf,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    algorithm: DigestAlgorithm,
}

impl Receiver {
    pub fn new(dest: PathBuf, cancel: CancellationToken) -> Self {
        Self {
            dest,
            cancel,
            timeout: None,
            algorithm: DigestAlgorithm::default(),
        }
    }

    /// Bounds the connect/accept step. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Dials a push server and receives what it sends.
    pub async fn fetch<A: ToSocketAddrs>(&self, addr: A) -> Result<ReceiveSummary, ReceiveError> {
        let stream = self.guarded(TcpStream::connect(addr)).await?;
        let peer = stream.peer_addr()?;
        info!(%peer, "connected to push server");
        self.receive(stream, peer).await
    }

    /// Accepts a single push client on `listener` and receives its file.
    pub async fn accept_one(&self, listener: TcpListener) -> Result<ReceiveSummary, ReceiveError> {
        let (stream, peer) = self.guarded(listener.accept()).await?;
        info!(%peer, "push client connected");
        // One connection per receive.
        drop(listener);
        self.receive(stream, peer).await
    }

    /// Applies the timeout and the cancel token to a connect/accept step.
    async fn guarded<T, F>(&self, fut: F) -> Result<T, ReceiveError>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        let limited = bounded(
            self.timeout,
            async { fut.await.map_err(ReceiveError::from) },
            |_| ReceiveError::Timeout,
        );
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReceiveError::Cancelled),
            result = limited => result,
        }
    }

    async fn receive(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<ReceiveSummary, ReceiveError> {
        if let Some(parent) = self.dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&self.dest).await?;

        let (bytes_received, digest) =
            copy_hashed(&mut stream, &mut file, self.algorithm, &self.cancel).await?;
        file.flush().await?;

        info!(%peer, bytes_received, %digest, "receive complete");
        Ok(ReceiveSummary {
            peer,
            bytes_received,
            digest,
            algorithm: self.algorithm,
        })
    }
}

/// Copies `reader` into `file` until EOF, returning the byte count and digest.
async fn copy_hashed<R: AsyncRead + Unpin>(
    reader: &mut R,
    file: &mut tokio::fs::File,
    algorithm: DigestAlgorithm,
    cancel: &CancellationToken,
) -> Result<(u64, String), ReceiveError> {
    let mut hasher = DigestHasher::new(algorithm);
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReceiveError::Cancelled),
            n = reader.read(&mut buf) => n?,
        };
        if n == 0 {
            debug!(total, "sender closed the connection");
            break;
        }
        file.write_all(&buf[..n]).await?;
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((total, hasher.finalize_hex()))
}
