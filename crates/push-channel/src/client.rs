//! Push client: dials the peer and streams the file to it.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use filepush_protocol::{SessionState, TransferResult};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::{TransferConfig, bounded};
use crate::error::PushError;
use crate::session::{Role, SessionSlot, TransferSession};

/// Connects to `remote_host:port` and pushes the configured file.
pub struct PushClient {
    config: TransferConfig,
    /// Serializes concurrent `start` calls.
    starting: Mutex<()>,
    session: SessionSlot,
}

impl PushClient {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            starting: Mutex::new(()),
            session: SessionSlot::default(),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Validates, connects and spawns the streaming worker.
    ///
    /// Like the server, a client runs one session at a time: calling this
    /// while a previous transfer is streaming returns
    /// [`TransferResult::ClientAlreadyRunning`].
    pub async fn start(&self) -> TransferResult {
        let _guard = self.starting.lock().await;

        if self.session.is_running() {
            warn!("start rejected: a transfer is still in progress");
            return PushError::ClientAlreadyRunning.result();
        }

        match self.connect().await {
            Ok((stream, peer)) => {
                let session =
                    TransferSession::spawn(stream, peer, self.config.file_path.clone(), Role::Client);
                let id = self.session.install(session);
                info!(session = %id, %peer, "client started streaming");
                TransferResult::Success
            }
            Err(e) => {
                let result = e.result();
                warn!(%result, "client start failed: {e}");
                result
            }
        }
    }

    /// Cancels the running transfer at its next chunk boundary.
    pub fn abort(&self) -> bool {
        self.session.abort()
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.state()
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<SessionState>> {
        self.session.subscribe()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.session.peer_addr()
    }

    pub async fn wait(&self) -> Option<SessionState> {
        self.session.wait().await
    }

    async fn connect(&self) -> Result<(TcpStream, SocketAddr), PushError> {
        self.config.validate_file().await?;
        let port = self.config.dial_port()?;
        let host = self.config.remote_host.as_str();

        info!(host, port, "connecting to server");
        let stream = connect_within(self.config.timeout(), resolve(host, port)).await?;
        let peer = stream.peer_addr()?;

        info!(%peer, "connected to server");
        Ok((stream, peer))
    }
}

/// Resolves and dials under one deadline, so a slow name lookup counts
/// against the connect timeout too.
async fn connect_within<R>(limit: Option<Duration>, resolving: R) -> Result<TcpStream, PushError>
where
    R: Future<Output = Result<Vec<SocketAddr>, PushError>>,
{
    bounded(
        limit,
        async {
            let addrs = resolving.await?;
            dial(&addrs).await
        },
        PushError::Timeout,
    )
    .await
}

async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, PushError> {
    let unknown = |source| PushError::UnknownHost {
        host: host.to_string(),
        source,
    };
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| unknown(Some(e)))?
        .collect();
    if addrs.is_empty() {
        return Err(unknown(None));
    }
    Ok(addrs)
}

/// Tries each address in order and keeps the last error.
async fn dial(addrs: &[SocketAddr]) -> Result<TcpStream, PushError> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(*addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, "connect attempt failed: {e}");
                last_err = Some(e);
            }
        }
    }
    Err(PushError::Connect(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address to dial")
    })))
}
