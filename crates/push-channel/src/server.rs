//! Push server: accepts one peer per activation and streams the file to it.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use filepush_protocol::{SessionState, TransferResult};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::config::{TransferConfig, bounded};
use crate::error::PushError;
use crate::session::{Role, SessionSlot, TransferSession};

/// Pending-connection queue length of the listening socket.
const LISTEN_BACKLOG: u32 = 50;

/// Listens on a port and pushes the configured file to whoever connects.
///
/// The listening socket is created on first use and reused by every later
/// [`start`](Self::start); each call accepts exactly one new connection.
pub struct PushServer {
    config: TransferConfig,
    listener: Mutex<Option<TcpListener>>,
    local_addr: OnceLock<SocketAddr>,
    session: SessionSlot,
}

impl PushServer {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            listener: Mutex::new(None),
            local_addr: OnceLock::new(),
            session: SessionSlot::default(),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Validates, waits for one peer and spawns the streaming worker.
    ///
    /// Returns as soon as the worker is running; the outcome of the
    /// streaming itself is reported through [`wait`](Self::wait) and
    /// [`state`](Self::state). Concurrent calls are serialized.
    pub async fn start(&self) -> TransferResult {
        let mut listener = self.listener.lock().await;

        if self.session.is_running() {
            warn!("start rejected: a transfer is still in progress");
            return PushError::ServerAlreadyRunning.result();
        }

        match self.accept_peer(&mut listener).await {
            Ok((stream, peer)) => {
                let session =
                    TransferSession::spawn(stream, peer, self.config.file_path.clone(), Role::Server);
                let id = self.session.install(session);
                info!(session = %id, %peer, "server started streaming");
                TransferResult::Success
            }
            Err(e) => {
                let result = e.result();
                warn!(%result, "server start failed: {e}");
                result
            }
        }
    }

    /// Opens the listening socket if it is not open yet and returns its
    /// address. Useful to learn an OS-assigned port before calling `start`.
    ///
    /// Waits while another `start` is accepting.
    pub async fn bind(&self) -> Result<SocketAddr, PushError> {
        let mut listener = self.listener.lock().await;
        self.ensure_listener(&mut listener).await?;
        self.local_addr
            .get()
            .copied()
            .ok_or_else(|| PushError::Io(std::io::Error::other("listener has no local address")))
    }

    /// The port actually bound, once the listener exists.
    pub fn bound_port(&self) -> Option<u16> {
        self.local_addr.get().map(SocketAddr::port)
    }

    /// Cancels the running transfer at its next chunk boundary.
    ///
    /// Returns `false` when nothing is streaming.
    pub fn abort(&self) -> bool {
        self.session.abort()
    }

    /// `true` while a worker is streaming.
    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// State of the most recent session, if any was started.
    pub fn state(&self) -> Option<SessionState> {
        self.session.state()
    }

    /// Progress receiver for the most recent session.
    pub fn subscribe(&self) -> Option<watch::Receiver<SessionState>> {
        self.session.subscribe()
    }

    /// Peer of the most recent session.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.session.peer_addr()
    }

    /// Waits for the most recent session to finish.
    pub async fn wait(&self) -> Option<SessionState> {
        self.session.wait().await
    }

    async fn accept_peer(
        &self,
        slot: &mut Option<TcpListener>,
    ) -> Result<(TcpStream, SocketAddr), PushError> {
        self.config.validate_file().await?;
        let listener = self.ensure_listener(slot).await?;

        info!(port = listener.local_addr()?.port(), "waiting for peer connection");
        let (stream, peer) = bounded(
            self.config.timeout(),
            async { listener.accept().await.map_err(PushError::Accept) },
            PushError::Timeout,
        )
        .await?;

        info!(%peer, "peer connected");
        Ok((stream, peer))
    }

    async fn ensure_listener<'a>(
        &self,
        slot: &'a mut Option<TcpListener>,
    ) -> Result<&'a TcpListener, PushError> {
        if slot.is_none() {
            *slot = Some(self.open_listener().await?);
        }
        slot.as_ref()
            .ok_or_else(|| PushError::Io(std::io::Error::other("listener missing after bind")))
    }

    async fn open_listener(&self) -> Result<TcpListener, PushError> {
        let port = self.config.listen_port()?;
        let addr = self.bind_addr(port).await?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(PushError::Bind)?;
        socket.set_reuseaddr(true).map_err(PushError::Bind)?;
        socket.bind(addr).map_err(PushError::Bind)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(PushError::Bind)?;

        let local = listener.local_addr()?;
        if port == 0 {
            info!(port = local.port(), "automatically allocated port");
        }
        let _ = self.local_addr.set(local);
        info!(%local, "listener bound");
        Ok(listener)
    }

    async fn bind_addr(&self, port: u16) -> Result<SocketAddr, PushError> {
        let host = self.config.remote_host.as_str();
        if host.is_empty() {
            return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
        }
        let unknown = |source| PushError::UnknownHost {
            host: host.to_string(),
            source,
        };
        tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| unknown(Some(e)))?
            .next()
            .ok_or_else(|| unknown(None))
    }
}
