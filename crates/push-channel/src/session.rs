//! Live state of one activation: the worker task and its controls.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use filepush_protocol::SessionState;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::streamer::ChunkStreamer;

/// Which side established the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Client => f.write_str("client"),
        }
    }
}

/// A connected socket plus the worker streaming the file over it.
///
/// The socket is owned by the worker; the session only keeps the
/// cancellation token and a view of the worker's state.
pub(crate) struct TransferSession {
    id: Uuid,
    peer: SocketAddr,
    cancel: CancellationToken,
    state_rx: watch::Receiver<SessionState>,
    worker: JoinHandle<()>,
}

impl TransferSession {
    /// Spawns the streaming worker over an established connection.
    pub(crate) fn spawn(stream: TcpStream, peer: SocketAddr, file_path: PathBuf, role: Role) -> Self {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Streaming { bytes_sent: 0 });

        let streamer = ChunkStreamer::new(id, stream, file_path, cancel.clone(), state_tx);
        tracing::debug!(session = %id, %role, %peer, "spawning streaming worker");
        let worker = tokio::spawn(streamer.run());

        Self {
            id,
            peer,
            cancel,
            state_rx,
            worker,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// `true` while the worker has not reached a terminal state.
    pub(crate) fn is_running(&self) -> bool {
        !self.state_rx.borrow().is_terminal() && !self.worker.is_finished()
    }

    /// Requests cancellation at the next chunk boundary.
    ///
    /// Returns `false` if the worker already finished.
    pub(crate) fn abort(&self) -> bool {
        if self.is_running() {
            self.cancel.cancel();
            tracing::info!(session = %self.id, "aborting");
            return true;
        }
        tracing::info!(session = %self.id, "too late to abort, sending already finished");
        false
    }

    /// Snapshot of the worker's current state.
    pub(crate) fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that observes every state the worker publishes.
    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }
}

/// Waits for a terminal state. If the worker goes away without publishing
/// one (it panicked), the last observed state is returned.
async fn wait_terminal(mut rx: watch::Receiver<SessionState>) -> SessionState {
    if let Ok(state) = rx.wait_for(SessionState::is_terminal).await {
        return state.clone();
    }
    rx.borrow().clone()
}

/// Holds the most recent session of a `PushServer` or `PushClient`.
#[derive(Default)]
pub(crate) struct SessionSlot(Mutex<Option<TransferSession>>);

impl SessionSlot {
    fn lock(&self) -> MutexGuard<'_, Option<TransferSession>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(TransferSession::is_running)
    }

    /// Installs a new session, returning its id.
    pub(crate) fn install(&self, session: TransferSession) -> Uuid {
        let id = session.id();
        *self.lock() = Some(session);
        id
    }

    pub(crate) fn abort(&self) -> bool {
        self.lock().as_ref().is_some_and(TransferSession::abort)
    }

    pub(crate) fn state(&self) -> Option<SessionState> {
        self.lock().as_ref().map(TransferSession::state)
    }

    pub(crate) fn subscribe(&self) -> Option<watch::Receiver<SessionState>> {
        self.lock().as_ref().map(TransferSession::subscribe)
    }

    pub(crate) fn peer_addr(&self) -> Option<SocketAddr> {
        self.lock().as_ref().map(TransferSession::peer_addr)
    }

    pub(crate) async fn wait(&self) -> Option<SessionState> {
        let rx = self.subscribe()?;
        Some(wait_terminal(rx).await)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    async fn connected_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (dialed, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (accepted, peer) = accepted.unwrap();
        (accepted, dialed.unwrap(), peer)
    }

    #[tokio::test]
    async fn empty_slot_has_nothing_to_report() {
        let slot = SessionSlot::default();
        assert!(!slot.is_running());
        assert!(!slot.abort());
        assert_eq!(slot.state(), None);
        assert!(slot.subscribe().is_none());
        assert_eq!(slot.peer_addr(), None);
        assert_eq!(slot.wait().await, None);
    }

    #[tokio::test]
    async fn installed_session_is_observed_through_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.bin");
        std::fs::write(&file, vec![5u8; 10_000]).unwrap();

        let (sending, mut receiving, peer) = connected_pair().await;
        let slot = SessionSlot::default();
        let session = TransferSession::spawn(sending, peer, file, Role::Server);
        let expected_id = session.id();
        assert_eq!(slot.install(session), expected_id);
        assert_eq!(slot.peer_addr(), Some(peer));

        let mut progress = slot.subscribe().unwrap();
        let mut received = Vec::new();
        receiving.read_to_end(&mut received).await.unwrap();
        assert_eq!(received.len(), 10_000);

        let state = slot.wait().await.unwrap();
        assert_eq!(state, SessionState::Completed { bytes_sent: 10_000 });
        assert!(progress.borrow_and_update().is_terminal());
        assert_eq!(slot.state(), Some(state));
        assert!(!slot.is_running());
        assert!(!slot.abort());
    }

    #[test]
    fn role_labels() {
        assert_eq!(Role::Server.to_string(), "server");
        assert_eq!(Role::Client.to_string(), "client");
    }
}
