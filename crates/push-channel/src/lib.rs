//! Single-file push over raw TCP.
//!
//! Either side of a connection can be the sender: a [`PushServer`] accepts a
//! peer and pushes to it, a [`PushClient`] dials a peer and pushes to it.
//! `start()` performs setup synchronously and reports a
//! [`TransferResult`]; the file is then streamed by a background worker
//! that can be aborted between chunks and observed through
//! [`SessionState`].
//!
//! # Wire format
//!
//! None. The peer receives the file's bytes exactly, written in
//! [`CHUNK_SIZE`] pieces, and the end of the file is the connection close.

pub mod client;
pub mod config;
pub mod digest;
pub mod error;
pub mod receive;
pub mod server;
mod session;
mod streamer;

use std::path::PathBuf;

pub use client::PushClient;
pub use config::{TransferConfig, setup_timeout};
pub use digest::{DigestAlgorithm, digest_bytes, file_digest, file_digest_with, try_file_digest};
pub use error::{PushError, ReceiveError};
pub use filepush_protocol::{CHUNK_SIZE, SessionState, TransferResult};
pub use receive::{ReceiveSummary, Receiver};
pub use server::PushServer;

/// Starts a server on `port` with the default accept timeout.
///
/// The returned server must be kept alive to [`abort`](PushServer::abort)
/// or observe the transfer.
pub async fn start_server(port: i32, file_path: impl Into<PathBuf>) -> (PushServer, TransferResult) {
    launch_server(TransferConfig::server(port, file_path)).await
}

/// Like [`start_server`] with an explicit accept timeout (0 = unbounded).
pub async fn start_server_with_timeout(
    port: i32,
    timeout_millis: u64,
    file_path: impl Into<PathBuf>,
) -> (PushServer, TransferResult) {
    launch_server(TransferConfig::server(port, file_path).with_timeout_millis(timeout_millis)).await
}

/// Dials `remote_host:port` with the default connect timeout and pushes.
pub async fn start_client(
    remote_host: impl Into<String>,
    port: i32,
    file_path: impl Into<PathBuf>,
) -> (PushClient, TransferResult) {
    let client = PushClient::new(TransferConfig::client(remote_host, port, file_path));
    let result = client.start().await;
    tracing::info!(%result, "client start result");
    (client, result)
}

async fn launch_server(config: TransferConfig) -> (PushServer, TransferResult) {
    let server = PushServer::new(config);
    let result = server.start().await;
    tracing::info!(%result, "server start result");
    (server, result)
}
