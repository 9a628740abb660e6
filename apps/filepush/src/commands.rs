//! Subcommand implementations.
//!
//! Each command returns `Ok(true)` when it succeeded, `Ok(false)` when the
//! transfer ran but did not succeed, and `Err` for local plumbing failures.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use filepush_channel::{
    DigestAlgorithm, PushClient, PushServer, ReceiveError, ReceiveSummary, Receiver,
    SessionState, TransferConfig, TransferResult, file_digest_with, setup_timeout,
    try_file_digest,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{DigestArgs, FetchArgs, ListenArgs, SendArgs, ServeArgs};
use crate::config::{self, Config};

/// Final report of a `serve` or `send` run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushReport {
    role: &'static str,
    file: PathBuf,
    digest: String,
    result: TransferResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    bound_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionState>,
}

impl PushReport {
    fn succeeded(&self) -> bool {
        self.result.is_success() && !matches!(self.session, Some(SessionState::Failed { .. }))
    }

    fn print(&self, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }
        println!("{} {}: {}", self.role, self.file.display(), self.result);
        if let Some(state) = &self.session {
            match state {
                SessionState::Failed { bytes_sent, reason } => {
                    println!("failed after {bytes_sent} bytes: {reason}")
                }
                other => println!("{} ({} bytes)", other.label(), other.bytes_sent()),
            }
        }
        Ok(())
    }
}

pub async fn serve(config: &Config, args: ServeArgs, json: bool) -> anyhow::Result<bool> {
    let digest = log_digest(&args.file, config.digest_algorithm).await;
    let host = args.bind.unwrap_or_else(|| config.bind_host.clone());
    let transfer = TransferConfig::server(args.port, &args.file)
        .with_host(host)
        .with_timeout_millis(args.timeout_ms.unwrap_or(config.server_timeout_ms));
    let server = PushServer::new(transfer);

    let mut report = PushReport {
        role: "server",
        file: args.file,
        digest,
        result: TransferResult::Success,
        bound_port: None,
        peer: None,
        session: None,
    };

    let Some(result) = interruptible(server.start()).await else {
        anyhow::bail!("interrupted while waiting for a peer");
    };
    report.result = result;
    report.bound_port = server.bound_port();

    if result.is_success() {
        report.peer = server.peer_addr();
        report.session = supervise(server.wait(), || server.abort()).await;
    }

    report.print(json)?;
    Ok(report.succeeded())
}

pub async fn send(config: &Config, args: SendArgs, json: bool) -> anyhow::Result<bool> {
    let digest = log_digest(&args.file, config.digest_algorithm).await;
    let transfer = TransferConfig::client(args.host, args.port, &args.file)
        .with_timeout_millis(args.timeout_ms.unwrap_or(config.client_timeout_ms));
    let client = PushClient::new(transfer);

    let mut report = PushReport {
        role: "client",
        file: args.file,
        digest,
        result: TransferResult::Success,
        bound_port: None,
        peer: None,
        session: None,
    };

    let Some(result) = interruptible(client.start()).await else {
        anyhow::bail!("interrupted while connecting");
    };
    report.result = result;

    if result.is_success() {
        report.peer = client.peer_addr();
        report.session = supervise(client.wait(), || client.abort()).await;
    }

    report.print(json)?;
    Ok(report.succeeded())
}

pub async fn fetch(config: &Config, args: FetchArgs, json: bool) -> anyhow::Result<bool> {
    let cancel = cancel_on_interrupt();
    let receiver = Receiver::new(args.dest.clone(), cancel.clone())
        .with_timeout(setup_timeout(args.timeout_ms.unwrap_or(config.client_timeout_ms)))
        .with_algorithm(config.digest_algorithm);

    let outcome = receiver.fetch((args.host.as_str(), args.port)).await;
    cancel.cancel();
    report_receive(&args.dest, outcome, json)
}

pub async fn listen(config: &Config, args: ListenArgs, json: bool) -> anyhow::Result<bool> {
    let host = args.bind.unwrap_or_else(|| config.bind_host.clone());
    let host = if host.is_empty() { "0.0.0.0".to_string() } else { host };
    let listener = TcpListener::bind((host.as_str(), args.port)).await?;
    let local = listener.local_addr()?;
    info!(%local, "waiting for a push client");

    let cancel = cancel_on_interrupt();
    let receiver = Receiver::new(args.dest.clone(), cancel.clone())
        .with_timeout(setup_timeout(args.timeout_ms.unwrap_or(config.server_timeout_ms)))
        .with_algorithm(config.digest_algorithm);

    let outcome = receiver.accept_one(listener).await;
    cancel.cancel();
    report_receive(&args.dest, outcome, json)
}

pub async fn digest(config: &Config, args: DigestArgs, json: bool) -> anyhow::Result<bool> {
    let algorithm = args.algorithm.unwrap_or(config.digest_algorithm);
    let path = args.file.clone();
    let digest = tokio::task::spawn_blocking(move || try_file_digest(&path, algorithm)).await??;

    if json {
        let value = serde_json::json!({
            "file": args.file,
            "algorithm": algorithm,
            "digest": digest,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{digest}  {}", args.file.display());
    }
    Ok(true)
}

pub fn show_config(config: &Config, path: Option<&Path>) -> anyhow::Result<bool> {
    let path = config::resolve(path)?;
    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(true)
}

pub fn init_config(path: Option<&Path>, force: bool) -> anyhow::Result<bool> {
    let path = config::resolve(path)?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let written = Config::default().save(Some(&path))?;
    println!("wrote {}", written.display());
    Ok(true)
}

/// Computes and logs the digest of the file about to be pushed.
async fn log_digest(path: &Path, algorithm: DigestAlgorithm) -> String {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || file_digest_with(&owned, algorithm))
        .await
        .unwrap_or_default();
    info!(file = %path.display(), %algorithm, %digest, "file digest");
    digest
}

/// Runs `fut` unless Ctrl-C arrives first.
async fn interruptible<F: Future>(fut: F) -> Option<F::Output> {
    tokio::select! {
        output = fut => Some(output),
        _ = tokio::signal::ctrl_c() => None,
    }
}

/// Waits for the session to end, aborting it on Ctrl-C.
async fn supervise<W, A>(wait: W, abort: A) -> Option<SessionState>
where
    W: Future<Output = Option<SessionState>>,
    A: Fn() -> bool,
{
    tokio::pin!(wait);
    loop {
        tokio::select! {
            state = &mut wait => return state,
            _ = tokio::signal::ctrl_c() => {
                let aborted = abort();
                info!(aborted, "interrupt received");
            }
        }
    }
}

/// Token cancelled by Ctrl-C. Cancel it yourself to release the watcher.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, cancelling receive");
                token.cancel();
            }
        }
    });
    cancel
}

fn report_receive(
    dest: &Path,
    outcome: Result<ReceiveSummary, ReceiveError>,
    json: bool,
) -> anyhow::Result<bool> {
    match outcome {
        Ok(summary) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "received {} bytes from {} into {}",
                    summary.bytes_received,
                    summary.peer,
                    dest.display()
                );
                println!("{}  {}", summary.digest, dest.display());
            }
            Ok(true)
        }
        Err(e) => {
            warn!("receive failed: {e}");
            if json {
                let value = serde_json::json!({ "error": e.to_string() });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("receive failed: {e}");
            }
            Ok(false)
        }
    }
}
