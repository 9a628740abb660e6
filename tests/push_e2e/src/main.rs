fn main() {
    println!("Run `cargo test -p push-e2e` to execute the end-to-end push tests.");
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};

    use filepush_channel::{
        CHUNK_SIZE, DigestAlgorithm, PushClient, PushServer, Receiver, SessionState,
        TransferConfig, TransferResult, file_digest, file_digest_with,
    };
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;

    /// Writes a deterministic, non-repeating-per-chunk payload of `len` bytes.
    fn write_payload(dir: &Path, name: &str, len: usize) -> (PathBuf, Vec<u8>) {
        let payload: Vec<u8> = (0..len).map(|i| (i * 31 % 253) as u8).collect();
        let path = dir.join(name);
        std::fs::write(&path, &payload).unwrap();
        (path, payload)
    }

    fn loopback_server(path: &Path) -> PushServer {
        PushServer::new(
            TransferConfig::server(0, path)
                .with_host("127.0.0.1")
                .with_timeout_millis(5_000),
        )
    }

    async fn bound_addr(server: &PushServer) -> SocketAddr {
        server.bind().await.expect("loopback bind")
    }

    #[tokio::test]
    async fn server_push_round_trip_matches_digest() {
        let dir = tempfile::tempdir().unwrap();
        let (file, payload) = write_payload(dir.path(), "payload.bin", 3 * CHUNK_SIZE + 100);
        let dest = dir.path().join("received.bin");

        let server = loopback_server(&file);
        let addr = bound_addr(&server).await;
        let receiver = Receiver::new(dest.clone(), CancellationToken::new());

        let (result, summary) = tokio::join!(server.start(), receiver.fetch(addr));
        assert_eq!(result, TransferResult::Success);
        let summary = summary.unwrap();

        let state = server.wait().await.unwrap();
        assert_eq!(
            state,
            SessionState::Completed {
                bytes_sent: payload.len() as u64
            }
        );
        assert_eq!(summary.bytes_received, payload.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
        assert_eq!(summary.digest, file_digest(&file));
        assert_eq!(file_digest(&dest), file_digest(&file));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn client_push_round_trip_with_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let (file, payload) = write_payload(dir.path(), "payload.bin", 100_000);
        let dest = dir.path().join("sub/dir/received.bin");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let receiver = Receiver::new(dest.clone(), CancellationToken::new())
            .with_algorithm(DigestAlgorithm::Sha256);
        let receive = tokio::spawn(async move { receiver.accept_one(listener).await });

        let client = PushClient::new(TransferConfig::client("127.0.0.1", port as i32, &file));
        assert_eq!(client.start().await, TransferResult::Success);

        let summary = receive.await.unwrap().unwrap();
        let state = client.wait().await.unwrap();
        assert_eq!(state.bytes_sent(), payload.len() as u64);
        assert!(matches!(state, SessionState::Completed { .. }));
        assert_eq!(
            summary.digest,
            file_digest_with(&file, DigestAlgorithm::Sha256)
        );
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }

    #[tokio::test]
    async fn empty_file_completes_without_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (file, _) = write_payload(dir.path(), "empty.bin", 0);
        let dest = dir.path().join("empty.out");

        let server = loopback_server(&file);
        let addr = bound_addr(&server).await;
        let receiver = Receiver::new(dest.clone(), CancellationToken::new());

        let (result, summary) = tokio::join!(server.start(), receiver.fetch(addr));
        assert_eq!(result, TransferResult::Success);
        assert_eq!(summary.unwrap().bytes_received, 0);
        assert_eq!(
            server.wait().await,
            Some(SessionState::Completed { bytes_sent: 0 })
        );
        assert!(std::fs::read(&dest).unwrap().is_empty());
    }

    #[tokio::test]
    async fn abort_truncates_at_chunk_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let (file, payload) = write_payload(dir.path(), "large.bin", 32 * 1024 * 1024);

        let server = loopback_server(&file);
        let addr = bound_addr(&server).await;

        // Connect but do not read yet, so the worker stalls on a full buffer.
        let (result, peer) = tokio::join!(server.start(), TcpStream::connect(addr));
        assert_eq!(result, TransferResult::Success);
        let mut peer = peer.unwrap();

        assert!(server.abort());

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();

        let state = server.wait().await.unwrap();
        let SessionState::Aborted { bytes_sent } = state else {
            panic!("expected an aborted session, got {state:?}");
        };
        assert!(bytes_sent < payload.len() as u64);
        assert_eq!(bytes_sent % CHUNK_SIZE as u64, 0);
        assert_eq!(received.len() as u64, bytes_sent);
        assert!(received[..] == payload[..received.len()], "received bytes diverge from the file");

        assert!(!server.abort(), "abort after the session ended");
    }

    #[tokio::test]
    async fn client_rejects_second_start_while_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let (file, _) = write_payload(dir.path(), "large.bin", 32 * 1024 * 1024);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = PushClient::new(TransferConfig::client("127.0.0.1", port as i32, &file));
        let (result, accepted) = tokio::join!(client.start(), listener.accept());
        assert_eq!(result, TransferResult::Success);
        let (mut peer, _) = accepted.unwrap();

        assert_eq!(client.start().await, TransferResult::ClientAlreadyRunning);

        assert!(client.abort());
        tokio::io::copy(&mut peer, &mut tokio::io::sink()).await.unwrap();
        assert!(matches!(
            client.wait().await,
            Some(SessionState::Aborted { .. })
        ));
    }

    #[tokio::test]
    async fn server_listener_survives_for_a_second_push() {
        let dir = tempfile::tempdir().unwrap();
        let (file, payload) = write_payload(dir.path(), "payload.bin", 10_000);

        let server = loopback_server(&file);
        let addr = bound_addr(&server).await;

        for round in 0..2 {
            let dest = dir.path().join(format!("round-{round}.bin"));
            let receiver = Receiver::new(dest.clone(), CancellationToken::new());
            let (result, summary) = tokio::join!(server.start(), receiver.fetch(addr));
            assert_eq!(result, TransferResult::Success);
            summary.unwrap();
            server.wait().await.unwrap();
            assert_eq!(std::fs::read(&dest).unwrap(), payload);
        }
        assert_eq!(server.bound_port(), Some(addr.port()));
    }

    #[test]
    fn results_serialize_as_screaming_names() {
        let json = serde_json::to_string(&TransferResult::PortAlreadyInUse).unwrap();
        assert_eq!(json, "\"PORT_ALREADY_IN_USE\"");
        let back: TransferResult = serde_json::from_str("\"SOCKET_TIMEOUT\"").unwrap();
        assert_eq!(back, TransferResult::SocketTimeout);
    }

    #[tokio::test]
    async fn unused_port_is_reported_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let (file, _) = write_payload(dir.path(), "f.bin", 10);

        // Bind then drop to find a port nobody listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };

        let client = PushClient::new(
            TransferConfig::client("127.0.0.1", port as i32, &file).with_timeout_millis(500),
        );
        let started = std::time::Instant::now();
        let result = client.start().await;
        assert!(matches!(
            result,
            TransferResult::ServerNotStarted | TransferResult::SocketTimeout | TransferResult::IoError
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(3));
        assert!(client.state().is_none());
    }
}
