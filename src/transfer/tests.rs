//! Transfer Plane Tests
//!
//! Real TCP on ephemeral loopback ports.
//!
//! ## Test Scopes
//! - **Round trips**: byte-identical downloads at chunk-boundary sizes.
//! - **Failures**: missing files, truncated and malformed streams, no partial leftovers.
//! - **Uploads and checks**: receiver-side storage, indexing and existence queries.
//! - **Orchestration**: search-then-download across an in-process overlay.

#[cfg(test)]
mod tests {
    use crate::directory::service::PeerDirectory;
    use crate::directory::types::{NodeId, PeerAddress};
    use crate::error::{OverlayError, OverlayResult};
    use crate::index::service::{FsFileIndex, LocalFileIndex};
    use crate::rpc::PeerRpc;
    use crate::rpc::mock::InMemoryRpc;
    use crate::search::engine::FloodSearchEngine;
    use crate::search::types::{FileHit, QueryRequest};
    use crate::transfer::codec::{read_message, write_message};
    use crate::transfer::discovery::TransferEndpoints;
    use crate::transfer::engine::{TransferEngine, stream_file};
    use crate::transfer::orchestrator::TransferOrchestrator;
    use crate::transfer::server::TransferServer;
    use crate::transfer::types::{
        CHUNK_SIZE, FailureCode, FileChunk, MAX_FRAME_BYTES, TransferMessage,
    };
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const IO_TIMEOUT: Duration = Duration::from_secs(5);

    struct Side {
        engine: Arc<TransferEngine>,
        index: Arc<dyn LocalFileIndex>,
        dir: TempDir,
    }

    impl Side {
        async fn new(address: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let index: Arc<dyn LocalFileIndex> = Arc::new(FsFileIndex::new(dir.path()));
            index.reindex().await.unwrap();
            let engine = TransferEngine::new(
                PeerAddress::new(address),
                index.clone(),
                dir.path().join("downloads"),
                IO_TIMEOUT,
            );
            Self { engine, index, dir }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        async fn share(&self, name: &str, contents: &[u8]) {
            std::fs::write(self.root().join(name), contents).unwrap();
            self.index.reindex().await.unwrap();
        }

        async fn serve(&self) -> (String, JoinHandle<()>) {
            let server = TransferServer::bind("127.0.0.1:0".parse().unwrap(), self.engine.clone())
                .await
                .unwrap();
            let addr = server.local_addr().unwrap();
            (addr.to_string(), tokio::spawn(server.run()))
        }
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// A one-shot server that answers any request with `frames`, then hangs up.
    async fn stub_server(frames: Vec<TransferMessage>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _request = read_message(&mut stream).await.unwrap();
            for frame in &frames {
                write_message(&mut stream, frame).await.unwrap();
            }
        });
        addr
    }

    fn chunk(sequence: u64, len: usize, total_size: u64, is_last: bool) -> TransferMessage {
        TransferMessage::Chunk(FileChunk {
            filename: "video.mp4".to_string(),
            sequence,
            data: vec![7u8; len],
            total_size,
            is_last,
        })
    }

    // ============================================================
    // ROUND TRIPS
    // ============================================================

    #[tokio::test]
    async fn test_download_is_byte_identical_across_chunk_boundaries() {
        let owner = Side::new("owner:1").await;
        let client = Side::new("client:1").await;
        let (endpoint, _server) = owner.serve().await;

        let sizes = [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, 2 * CHUNK_SIZE, 3 * CHUNK_SIZE + 17];
        for (i, size) in sizes.into_iter().enumerate() {
            let name = format!("file-{}.bin", i);
            let contents = patterned(size);
            owner.share(&name, &contents).await;

            let destination = client.engine.download_dir().join(&name);
            let result = client
                .engine
                .download(&endpoint, &name, &destination)
                .await
                .unwrap();

            assert!(result.success, "size {}: {}", size, result.message);
            assert_eq!(result.bytes_transferred, size as u64);
            assert_eq!(result.destination.as_deref(), Some(destination.as_path()));
            assert_eq!(std::fs::read(&destination).unwrap(), contents, "size {}", size);
        }

        let names = leftovers(client.engine.download_dir());
        assert!(names.iter().all(|n| !n.ends_with(".part")), "leftovers: {:?}", names);
    }

    #[tokio::test]
    async fn test_served_stream_has_exactly_one_last_chunk_and_exact_byte_sum() {
        let owner = Side::new("owner:1").await;
        let (endpoint, _server) = owner.serve().await;

        for (size, expected_chunks) in [(0, 1), (CHUNK_SIZE, 1), (2 * CHUNK_SIZE, 2)] {
            let name = format!("raw-{}.bin", size);
            owner.share(&name, &patterned(size)).await;

            let mut stream = TcpStream::connect(&endpoint).await.unwrap();
            let request = TransferMessage::DownloadRequest {
                filename: name.clone(),
                requesting_node: None,
            };
            write_message(&mut stream, &request).await.unwrap();

            let mut chunks = 0u64;
            let mut lasts = 0;
            let mut sum = 0u64;
            while let Some(frame) = read_message(&mut stream).await.unwrap() {
                match frame {
                    TransferMessage::Chunk(chunk) => {
                        assert_eq!(chunk.sequence, chunks, "size {}", size);
                        assert_eq!(chunk.total_size, size as u64);
                        chunks += 1;
                        sum += chunk.data.len() as u64;
                        if chunk.is_last {
                            lasts += 1;
                        }
                    }
                    other => panic!("size {}: unexpected frame {:?}", size, other),
                }
            }

            assert_eq!(chunks, expected_chunks, "size {}", size);
            assert_eq!(lasts, 1, "size {}", size);
            assert_eq!(sum, size as u64, "size {}", size);
        }
    }

    #[tokio::test]
    async fn test_download_indexes_the_new_file() {
        let owner = Side::new("owner:1").await;
        let client = Side::new("client:1").await;
        let (endpoint, _server) = owner.serve().await;
        owner.share("song.ogg", b"la la la").await;

        let destination = client.engine.download_dir().join("song.ogg");
        client
            .engine
            .download(&endpoint, "song.ogg", &destination)
            .await
            .unwrap();

        let hits = client.index.lookup("song.ogg").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].size, 8);
    }

    // ============================================================
    // FAILURES
    // ============================================================

    #[tokio::test]
    async fn test_download_of_missing_file_fails_cleanly() {
        let owner = Side::new("owner:1").await;
        let client = Side::new("client:1").await;
        let (endpoint, _server) = owner.serve().await;

        let destination = client.engine.download_dir().join("ghost.bin");
        let result = client
            .engine
            .download(&endpoint, "ghost.bin", &destination)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.message.contains("not found"), "{}", result.message);
        assert!(result.destination.is_none());
        assert!(leftovers(client.engine.download_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_stream_cut_mid_transfer_leaves_nothing_behind() {
        let total = 3 * CHUNK_SIZE as u64;
        let addr = stub_server(vec![chunk(0, CHUNK_SIZE, total, false)]).await;
        let client = Side::new("client:1").await;

        let destination = client.engine.download_dir().join("video.mp4");
        let result = client
            .engine
            .download(&addr.to_string(), "video.mp4", &destination)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.bytes_transferred, CHUNK_SIZE as u64);
        assert!(!destination.exists());
        assert!(leftovers(client.engine.download_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_chunk_is_rejected() {
        let total = 2 * CHUNK_SIZE as u64;
        let addr = stub_server(vec![
            chunk(0, CHUNK_SIZE, total, false),
            chunk(2, CHUNK_SIZE, total, true),
        ])
        .await;
        let client = Side::new("client:1").await;

        let destination = client.engine.download_dir().join("video.mp4");
        let result = client
            .engine
            .download(&addr.to_string(), "video.mp4", &destination)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_last_chunk_short_of_declared_size_is_rejected() {
        let addr = stub_server(vec![chunk(0, 10, 20, true)]).await;
        let client = Side::new("client:1").await;

        let destination = client.engine.download_dir().join("video.mp4");
        let result = client
            .engine
            .download(&addr.to_string(), "video.mp4", &destination)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(!destination.exists());
        assert!(leftovers(client.engine.download_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_file_shorter_than_announced_ends_with_internal_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shrinking.bin");
        std::fs::write(&path, patterned(CHUNK_SIZE + 10)).unwrap();
        let mut file = tokio::fs::File::open(&path).await.unwrap();
        let (mut server_end, mut client_end) = tokio::io::duplex(4 * MAX_FRAME_BYTES);

        let result = stream_file(&mut server_end, &mut file, "shrinking.bin", 2 * CHUNK_SIZE as u64).await;
        assert!(matches!(result, Err(OverlayError::Transfer(_))));
        drop(server_end);

        match read_message(&mut client_end).await.unwrap() {
            Some(TransferMessage::Chunk(chunk)) => {
                assert_eq!(chunk.sequence, 0);
                assert!(!chunk.is_last);
            }
            other => panic!("expected first chunk, got {:?}", other),
        }
        match read_message(&mut client_end).await.unwrap() {
            Some(TransferMessage::Failure { code, .. }) => assert_eq!(code, FailureCode::Internal),
            other => panic!("expected failure frame, got {:?}", other),
        }
        assert!(read_message(&mut client_end).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_failed_result() {
        let client = Side::new("client:1").await;
        let destination = client.engine.download_dir().join("x.bin");

        let result = client
            .engine
            .download("127.0.0.1:9", "x.bin", &destination)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.bytes_transferred, 0);
    }

    #[tokio::test]
    async fn test_missing_arguments_are_validation_errors() {
        let client = Side::new("client:1").await;
        let destination = client.root().join("x");

        assert!(matches!(
            client.engine.download("", "x", &destination).await,
            Err(OverlayError::Validation(_))
        ));
        assert!(matches!(
            client.engine.download("127.0.0.1:9", " ", &destination).await,
            Err(OverlayError::Validation(_))
        ));
        assert!(matches!(
            client.engine.check_exists("127.0.0.1:9", "").await,
            Err(OverlayError::Validation(_))
        ));
    }

    // ============================================================
    // UPLOADS AND CHECKS
    // ============================================================

    #[tokio::test]
    async fn test_upload_lands_in_receiver_download_dir_and_is_indexed() {
        let receiver = Side::new("receiver:1").await;
        let sender = Side::new("sender:1").await;
        let (endpoint, _server) = receiver.serve().await;

        let contents = patterned(CHUNK_SIZE + 5);
        let source = sender.root().join("notes.txt");
        std::fs::write(&source, &contents).unwrap();

        let result = sender.engine.upload(&endpoint, &source).await.unwrap();

        assert!(result.success, "{}", result.message);
        assert_eq!(result.bytes_transferred, contents.len() as u64);
        let stored = receiver.engine.download_dir().join("notes.txt");
        assert_eq!(std::fs::read(&stored).unwrap(), contents);
        assert_eq!(receiver.index.lookup("notes.txt").await.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_of_missing_local_file_fails() {
        let receiver = Side::new("receiver:1").await;
        let sender = Side::new("sender:1").await;
        let (endpoint, _server) = receiver.serve().await;

        let result = sender
            .engine
            .upload(&endpoint, &sender.root().join("nope.txt"))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(leftovers(receiver.engine.download_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_check_exists_reports_size_only_for_present_files() {
        let owner = Side::new("owner:1").await;
        let client = Side::new("client:1").await;
        let (endpoint, _server) = owner.serve().await;
        owner.share("present.bin", &[1, 2, 3, 4]).await;

        let present = client.engine.check_exists(&endpoint, "present.bin").await.unwrap();
        assert!(present.exists);
        assert_eq!(present.size, Some(4));
        assert!(present.path.is_some());
        assert_eq!(present.node_address.as_deref(), Some("owner:1"));

        let missing = client.engine.check_exists(&endpoint, "missing.bin").await.unwrap();
        assert!(!missing.exists);
        assert_eq!(missing.filename, "missing.bin");
        assert!(missing.size.is_none());
        assert!(missing.path.is_none());
    }

    // ============================================================
    // DISCOVERY
    // ============================================================

    #[test]
    fn test_endpoint_defaults_to_port_offset() {
        let endpoints = TransferEndpoints::new();

        assert_eq!(
            endpoints.resolve(&PeerAddress::new("10.0.0.5:50001")).unwrap(),
            "10.0.0.5:51001"
        );
        assert!(matches!(
            endpoints.resolve(&PeerAddress::new("10.0.0.5:65000")),
            Err(OverlayError::Validation(_))
        ));
        assert!(matches!(
            endpoints.resolve(&PeerAddress::new("no-port")),
            Err(OverlayError::Validation(_))
        ));
    }

    #[test]
    fn test_registered_endpoint_overrides_offset() {
        let endpoints = TransferEndpoints::new();
        endpoints.register(PeerAddress::new("node-b:7000"), "node-b:9999");

        assert_eq!(
            endpoints.resolve(&PeerAddress::new("node-b:7000")).unwrap(),
            "node-b:9999"
        );
    }

    // ============================================================
    // ORCHESTRATION
    // ============================================================

    struct FetchSetup {
        orchestrator: Arc<TransferOrchestrator>,
        requester_index: Arc<dyn LocalFileIndex>,
        requester_dir: TempDir,
        _owner_dir: TempDir,
        _server: JoinHandle<()>,
    }

    /// A and B linked in memory; B shares `owner_files` and serves them over TCP.
    async fn fetch_setup(owner_files: &[(&str, &[u8])], requester_files: &[&str]) -> FetchSetup {
        let network = InMemoryRpc::new();
        let requester_dir = TempDir::new().unwrap();
        let owner_dir = TempDir::new().unwrap();
        for (name, contents) in owner_files {
            std::fs::write(owner_dir.path().join(name), contents).unwrap();
        }
        for name in requester_files {
            std::fs::write(requester_dir.path().join(name), b"local").unwrap();
        }

        let a = network.add_node("A:1", requester_dir.path()).await;
        let b = network.add_node("B:1", owner_dir.path()).await;
        a.directory.login(b.address.clone()).await.unwrap();
        b.directory.login(a.address.clone()).await.unwrap();

        let owner_engine = TransferEngine::new(
            b.address.clone(),
            b.index.clone(),
            owner_dir.path().join("downloads"),
            IO_TIMEOUT,
        );
        let server = TransferServer::bind("127.0.0.1:0".parse().unwrap(), owner_engine)
            .await
            .unwrap();
        let endpoints = Arc::new(TransferEndpoints::new());
        endpoints.register(b.address.clone(), server.local_addr().unwrap().to_string());
        let server = tokio::spawn(server.run());

        let requester_engine = TransferEngine::new(
            a.address.clone(),
            a.index.clone(),
            requester_dir.path().join("downloads"),
            IO_TIMEOUT,
        );
        let rpc: Arc<dyn PeerRpc> = network.clone();
        let orchestrator = TransferOrchestrator::new(
            a.directory.clone(),
            a.engine.clone(),
            rpc,
            endpoints,
            requester_engine,
            a.index.clone(),
        );

        FetchSetup {
            orchestrator,
            requester_index: a.index.clone(),
            requester_dir,
            _owner_dir: owner_dir,
            _server: server,
        }
    }

    #[tokio::test]
    async fn test_fetch_by_name_downloads_from_remote_owner() {
        let contents = patterned(2 * CHUNK_SIZE + 3);
        let setup = fetch_setup(&[("dataset.csv", contents.as_slice())], &[]).await;

        let outcome = setup.orchestrator.fetch_by_name("dataset.csv", 3).await.unwrap();

        assert!(outcome.success, "{:?}", outcome);
        assert!(outcome.found);
        assert_eq!(outcome.owner, Some(PeerAddress::new("B:1")));
        assert!(outcome.owner_id.is_some());
        let transfer = outcome.transfer.unwrap();
        assert!(transfer.success);
        assert_eq!(transfer.bytes_transferred, contents.len() as u64);

        let landed = setup.requester_dir.path().join("downloads").join("dataset.csv");
        assert_eq!(std::fs::read(landed).unwrap(), contents);
        assert_eq!(outcome.local_reindex_total, Some(1));
        assert_eq!(setup.requester_index.lookup("dataset.csv").await.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_by_name_reports_not_found() {
        let setup = fetch_setup(&[], &[]).await;

        let outcome = setup.orchestrator.fetch_by_name("nowhere.bin", 3).await.unwrap();

        assert!(!outcome.found);
        assert!(outcome.transfer.is_none());
    }

    #[tokio::test]
    async fn test_fetch_by_name_skips_download_when_only_local() {
        let setup = fetch_setup(&[], &["mine.txt"]).await;

        let outcome = setup.orchestrator.fetch_by_name("mine.txt", 3).await.unwrap();

        assert!(outcome.found);
        assert_eq!(outcome.owner, Some(PeerAddress::new("A:1")));
        assert!(outcome.transfer.is_none());
        assert_eq!(outcome.local_reindex_total, Some(1));
    }

    #[tokio::test]
    async fn test_fetch_by_name_rejects_empty_filename() {
        let setup = fetch_setup(&[], &[]).await;

        assert!(matches!(
            setup.orchestrator.fetch_by_name("", 3).await,
            Err(OverlayError::Validation(_))
        ));
    }

    /// Answers every search with a hit whose name tries to climb out of the
    /// download directory.
    struct HostileRpc {
        owner: PeerAddress,
    }

    impl HostileRpc {
        fn hits(&self) -> Vec<FileHit> {
            vec![FileHit {
                filename: "../escaped.bin".to_string(),
                path: "/srv/escaped.bin".to_string(),
                size: 4,
                owner: self.owner.clone(),
                owner_id: NodeId::new(),
            }]
        }
    }

    #[async_trait]
    impl PeerRpc for HostileRpc {
        async fn login(
            &self,
            _target: &PeerAddress,
            _me: &PeerAddress,
        ) -> OverlayResult<Vec<PeerAddress>> {
            Ok(Vec::new())
        }

        async fn query(
            &self,
            _target: &PeerAddress,
            _request: &QueryRequest,
        ) -> OverlayResult<Vec<FileHit>> {
            Ok(self.hits())
        }

        async fn start_search(
            &self,
            _target: &PeerAddress,
            _filename: &str,
            _ttl: u32,
        ) -> OverlayResult<Vec<FileHit>> {
            Ok(self.hits())
        }
    }

    #[tokio::test]
    async fn test_fetch_by_name_ignores_hits_naming_another_file() {
        let owner = PeerAddress::new("hostile:1");
        let rpc: Arc<dyn PeerRpc> = Arc::new(HostileRpc {
            owner: owner.clone(),
        });
        let root = TempDir::new().unwrap();
        let index: Arc<dyn LocalFileIndex> = Arc::new(FsFileIndex::new(root.path()));
        let directory = PeerDirectory::new(rpc.clone());
        directory.set_self(PeerAddress::new("A:1")).await.unwrap();
        directory.login(owner.clone()).await.unwrap();
        let search = FloodSearchEngine::new(NodeId::new(), directory.clone(), index.clone(), rpc.clone());

        // The hostile owner would happily serve a complete file.
        let stub = stub_server(vec![TransferMessage::Chunk(FileChunk {
            filename: "../escaped.bin".to_string(),
            sequence: 0,
            data: b"evil".to_vec(),
            total_size: 4,
            is_last: true,
        })])
        .await;
        let endpoints = Arc::new(TransferEndpoints::new());
        endpoints.register(owner, stub.to_string());

        let downloads = root.path().join("downloads");
        let engine = TransferEngine::new(PeerAddress::new("A:1"), index.clone(), &downloads, IO_TIMEOUT);
        let orchestrator =
            TransferOrchestrator::new(directory, search, rpc, endpoints, engine, index);

        let outcome = orchestrator.fetch_by_name("report.pdf", 3).await.unwrap();

        assert!(!outcome.found);
        assert!(outcome.transfer.is_none());
        assert!(!root.path().join("escaped.bin").exists());
        assert!(leftovers(&downloads).is_empty());

        assert!(matches!(
            orchestrator.fetch_by_name("../escaped.bin", 3).await,
            Err(OverlayError::Validation(_))
        ));
        assert!(!root.path().join("escaped.bin").exists());
    }
}
