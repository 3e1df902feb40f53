use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::codec::{read_message, write_message};
use super::types::{
    CHUNK_SIZE, FailureCode, FileChunk, FileInfo, TransferMessage, TransferResult,
};
use crate::directory::types::PeerAddress;
use crate::error::{OverlayError, OverlayResult, require_non_empty};
use crate::index::service::LocalFileIndex;
use crate::index::types::PARTIAL_SUFFIX;

/// Chunked file movement between nodes.
///
/// Client calls (`download`, `upload`, `check_exists`) open one TCP connection
/// each. The serving half (`serve_download`, `receive_upload`, `local_file_info`)
/// is driven by [`super::server::TransferServer`].
///
/// Received bytes always land in `<destination>.part` first and are renamed
/// into place only after the last chunk checks out, so a failed transfer never
/// leaves a file under the destination name.
pub struct TransferEngine {
    node_address: PeerAddress,
    index: Arc<dyn LocalFileIndex>,
    download_dir: PathBuf,
    io_timeout: Duration,
}

impl TransferEngine {
    pub fn new(
        node_address: PeerAddress,
        index: Arc<dyn LocalFileIndex>,
        download_dir: impl Into<PathBuf>,
        io_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            node_address,
            index,
            download_dir: download_dir.into(),
            io_timeout,
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    // ============================================================
    // CLIENT SIDE
    // ============================================================

    /// Pulls `filename` from the transfer endpoint `endpoint` into `destination`.
    ///
    /// Only missing arguments are errors; every network or disk failure comes
    /// back as an unsuccessful [`TransferResult`].
    pub async fn download(
        &self,
        endpoint: &str,
        filename: &str,
        destination: &Path,
    ) -> OverlayResult<TransferResult> {
        require_non_empty("endpoint", endpoint)?;
        require_non_empty("filename", filename)?;

        tracing::info!("Downloading {} from {} into {}", filename, endpoint, destination.display());

        let part = partial_path(destination);
        let mut received = 0u64;
        let attempt = self
            .fetch_into(endpoint, filename, destination, &part, &mut received)
            .await;

        match attempt {
            Ok(()) => {
                if let Err(e) = self.index.index_file(destination).await {
                    tracing::warn!("Downloaded {} but could not index it: {}", destination.display(), e);
                }
                tracing::info!("Download of {} complete ({} bytes)", filename, received);
                Ok(TransferResult::completed(
                    format!("downloaded {}", filename),
                    received,
                    destination.to_path_buf(),
                ))
            }
            Err(e) => {
                discard(&part).await;
                tracing::warn!("Download of {} from {} failed: {}", filename, endpoint, e);
                Ok(TransferResult::failed(e.to_string(), received))
            }
        }
    }

    async fn fetch_into(
        &self,
        endpoint: &str,
        filename: &str,
        destination: &Path,
        part: &Path,
        received: &mut u64,
    ) -> OverlayResult<()> {
        let mut stream = self.connect(endpoint).await?;
        let request = TransferMessage::DownloadRequest {
            filename: filename.to_string(),
            requesting_node: Some(self.node_address.to_string()),
        };
        write_message(&mut stream, &request).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(part).await?;
        receive_chunks(&mut stream, &mut file, filename, self.io_timeout, received).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(part, destination).await?;
        Ok(())
    }

    /// Pushes the local file at `path` to the transfer endpoint `endpoint`.
    /// The receiver stores it under its base name.
    pub async fn upload(&self, endpoint: &str, path: &Path) -> OverlayResult<TransferResult> {
        require_non_empty("endpoint", endpoint)?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| OverlayError::validation(format!("{} has no file name", path.display())))?
            .to_string();

        tracing::info!("Uploading {} to {}", path.display(), endpoint);

        match self.push(endpoint, path, &filename).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!("Upload of {} to {} failed: {}", path.display(), endpoint, e);
                Ok(TransferResult::failed(e.to_string(), 0))
            }
        }
    }

    async fn push(&self, endpoint: &str, path: &Path, filename: &str) -> OverlayResult<TransferResult> {
        let mut file = File::open(path).await?;
        let total_size = file.metadata().await?.len();

        let mut stream = self.connect(endpoint).await?;
        let request = TransferMessage::UploadRequest {
            filename: filename.to_string(),
            total_size,
            requesting_node: Some(self.node_address.to_string()),
        };
        write_message(&mut stream, &request).await?;
        send_chunks(&mut stream, &mut file, filename, total_size).await?;

        match self.next_message(&mut stream).await? {
            TransferMessage::UploadResult(result) => Ok(result),
            TransferMessage::Failure { message, .. } => Err(OverlayError::Transfer(message)),
            other => Err(unexpected(&other)),
        }
    }

    /// Asks the node behind `endpoint` whether it can serve `filename`.
    pub async fn check_exists(&self, endpoint: &str, filename: &str) -> OverlayResult<FileInfo> {
        require_non_empty("endpoint", endpoint)?;
        require_non_empty("filename", filename)?;

        let mut stream = self.connect(endpoint).await?;
        write_message(
            &mut stream,
            &TransferMessage::CheckRequest {
                filename: filename.to_string(),
            },
        )
        .await?;

        match self.next_message(&mut stream).await? {
            TransferMessage::FileInfo(info) => Ok(info),
            TransferMessage::Failure { message, .. } => Err(OverlayError::Transfer(message)),
            other => Err(unexpected(&other)),
        }
    }

    async fn connect(&self, endpoint: &str) -> OverlayResult<TcpStream> {
        match tokio::time::timeout(self.io_timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(OverlayError::unreachable(endpoint, e)),
            Err(_) => Err(OverlayError::unreachable(endpoint, "connect timed out")),
        }
    }

    async fn next_message<S>(&self, stream: &mut S) -> OverlayResult<TransferMessage>
    where
        S: AsyncRead + Unpin,
    {
        next_frame(stream, self.io_timeout).await
    }

    // ============================================================
    // SERVING SIDE
    // ============================================================

    /// Streams `filename` to the requester. A missing file is answered with a
    /// `NotFound` failure frame.
    pub async fn serve_download<S>(&self, stream: &mut S, filename: &str) -> OverlayResult<u64>
    where
        S: AsyncWrite + Unpin,
    {
        if filename.trim().is_empty() {
            return fail(stream, FailureCode::InvalidArgument, "filename is required").await;
        }
        let Some(record) = self.index.locate(filename).await else {
            return fail(stream, FailureCode::NotFound, &format!("{} not found", filename)).await;
        };

        let opened = async {
            let file = File::open(&record.path).await?;
            let size = file.metadata().await?.len();
            Ok::<_, std::io::Error>((file, size))
        }
        .await;
        let (mut file, total_size) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                return fail(stream, FailureCode::Internal, &format!("cannot open {}: {}", filename, e))
                    .await;
            }
        };

        let sent = stream_file(stream, &mut file, filename, total_size).await?;
        tracing::info!("Served {} ({} bytes)", record.path.display(), sent);
        Ok(sent)
    }

    /// Stores an incoming upload under its base name in the download directory,
    /// then reports the outcome to the sender.
    pub async fn receive_upload<S>(
        &self,
        stream: &mut S,
        filename: &str,
        declared_size: u64,
    ) -> OverlayResult<TransferResult>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(name) = sanitize_filename(filename) else {
            return fail(stream, FailureCode::InvalidArgument, "invalid upload filename").await;
        };
        let destination = self.download_dir.join(&name);
        let part = partial_path(&destination);

        let mut received = 0u64;
        let stored = async {
            tokio::fs::create_dir_all(&self.download_dir).await?;
            let mut file = File::create(&part).await?;
            receive_chunks(stream, &mut file, filename, self.io_timeout, &mut received).await?;
            file.flush().await?;
            drop(file);
            if received != declared_size {
                return Err(OverlayError::Transfer(format!(
                    "announced {} bytes but received {}",
                    declared_size, received
                )));
            }
            tokio::fs::rename(&part, &destination).await?;
            Ok::<(), OverlayError>(())
        }
        .await;

        let result = match stored {
            Ok(()) => {
                if let Err(e) = self.index.index_file(&destination).await {
                    tracing::warn!("Stored upload {} but could not index it: {}", destination.display(), e);
                }
                tracing::info!("Received upload {} ({} bytes)", destination.display(), received);
                TransferResult::completed(format!("stored {}", name), received, destination)
            }
            Err(e) => {
                discard(&part).await;
                tracing::warn!("Upload of {} failed: {}", filename, e);
                TransferResult::failed(e.to_string(), received)
            }
        };

        // The sender may already be gone after a failed stream.
        if let Err(e) = write_message(stream, &TransferMessage::UploadResult(result.clone())).await {
            tracing::debug!("Could not acknowledge upload of {}: {}", filename, e);
        }
        Ok(result)
    }

    /// What this node can say about `filename` without moving any bytes.
    pub async fn local_file_info(&self, filename: &str) -> FileInfo {
        let node_address = Some(self.node_address.to_string());
        match self.index.locate(filename).await {
            Some(record) => FileInfo {
                exists: true,
                filename: record.filename,
                size: Some(record.size),
                path: Some(record.path.display().to_string()),
                node_address,
            },
            None => FileInfo::missing(filename, node_address),
        }
    }
}

/// Sends `total_size` bytes of `file` as numbered chunks. The last chunk is
/// always flagged, so an empty file goes out as one empty chunk.
pub(crate) async fn send_chunks<S>(
    stream: &mut S,
    file: &mut File,
    filename: &str,
    total_size: u64,
) -> OverlayResult<u64>
where
    S: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    let mut sequence = 0u64;

    loop {
        let want = (total_size - sent).min(CHUNK_SIZE as u64) as usize;
        let got = read_up_to(file, &mut buffer[..want]).await?;
        if got < want {
            return Err(OverlayError::Transfer(format!(
                "{} shrank during transfer ({} of {} bytes read)",
                filename,
                sent + got as u64,
                total_size
            )));
        }

        sent += got as u64;
        let is_last = sent == total_size;
        let chunk = FileChunk {
            filename: filename.to_string(),
            sequence,
            data: buffer[..got].to_vec(),
            total_size,
            is_last,
        };
        write_message(stream, &TransferMessage::Chunk(chunk)).await?;
        sequence += 1;

        if is_last {
            return Ok(sent);
        }
    }
}

/// Serving-side wrapper around [`send_chunks`]: a file that runs out before
/// `total_size` is reported to the peer with an `Internal` failure frame
/// instead of a last chunk.
pub(crate) async fn stream_file<S>(
    stream: &mut S,
    file: &mut File,
    filename: &str,
    total_size: u64,
) -> OverlayResult<u64>
where
    S: AsyncWrite + Unpin,
{
    match send_chunks(stream, file, filename, total_size).await {
        Err(OverlayError::Transfer(message)) => fail(stream, FailureCode::Internal, &message).await,
        other => other,
    }
}

/// Writes incoming chunks to `file` until the last one, checking ordering and
/// the declared size along the way. `received` tracks progress even on error.
pub(crate) async fn receive_chunks<S>(
    stream: &mut S,
    file: &mut File,
    filename: &str,
    io_timeout: Duration,
    received: &mut u64,
) -> OverlayResult<()>
where
    S: AsyncRead + Unpin,
{
    let mut expected_sequence = 0u64;
    let mut declared: Option<u64> = None;

    loop {
        let chunk = match next_frame(stream, io_timeout).await? {
            TransferMessage::Chunk(chunk) => chunk,
            TransferMessage::Failure { code, message } => {
                return Err(match code {
                    FailureCode::NotFound => OverlayError::NotFound(message),
                    FailureCode::InvalidArgument => OverlayError::Validation(message),
                    FailureCode::Internal => OverlayError::Transfer(message),
                });
            }
            other => return Err(unexpected(&other)),
        };

        if chunk.sequence != expected_sequence {
            return Err(OverlayError::Protocol(format!(
                "chunk {} of {} arrived, expected {}",
                chunk.sequence, filename, expected_sequence
            )));
        }
        if chunk.data.len() > CHUNK_SIZE {
            return Err(OverlayError::Protocol(format!(
                "chunk of {} bytes exceeds chunk size",
                chunk.data.len()
            )));
        }
        let total = *declared.get_or_insert(chunk.total_size);
        if chunk.total_size != total {
            return Err(OverlayError::Protocol(format!(
                "total size changed mid-stream ({} -> {})",
                total, chunk.total_size
            )));
        }

        file.write_all(&chunk.data).await?;
        *received += chunk.data.len() as u64;
        expected_sequence += 1;

        if *received > total {
            return Err(OverlayError::Protocol(format!(
                "received {} bytes but {} were declared",
                received, total
            )));
        }
        if chunk.is_last {
            if *received != total {
                return Err(OverlayError::Transfer(format!(
                    "stream ended at {} of {} bytes",
                    received, total
                )));
            }
            return Ok(());
        }
    }
}

async fn next_frame<S>(stream: &mut S, io_timeout: Duration) -> OverlayResult<TransferMessage>
where
    S: AsyncRead + Unpin,
{
    match tokio::time::timeout(io_timeout, read_message(stream)).await {
        Ok(Ok(Some(message))) => Ok(message),
        Ok(Ok(None)) => Err(OverlayError::Transfer("connection closed mid-transfer".into())),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(OverlayError::Transfer("timed out waiting for peer".into())),
    }
}

/// Reports a failure to the peer and returns the matching local error.
async fn fail<S, T>(stream: &mut S, code: FailureCode, message: &str) -> OverlayResult<T>
where
    S: AsyncWrite + Unpin,
{
    let frame = TransferMessage::Failure {
        code,
        message: message.to_string(),
    };
    if let Err(e) = write_message(stream, &frame).await {
        tracing::debug!("Could not deliver failure frame: {}", e);
    }
    Err(match code {
        FailureCode::InvalidArgument => OverlayError::Validation(message.to_string()),
        FailureCode::NotFound => OverlayError::NotFound(message.to_string()),
        FailureCode::Internal => OverlayError::Transfer(message.to_string()),
    })
}

fn unexpected(message: &TransferMessage) -> OverlayError {
    OverlayError::Protocol(format!("unexpected frame: {:?}", variant_name(message)))
}

fn variant_name(message: &TransferMessage) -> &'static str {
    match message {
        TransferMessage::DownloadRequest { .. } => "DownloadRequest",
        TransferMessage::UploadRequest { .. } => "UploadRequest",
        TransferMessage::CheckRequest { .. } => "CheckRequest",
        TransferMessage::Chunk(_) => "Chunk",
        TransferMessage::Failure { .. } => "Failure",
        TransferMessage::UploadResult(_) => "UploadResult",
        TransferMessage::FileInfo(_) => "FileInfo",
    }
}

/// Fills `buf` unless EOF comes first; returns the number of bytes read.
async fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn discard(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", part.display(), e),
    }
}

/// Reduces a file name to a plain base name so nothing received over the
/// network can land outside the download directory.
pub(crate) fn sanitize_filename(filename: &str) -> Option<String> {
    let base = Path::new(filename.trim()).file_name()?.to_str()?;
    if base.is_empty() || base.ends_with(PARTIAL_SUFFIX) {
        return None;
    }
    Some(base.to_string())
}
