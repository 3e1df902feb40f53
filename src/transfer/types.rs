use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::directory::types::{NodeId, PeerAddress};

/// Fixed payload size of every chunk except possibly the last.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on one encoded frame: a full chunk plus headroom for metadata.
pub const MAX_FRAME_BYTES: usize = CHUNK_SIZE + 16 * 1024;

/// One piece of a file in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChunk {
    pub filename: String,
    /// Position in the stream, starting at 0.
    pub sequence: u64,
    pub data: Vec<u8>,
    /// Size of the whole file as declared by the sender.
    pub total_size: u64,
    pub is_last: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureCode {
    InvalidArgument,
    NotFound,
    Internal,
}

/// Everything that crosses the transfer plane. One TCP connection carries one
/// call: a request message, then the call-specific sequence.
///
/// - `Download`: request, then `Chunk`s up to the one flagged last (or a `Failure`).
/// - `Upload`: request, `Chunk`s from the client, then one `UploadResult`.
/// - `Check`: request, then one `FileInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransferMessage {
    DownloadRequest {
        filename: String,
        requesting_node: Option<String>,
    },
    UploadRequest {
        filename: String,
        total_size: u64,
        requesting_node: Option<String>,
    },
    CheckRequest {
        filename: String,
    },
    Chunk(FileChunk),
    Failure {
        code: FailureCode,
        message: String,
    },
    UploadResult(TransferResult),
    FileInfo(FileInfo),
}

/// Outcome of a download or upload. Failures are values, not errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferResult {
    pub success: bool,
    pub message: String,
    pub bytes_transferred: u64,
    pub destination: Option<PathBuf>,
}

impl TransferResult {
    pub fn completed(message: impl Into<String>, bytes: u64, destination: PathBuf) -> Self {
        Self {
            success: true,
            message: message.into(),
            bytes_transferred: bytes,
            destination: Some(destination),
        }
    }

    pub fn failed(message: impl Into<String>, bytes: u64) -> Self {
        Self {
            success: false,
            message: message.into(),
            bytes_transferred: bytes,
            destination: None,
        }
    }
}

/// Answer to an existence check. `size` and `path` are only set when the file exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInfo {
    pub exists: bool,
    pub filename: String,
    pub size: Option<u64>,
    pub path: Option<String>,
    pub node_address: Option<String>,
}

impl FileInfo {
    pub fn missing(filename: impl Into<String>, node_address: Option<String>) -> Self {
        Self {
            exists: false,
            filename: filename.into(),
            size: None,
            path: None,
            node_address,
        }
    }
}

// --- Control-plane DTOs ---

/// Body of `POST /transfer/download`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub filename: String,
    #[serde(default)]
    pub ttl: Option<u32>,
}

/// Result of locating a file through the overlay and downloading it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub success: bool,
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PeerAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_reindex_total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /transfer/upload`: push a local file to `target` (control address).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub target: String,
    pub path: PathBuf,
}

/// Body of `POST /transfer/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub target: String,
    pub filename: String,
}
