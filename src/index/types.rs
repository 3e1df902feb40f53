use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Suffix of files still being written by a transfer. Never indexed or served.
pub const PARTIAL_SUFFIX: &str = ".part";

/// A file shared by this node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Base name used for matching.
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    pub success: bool,
    pub data: Vec<FileRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReindexResponse {
    pub success: bool,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
