use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::types::{FileRecord, PARTIAL_SUFFIX};
use crate::error::{OverlayError, OverlayResult};

/// The set of files this node can answer searches for and serve.
///
/// Matching is by exact, case-sensitive base name: `"Report.pdf"` does not
/// match `"report.pdf"`, and `"report"` does not match `"report.pdf"`.
#[async_trait]
pub trait LocalFileIndex: Send + Sync {
    /// Indexed files whose name equals `filename`.
    async fn lookup(&self, filename: &str) -> Vec<FileRecord>;

    async fn list(&self) -> Vec<FileRecord>;

    /// Finds a servable copy of `filename`, falling back to the filesystem
    /// when the index is stale.
    async fn locate(&self, filename: &str) -> Option<FileRecord>;

    /// Rebuilds the index from scratch and returns the number of files.
    async fn reindex(&self) -> OverlayResult<usize>;

    /// Adds or refreshes a single file, typically right after a transfer.
    async fn index_file(&self, path: &Path) -> OverlayResult<FileRecord>;
}

/// In-memory index over a directory tree.
pub struct FsFileIndex {
    root: PathBuf,
    entries: RwLock<Vec<FileRecord>>,
}

impl FsFileIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl LocalFileIndex for FsFileIndex {
    async fn lookup(&self, filename: &str) -> Vec<FileRecord> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|record| record.filename == filename)
            .cloned()
            .collect()
    }

    async fn list(&self) -> Vec<FileRecord> {
        self.entries.read().await.clone()
    }

    async fn locate(&self, filename: &str) -> Option<FileRecord> {
        for record in self.lookup(filename).await {
            if let Ok(meta) = tokio::fs::metadata(&record.path).await
                && meta.is_file()
            {
                return Some(FileRecord {
                    size: meta.len(),
                    ..record
                });
            }
        }

        let root = self.root.clone();
        let wanted = filename.to_string();
        match tokio::task::spawn_blocking(move || find_file(&root, &wanted)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!("Filesystem lookup for {} panicked: {}", filename, e);
                None
            }
        }
    }

    async fn reindex(&self) -> OverlayResult<usize> {
        let root = self.root.clone();
        let scanned = tokio::task::spawn_blocking(move || scan_directory(&root))
            .await
            .map_err(|e| OverlayError::Io(std::io::Error::other(e)))?;

        let total = scanned.len();
        *self.entries.write().await = scanned;

        tracing::info!("Indexed {} files under {}", total, self.root.display());
        Ok(total)
    }

    async fn index_file(&self, path: &Path) -> OverlayResult<FileRecord> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(OverlayError::validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let record = record_for(path, meta.len()).ok_or_else(|| {
            OverlayError::validation(format!("{} has no indexable file name", path.display()))
        })?;

        let mut entries = self.entries.write().await;
        entries.retain(|existing| existing.path != record.path);
        entries.push(record.clone());

        tracing::debug!("Indexed {} ({} bytes)", record.path.display(), record.size);
        Ok(record)
    }
}

fn record_for(path: &Path, size: u64) -> Option<FileRecord> {
    let filename = path.file_name()?.to_str()?.to_string();
    if filename.ends_with(PARTIAL_SUFFIX) {
        return None;
    }
    Some(FileRecord {
        filename,
        path: path.to_path_buf(),
        size,
    })
}

/// Recursive walk. A missing root yields an empty index; unreadable
/// subdirectories are skipped.
fn scan_directory(root: &Path) -> Vec<FileRecord> {
    let mut records = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                if dir != root {
                    tracing::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                }
                continue;
            }
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                pending.push(path);
            } else if meta.is_file()
                && let Some(record) = record_for(&path, meta.len())
            {
                records.push(record);
            }
        }
    }

    records.sort_by(|a, b| a.path.cmp(&b.path));
    records
}

fn find_file(root: &Path, filename: &str) -> Option<FileRecord> {
    scan_directory(root)
        .into_iter()
        .find(|record| record.filename == filename)
}
