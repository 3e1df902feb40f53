use std::sync::Arc;

use super::discovery::TransferEndpoints;
use super::engine::{TransferEngine, sanitize_filename};
use super::types::{FetchOutcome, TransferResult};
use crate::directory::service::PeerDirectory;
use crate::directory::types::PeerAddress;
use crate::error::{OverlayError, OverlayResult, require_non_empty};
use crate::index::service::LocalFileIndex;
use crate::rpc::PeerRpc;
use crate::search::engine::FloodSearchEngine;
use crate::search::types::FileHit;

/// Search-then-download by file name.
///
/// Walks the local directory in order and asks each entry (this node
/// included) to run a search; the first entry that reports any hit decides
/// the owner. Only hits naming exactly the requested file count, and the
/// local destination is always derived from the requested name, never from
/// what a peer reported. The file is then pulled over the transfer plane and
/// the local index is rebuilt whatever the outcome, including when the file
/// turns out to be local already.
pub struct TransferOrchestrator {
    directory: Arc<PeerDirectory>,
    search: Arc<FloodSearchEngine>,
    rpc: Arc<dyn PeerRpc>,
    endpoints: Arc<TransferEndpoints>,
    transfer: Arc<TransferEngine>,
    index: Arc<dyn LocalFileIndex>,
}

impl TransferOrchestrator {
    pub fn new(
        directory: Arc<PeerDirectory>,
        search: Arc<FloodSearchEngine>,
        rpc: Arc<dyn PeerRpc>,
        endpoints: Arc<TransferEndpoints>,
        transfer: Arc<TransferEngine>,
        index: Arc<dyn LocalFileIndex>,
    ) -> Arc<Self> {
        Arc::new(Self {
            directory,
            search,
            rpc,
            endpoints,
            transfer,
            index,
        })
    }

    pub async fn fetch_by_name(&self, filename: &str, ttl: u32) -> OverlayResult<FetchOutcome> {
        require_non_empty("filename", filename)?;
        let name = sanitize_filename(filename)
            .filter(|name| name == filename)
            .ok_or_else(|| {
                OverlayError::validation(format!("'{}' is not a plain file name", filename))
            })?;
        let me = self
            .directory
            .self_address()
            .await
            .ok_or_else(|| OverlayError::validation("node address not configured"))?;

        let Some(hits) = self.first_positive(&me, filename, ttl).await else {
            tracing::info!("{} not found anywhere in the overlay", filename);
            return Ok(FetchOutcome {
                success: true,
                found: false,
                message: Some(format!("{} not found", filename)),
                ..Default::default()
            });
        };

        // Prefer a remote copy; a purely local result means there is nothing to fetch.
        let Some(hit) = hits.iter().find(|hit| hit.owner != me).cloned() else {
            let local = &hits[0];
            return Ok(FetchOutcome {
                success: true,
                found: true,
                owner: Some(local.owner.clone()),
                owner_id: Some(local.owner_id.clone()),
                local_reindex_total: self.reindex(filename).await,
                message: Some(format!("{} is already available locally", filename)),
                ..Default::default()
            });
        };

        let mut outcome = FetchOutcome {
            success: true,
            found: true,
            owner: Some(hit.owner.clone()),
            owner_id: Some(hit.owner_id.clone()),
            ..Default::default()
        };

        let transfer = match self.endpoints.resolve(&hit.owner) {
            Ok(endpoint) => {
                outcome.transfer_endpoint = Some(endpoint.clone());
                let destination = self.transfer.download_dir().join(&name);
                self.transfer
                    .download(&endpoint, &name, &destination)
                    .await?
            }
            Err(e) => {
                tracing::warn!("No transfer endpoint for {}: {}", hit.owner, e);
                TransferResult::failed(e.to_string(), 0)
            }
        };
        outcome.success = transfer.success;
        outcome.message = Some(transfer.message.clone());
        outcome.transfer = Some(transfer);

        outcome.local_reindex_total = self.reindex(filename).await;
        Ok(outcome)
    }

    async fn reindex(&self, filename: &str) -> Option<usize> {
        match self.index.reindex().await {
            Ok(total) => Some(total),
            Err(e) => {
                tracing::warn!("Reindex after fetching {} failed: {}", filename, e);
                None
            }
        }
    }

    async fn first_positive(&self, me: &PeerAddress, filename: &str, ttl: u32) -> Option<Vec<FileHit>> {
        for peer in self.directory.all().await {
            let result = if &peer == me {
                self.search
                    .start_search(filename, ttl)
                    .await
                    .map(|outcome| outcome.results)
            } else {
                self.rpc.start_search(&peer, filename, ttl).await
            };

            // Peers may answer with names other than the one asked for; never trust those.
            let result = result.map(|hits| {
                let (exact, other): (Vec<FileHit>, Vec<FileHit>) =
                    hits.into_iter().partition(|hit| hit.filename == filename);
                if !other.is_empty() {
                    tracing::warn!("{} returned {} hit(s) not named {}", peer, other.len(), filename);
                }
                exact
            });

            match result {
                Ok(hits) if !hits.is_empty() => {
                    tracing::info!("{} answered for {} with {} hit(s)", peer, filename, hits.len());
                    return Some(hits);
                }
                Ok(_) => tracing::debug!("{} has no hit for {}", peer, filename),
                Err(e) => tracing::warn!("Search via {} failed: {}", peer, e),
            }
        }
        None
    }
}
