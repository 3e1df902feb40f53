use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

use super::history::QueryHistory;
use super::types::{FileHit, QueryId, QueryRequest, SearchOutcome};
use crate::directory::service::PeerDirectory;
use crate::directory::types::{NodeId, PeerAddress};
use crate::error::{OverlayError, OverlayResult, require_non_empty};
use crate::index::service::LocalFileIndex;
use crate::rpc::PeerRpc;

/// TTL-bounded flooding search over the directory's neighbors.
///
/// Every hit from the local index and from every reachable branch is
/// aggregated (set union keyed by owner and path); there is no early exit on
/// the first match.
pub struct FloodSearchEngine {
    node_id: NodeId,
    directory: Arc<PeerDirectory>,
    history: QueryHistory,
    index: Arc<dyn LocalFileIndex>,
    rpc: Arc<dyn PeerRpc>,
}

impl FloodSearchEngine {
    pub fn new(
        node_id: NodeId,
        directory: Arc<PeerDirectory>,
        index: Arc<dyn LocalFileIndex>,
        rpc: Arc<dyn PeerRpc>,
    ) -> Arc<Self> {
        Self::with_history(node_id, directory, index, rpc, QueryHistory::new())
    }

    pub fn with_history(
        node_id: NodeId,
        directory: Arc<PeerDirectory>,
        index: Arc<dyn LocalFileIndex>,
        rpc: Arc<dyn PeerRpc>,
        history: QueryHistory,
    ) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            directory,
            history,
            index,
            rpc,
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    /// Starts a new search from this node. Neighbors receive `ttl - 1`.
    pub async fn start_search(&self, filename: &str, ttl: u32) -> OverlayResult<SearchOutcome> {
        require_non_empty("filename", filename)?;
        let me = self.require_self().await?;

        let query_id = QueryId::new();
        self.history.record(&query_id).await;

        tracing::info!(
            "Starting search {} for '{}' (ttl={})",
            query_id,
            filename,
            ttl
        );

        let mut hits = self.local_hits(filename, &me).await;
        if ttl > 0 {
            let targets = self.directory.neighbors(None).await;
            hits.extend(
                self.propagate(&query_id, filename, ttl - 1, &me, targets)
                    .await,
            );
        }

        let results = aggregate(hits);
        tracing::info!(
            "Search {} for '{}' finished with {} result(s)",
            query_id,
            filename,
            results.len()
        );

        Ok(SearchOutcome {
            query_id: Some(query_id),
            results,
            duplicate: false,
        })
    }

    /// Handles one hop of a search relayed by a neighbor.
    ///
    /// A query ID already in the history yields an empty outcome and is not
    /// propagated again.
    pub async fn handle_query(&self, request: QueryRequest) -> OverlayResult<SearchOutcome> {
        require_non_empty("query_id", &request.query_id.0)?;
        require_non_empty("filename", &request.filename)?;
        let me = self.require_self().await?;

        if !self.history.record(&request.query_id).await {
            tracing::debug!(
                "Dropping duplicate query {} from {:?}",
                request.query_id,
                request.origin
            );
            return Ok(SearchOutcome {
                query_id: Some(request.query_id),
                results: Vec::new(),
                duplicate: true,
            });
        }

        tracing::debug!(
            "Handling query {} for '{}' (ttl={}, from {:?})",
            request.query_id,
            request.filename,
            request.ttl,
            request.origin
        );

        let mut hits = self.local_hits(&request.filename, &me).await;
        if request.ttl > 0 {
            let targets = self.directory.neighbors(request.origin.as_ref()).await;
            hits.extend(
                self.propagate(
                    &request.query_id,
                    &request.filename,
                    request.ttl - 1,
                    &me,
                    targets,
                )
                .await,
            );
        }

        Ok(SearchOutcome {
            query_id: Some(request.query_id),
            results: aggregate(hits),
            duplicate: false,
        })
    }

    async fn require_self(&self) -> OverlayResult<PeerAddress> {
        self.directory
            .self_address()
            .await
            .ok_or_else(|| OverlayError::validation("self address not configured"))
    }

    async fn local_hits(&self, filename: &str, me: &PeerAddress) -> Vec<FileHit> {
        self.index
            .lookup(filename)
            .await
            .into_iter()
            .map(|record| FileHit {
                filename: record.filename,
                path: record.path.display().to_string(),
                size: record.size,
                owner: me.clone(),
                owner_id: self.node_id.clone(),
            })
            .collect()
    }

    /// Fans out to every target concurrently. A failing branch contributes
    /// nothing and never aborts its siblings.
    async fn propagate(
        &self,
        query_id: &QueryId,
        filename: &str,
        ttl: u32,
        me: &PeerAddress,
        targets: Vec<PeerAddress>,
    ) -> Vec<FileHit> {
        if targets.is_empty() {
            return Vec::new();
        }

        let request = QueryRequest {
            query_id: query_id.clone(),
            filename: filename.to_string(),
            ttl,
            origin: Some(me.clone()),
        };

        let branches = targets.iter().map(|target| {
            let request = &request;
            async move {
                match self.rpc.query(target, request).await {
                    Ok(hits) => {
                        tracing::debug!(
                            "Query {} -> {}: {} hit(s)",
                            request.query_id,
                            target,
                            hits.len()
                        );
                        hits
                    }
                    Err(e) => {
                        tracing::warn!("Query {} -> {} failed: {}", request.query_id, target, e);
                        Vec::new()
                    }
                }
            }
        });

        join_all(branches).await.into_iter().flatten().collect()
    }
}

/// Set union preserving first-seen order.
fn aggregate(hits: Vec<FileHit>) -> Vec<FileHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert((hit.owner.clone(), hit.path.clone())))
        .collect()
}
