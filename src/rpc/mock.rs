//! In-process control plane for tests.
//!
//! Routes `PeerRpc` calls straight into other nodes' directories and search
//! engines, records every query hop, and can take nodes offline.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::PeerRpc;
use crate::directory::service::PeerDirectory;
use crate::directory::types::{NodeId, PeerAddress};
use crate::error::{OverlayError, OverlayResult};
use crate::index::service::{FsFileIndex, LocalFileIndex};
use crate::search::engine::FloodSearchEngine;
use crate::search::types::{FileHit, QueryId, QueryRequest};

/// One delivered `query` call.
#[derive(Debug, Clone)]
pub struct QueryHop {
    pub query_id: QueryId,
    pub from: Option<PeerAddress>,
    pub to: PeerAddress,
    pub ttl: u32,
}

#[derive(Clone)]
pub struct TestNode {
    pub address: PeerAddress,
    pub directory: Arc<PeerDirectory>,
    pub engine: Arc<FloodSearchEngine>,
    pub index: Arc<dyn LocalFileIndex>,
}

#[derive(Default)]
pub struct InMemoryRpc {
    nodes: DashMap<PeerAddress, TestNode>,
    offline: DashSet<PeerAddress>,
    hops: Mutex<Vec<QueryHop>>,
}

impl InMemoryRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a node whose index covers `root`, wired to this network.
    pub async fn add_node(self: &Arc<Self>, address: &str, root: &Path) -> TestNode {
        let address = PeerAddress::new(address);
        let rpc: Arc<dyn PeerRpc> = self.clone();
        let index: Arc<dyn LocalFileIndex> = Arc::new(FsFileIndex::new(root));
        index.reindex().await.expect("reindex test root");

        let directory = PeerDirectory::new(rpc.clone());
        directory
            .set_self(address.clone())
            .await
            .expect("set self address");
        let engine = FloodSearchEngine::new(NodeId::new(), directory.clone(), index.clone(), rpc);

        let node = TestNode {
            address: address.clone(),
            directory,
            engine,
            index,
        };
        self.nodes.insert(address, node.clone());
        node
    }

    pub fn set_offline(&self, address: &str) {
        self.offline.insert(PeerAddress::new(address));
    }

    pub fn hops(&self) -> Vec<QueryHop> {
        self.hops.lock().expect("hops lock").clone()
    }

    fn reach(&self, target: &PeerAddress) -> OverlayResult<TestNode> {
        if self.offline.contains(target) {
            return Err(OverlayError::unreachable(target, "node offline"));
        }
        self.nodes
            .get(target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OverlayError::unreachable(target, "no such node"))
    }
}

#[async_trait]
impl PeerRpc for InMemoryRpc {
    async fn login(
        &self,
        target: &PeerAddress,
        me: &PeerAddress,
    ) -> OverlayResult<Vec<PeerAddress>> {
        let node = self.reach(target)?;
        node.directory.login(me.clone()).await
    }

    async fn query(
        &self,
        target: &PeerAddress,
        request: &QueryRequest,
    ) -> OverlayResult<Vec<FileHit>> {
        let node = self.reach(target)?;
        self.hops.lock().expect("hops lock").push(QueryHop {
            query_id: request.query_id.clone(),
            from: request.origin.clone(),
            to: target.clone(),
            ttl: request.ttl,
        });
        Ok(node.engine.handle_query(request.clone()).await?.results)
    }

    async fn start_search(
        &self,
        target: &PeerAddress,
        filename: &str,
        ttl: u32,
    ) -> OverlayResult<Vec<FileHit>> {
        let node = self.reach(target)?;
        Ok(node.engine.start_search(filename, ttl).await?.results)
    }
}
