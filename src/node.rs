//! Node Composition
//!
//! `NodeState` is built once at startup and owns every long-lived component of
//! a node. Components receive the pieces they need through their constructors;
//! nothing in the crate relies on process-wide mutable state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::NodeConfig;
use crate::directory::service::PeerDirectory;
use crate::directory::types::{NodeId, PeerAddress};
use crate::error::OverlayResult;
use crate::index::service::{FsFileIndex, LocalFileIndex};
use crate::rpc::PeerRpc;
use crate::rpc::http::HttpPeerRpc;
use crate::search::engine::FloodSearchEngine;
use crate::transfer::discovery::TransferEndpoints;
use crate::transfer::engine::TransferEngine;
use crate::transfer::orchestrator::TransferOrchestrator;

pub struct NodeState {
    pub config: Arc<NodeConfig>,
    pub node_id: NodeId,
    pub address: PeerAddress,
    pub rpc: Arc<dyn PeerRpc>,
    pub directory: Arc<PeerDirectory>,
    pub index: Arc<dyn LocalFileIndex>,
    pub search: Arc<FloodSearchEngine>,
    pub endpoints: Arc<TransferEndpoints>,
    pub transfer: Arc<TransferEngine>,
    pub orchestrator: Arc<TransferOrchestrator>,
    started_at: Instant,
}

impl NodeState {
    /// Wires a node that talks to peers over HTTP.
    pub async fn new(config: NodeConfig, address: PeerAddress) -> OverlayResult<Arc<Self>> {
        let rpc: Arc<dyn PeerRpc> = Arc::new(HttpPeerRpc::new(config.request_timeout()));
        Self::with_rpc(config, address, rpc).await
    }

    pub async fn with_rpc(
        config: NodeConfig,
        address: PeerAddress,
        rpc: Arc<dyn PeerRpc>,
    ) -> OverlayResult<Arc<Self>> {
        let node_id = config.peer_id().map(NodeId).unwrap_or_default();

        let directory = PeerDirectory::new(rpc.clone());
        directory.set_self(address.clone()).await?;

        let index: Arc<dyn LocalFileIndex> = Arc::new(FsFileIndex::new(config.files_dir.clone()));
        let search = FloodSearchEngine::new(node_id.clone(), directory.clone(), index.clone(), rpc.clone());

        let endpoints = Arc::new(TransferEndpoints::new());
        let transfer = TransferEngine::new(
            address.clone(),
            index.clone(),
            config.download_dir(),
            config.request_timeout(),
        );
        let orchestrator = TransferOrchestrator::new(
            directory.clone(),
            search.clone(),
            rpc.clone(),
            endpoints.clone(),
            transfer.clone(),
            index.clone(),
        );

        tracing::info!("Node {} ready at {}", node_id, address);

        Ok(Arc::new(Self {
            config: Arc::new(config),
            node_id,
            address,
            rpc,
            directory,
            index,
            search,
            endpoints,
            transfer,
            orchestrator,
            started_at: Instant::now(),
        }))
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Parsed `--seed` values, in command-line order.
    pub fn seeds(&self) -> Vec<PeerAddress> {
        self.config
            .seeds
            .iter()
            .map(|seed| PeerAddress::new(seed.clone()))
            .filter(|seed| !seed.is_empty() && seed != &self.address)
            .collect()
    }
}
