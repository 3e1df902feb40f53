//! Node Runtime
//!
//! Assembles the control-plane router and starts both listeners of a node.
//!
//! ## Startup Order
//! 1. Bind the control listener (the bound address becomes the node identity
//!    unless `--advertise` overrides it).
//! 2. Bind the transfer listener and register this node's own endpoint.
//! 3. Build the index, then spawn the transfer server, the HTTP server and a
//!    periodic stats reporter.
//! 4. Join the overlay through the first seed that answers.

use axum::http::StatusCode;
use axum::{
    Json, Router,
    extract::Extension,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::directory::handlers::{handle_join, handle_login, handle_peers, handle_sample};
use crate::directory::types::NodeId;
use crate::directory::types::PeerAddress;
use crate::index::handlers::{handle_list_files, handle_reindex};
use crate::node::NodeState;
use crate::rpc::protocol::*;
use crate::search::handlers::{handle_query, handle_search};
use crate::transfer::handlers::{handle_check, handle_download, handle_upload};
use crate::transfer::server::TransferServer;

const STATS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: NodeId,
    pub address: PeerAddress,
    pub directory_size: usize,
    pub indexed_files: usize,
    pub uptime_secs: u64,
}

pub fn router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route(ENDPOINT_LOGIN, post(handle_login))
        .route(ENDPOINT_JOIN, post(handle_join))
        .route(ENDPOINT_SEARCH, post(handle_search))
        .route(ENDPOINT_QUERY, post(handle_query))
        .route(ENDPOINT_PEERS, get(handle_peers))
        .route(ENDPOINT_SAMPLE, get(handle_sample))
        .route(ENDPOINT_REINDEX, post(handle_reindex))
        .route(ENDPOINT_FILES, get(handle_list_files))
        .route(ENDPOINT_TRANSFER_DOWNLOAD, post(handle_download))
        .route(ENDPOINT_TRANSFER_UPLOAD, post(handle_upload))
        .route(ENDPOINT_TRANSFER_CHECK, post(handle_check))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .layer(Extension(state.directory.clone()))
        .layer(Extension(state.search.clone()))
        .layer(Extension(state.index.clone()))
        .layer(Extension(state.transfer.clone()))
        .layer(Extension(state.endpoints.clone()))
        .layer(Extension(state.orchestrator.clone()))
        .layer(Extension(state.config.clone()))
        .layer(Extension(state))
}

async fn handle_health(
    Extension(state): Extension<Arc<NodeState>>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            node_id: state.node_id.clone(),
            address: state.address.clone(),
            directory_size: state.directory.len().await,
            indexed_files: state.index.list().await.len(),
            uptime_secs: state.uptime().as_secs(),
        }),
    )
}

/// A started node. Dropping it leaves the tasks running; call
/// [`RunningNode::shutdown`] to stop them.
pub struct RunningNode {
    pub state: Arc<NodeState>,
    pub control_addr: SocketAddr,
    pub transfer_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningNode {
    /// Blocks until the control plane stops.
    pub async fn wait(mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let control = self.tasks.remove(0);
        if let Err(e) = control.await {
            tracing::error!("Control plane task ended abnormally: {}", e);
        }
        self.shutdown();
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

pub async fn start(config: NodeConfig) -> anyhow::Result<RunningNode> {
    tokio::fs::create_dir_all(&config.files_dir).await?;

    // 1. Control listener and identity:
    let control = TcpListener::bind(config.bind).await?;
    let control_addr = control.local_addr()?;
    let address = config.self_address(control_addr);

    // 2. Transfer listener:
    let transfer_bind = config.transfer_bind(control_addr)?;
    let state = NodeState::new(config, address.clone()).await?;
    let transfer = TransferServer::bind(transfer_bind, state.transfer.clone()).await?;
    let transfer_addr = transfer.local_addr()?;
    if let Some((host, _)) = address.host_port() {
        state
            .endpoints
            .register(address.clone(), format!("{}:{}", host, transfer_addr.port()));
    }

    // 3. Index and background tasks:
    state.index.reindex().await?;

    let mut tasks = Vec::new();
    let app = router(state.clone());
    tracing::info!("Control plane listening on {} (advertised as {})", control_addr, address);
    tasks.push(tokio::spawn(async move {
        if let Err(e) = axum::serve(control, app).await {
            tracing::error!("Control plane stopped: {}", e);
        }
    }));
    tasks.push(tokio::spawn(transfer.run()));

    let stats = state.clone();
    tasks.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        loop {
            interval.tick().await;
            let peers = stats.directory.all().await;
            tracing::info!(
                "Node stats: {} directory entries, {} indexed files",
                peers.len(),
                stats.index.list().await.len()
            );
            for peer in peers {
                tracing::debug!("  - {}", peer);
            }
        }
    }));

    // 4. Join the overlay:
    let seeds = state.seeds();
    if seeds.is_empty() {
        tracing::info!("No seeds given; starting as a founder node");
    } else {
        match state.directory.bootstrap(&seeds).await {
            Some(outcome) => tracing::info!("Joined overlay through {}", outcome.target),
            None => tracing::warn!("No seed answered; continuing standalone"),
        }
    }

    Ok(RunningNode {
        state,
        control_addr,
        transfer_addr,
        tasks,
    })
}
