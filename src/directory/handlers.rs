use axum::extract::Query;
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

use super::service::PeerDirectory;
use super::types::{
    JoinOutcome, JoinRequest, LoginRequest, LoginResponse, PeerAddress, PeersResponse,
    SampleParams,
};

const DEFAULT_SAMPLE: usize = 2;

pub async fn handle_login(
    Extension(directory): Extension<Arc<PeerDirectory>>,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<LoginResponse>) {
    match directory.login(PeerAddress::new(req.address)).await {
        Ok(dl) => (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                dl,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("Rejected login: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(LoginResponse {
                    success: false,
                    dl: Vec::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_join(
    Extension(directory): Extension<Arc<PeerDirectory>>,
    Json(req): Json<JoinRequest>,
) -> (StatusCode, Json<JoinOutcome>) {
    let target = PeerAddress::new(req.target);
    match directory.join(target.clone()).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(e) => {
            tracing::warn!("Rejected join: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(JoinOutcome {
                    success: false,
                    target,
                    dl: Vec::new(),
                    local_dl: directory.all().await,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_peers(
    Extension(directory): Extension<Arc<PeerDirectory>>,
) -> Json<PeersResponse> {
    Json(PeersResponse {
        success: true,
        peers: directory.all().await,
    })
}

pub async fn handle_sample(
    Extension(directory): Extension<Arc<PeerDirectory>>,
    Query(params): Query<SampleParams>,
) -> Json<PeersResponse> {
    let n = params.n.unwrap_or(DEFAULT_SAMPLE);
    Json(PeersResponse {
        success: true,
        peers: directory.sample(n).await,
    })
}
