use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{Value, json};
use std::sync::Arc;

use super::discovery::TransferEndpoints;
use super::engine::TransferEngine;
use super::orchestrator::TransferOrchestrator;
use super::types::{CheckRequest, FetchOutcome, FetchRequest, TransferResult, UploadRequest};
use crate::config::NodeConfig;
use crate::directory::types::PeerAddress;
use crate::error::OverlayError;

fn status_for(e: &OverlayError) -> StatusCode {
    match e {
        OverlayError::Validation(_) => StatusCode::BAD_REQUEST,
        OverlayError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_download(
    Extension(orchestrator): Extension<Arc<TransferOrchestrator>>,
    Extension(config): Extension<Arc<NodeConfig>>,
    Json(req): Json<FetchRequest>,
) -> (StatusCode, Json<FetchOutcome>) {
    let ttl = req.ttl.unwrap_or(config.ttl);
    match orchestrator.fetch_by_name(&req.filename, ttl).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(e) => {
            tracing::warn!("Download request rejected: {}", e);
            (
                status_for(&e),
                Json(FetchOutcome {
                    message: Some(e.to_string()),
                    ..Default::default()
                }),
            )
        }
    }
}

pub async fn handle_upload(
    Extension(engine): Extension<Arc<TransferEngine>>,
    Extension(endpoints): Extension<Arc<TransferEndpoints>>,
    Json(req): Json<UploadRequest>,
) -> (StatusCode, Json<TransferResult>) {
    let attempt = async {
        let endpoint = endpoints.resolve(&PeerAddress::new(req.target.clone()))?;
        engine.upload(&endpoint, &req.path).await
    }
    .await;

    match attempt {
        Ok(result) => (StatusCode::OK, Json(result)),
        Err(e) => {
            tracing::warn!("Upload request rejected: {}", e);
            (status_for(&e), Json(TransferResult::failed(e.to_string(), 0)))
        }
    }
}

pub async fn handle_check(
    Extension(engine): Extension<Arc<TransferEngine>>,
    Extension(endpoints): Extension<Arc<TransferEndpoints>>,
    Json(req): Json<CheckRequest>,
) -> (StatusCode, Json<Value>) {
    let attempt = async {
        let endpoint = endpoints.resolve(&PeerAddress::new(req.target.clone()))?;
        engine.check_exists(&endpoint, &req.filename).await
    }
    .await;

    match attempt {
        Ok(info) => (StatusCode::OK, Json(json!({ "success": true, "info": info }))),
        Err(e) => {
            tracing::warn!("Existence check against {} failed: {}", req.target, e);
            (
                status_for(&e),
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}
