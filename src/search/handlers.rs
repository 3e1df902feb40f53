use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

use super::engine::FloodSearchEngine;
use super::types::{QueryRequest, SearchResponse, StartSearchRequest};
use crate::config::NodeConfig;
use crate::error::OverlayError;

fn status_for(e: &OverlayError) -> StatusCode {
    match e {
        OverlayError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_search(
    Extension(engine): Extension<Arc<FloodSearchEngine>>,
    Extension(config): Extension<Arc<NodeConfig>>,
    Json(req): Json<StartSearchRequest>,
) -> (StatusCode, Json<SearchResponse>) {
    let ttl = req.ttl.unwrap_or(config.ttl);
    match engine.start_search(&req.filename, ttl).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.into())),
        Err(e) => {
            tracing::warn!("Search rejected: {}", e);
            (status_for(&e), Json(SearchResponse::failure(e)))
        }
    }
}

pub async fn handle_query(
    Extension(engine): Extension<Arc<FloodSearchEngine>>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<SearchResponse>) {
    match engine.handle_query(req).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.into())),
        Err(e) => {
            tracing::warn!("Query rejected: {}", e);
            (status_for(&e), Json(SearchResponse::failure(e)))
        }
    }
}
