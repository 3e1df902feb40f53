use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

use super::service::LocalFileIndex;
use super::types::{FilesResponse, ReindexResponse};

pub async fn handle_reindex(
    Extension(index): Extension<Arc<dyn LocalFileIndex>>,
) -> (StatusCode, Json<ReindexResponse>) {
    match index.reindex().await {
        Ok(total) => (
            StatusCode::OK,
            Json(ReindexResponse {
                success: true,
                total,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Reindex failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReindexResponse {
                    success: false,
                    total: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_list_files(
    Extension(index): Extension<Arc<dyn LocalFileIndex>>,
) -> Json<FilesResponse> {
    Json(FilesResponse {
        success: true,
        data: index.list().await,
    })
}
