//! Record lookup and re-drive.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

#[tracing::instrument(skip(state))]
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state.engine.get(id).await?;
    Ok(Json(record))
}

pub async fn get_media_metadata(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let entries = state.engine.metadata(id).await?;
    Ok(Json(entries))
}

/// Re-drive a failed record from its published source.
#[tracing::instrument(skip(state))]
pub async fn reprocess_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state.engine.reprocess(id).await?;
    Ok(Json(record))
}
