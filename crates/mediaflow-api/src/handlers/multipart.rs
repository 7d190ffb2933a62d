//! S3-style multipart upload endpoints.
//!
//! - `POST {key}` initiates a session and answers with
//!   `InitiateMultipartUploadResult` XML
//! - `PUT {key}?uploadId=&partNumber=` stages one part, `ETag` in the response
//! - `POST {key}?uploadId=` completes with a `CompleteMultipartUpload` manifest
//! - `DELETE {key}[?uploadId=]` aborts one session or every session of `key`

use crate::constants::{HEADER_FILE_DESCRIPTION, HEADER_FILE_TITLE, HEADER_FILE_TYPE};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use mediaflow_core::models::CompleteMultipartUpload;
use mediaflow_core::AppError;
use mediaflow_services::MultipartInitiation;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartQuery {
    pub upload_id: Option<String>,
    pub part_number: Option<u32>,
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Initiate (no `uploadId`) or complete (`uploadId` set) a multipart upload.
pub async fn initiate_or_complete(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<MultipartQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<axum::response::Response, HttpAppError> {
    match query.upload_id {
        None => {
            let initiation = MultipartInitiation {
                title: header_text(&headers, HEADER_FILE_TITLE),
                description: header_text(&headers, HEADER_FILE_DESCRIPTION),
                file_type: header_text(&headers, HEADER_FILE_TYPE),
            };
            let result = state.engine.initiate_multipart(&key, initiation).await?;
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/xml")],
                result.to_xml(),
            )
                .into_response())
        }
        Some(upload_id) => {
            let manifest = std::str::from_utf8(&body).map_err(|_| {
                AppError::InvalidInput("Completion manifest is not UTF-8".to_string())
            })?;
            let manifest = CompleteMultipartUpload::parse(manifest)?;
            let record = state
                .engine
                .complete_multipart(&key, &upload_id, &manifest)
                .await?;
            Ok(Json(record).into_response())
        }
    }
}

#[tracing::instrument(skip(state, body), fields(size = body.len()))]
pub async fn upload_part(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<MultipartQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let (Some(upload_id), Some(part_number)) = (query.upload_id, query.part_number) else {
        return Err(AppError::InvalidInput(
            "uploadId and partNumber are required".to_string(),
        )
        .into());
    };

    let staged = state
        .engine
        .upload_part(&key, &upload_id, part_number, &body)
        .await?;
    Ok((
        StatusCode::OK,
        [(header::ETAG, format!("\"{}\"", staged.etag))],
    ))
}

pub async fn abort(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<MultipartQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .engine
        .abort_multipart(&key, query.upload_id.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
