//! Basic (single request) upload.
//!
//! Accepts either a `multipart/form-data` form with a `file` field, or a
//! JSON body whose `content` is plain text or, with `base64: true`, base64
//! (an optional `data:...;base64,` prefix is stripped).

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use mediaflow_core::AppError;
use mediaflow_services::{BasicUploadRequest, UploadPayload};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct BasicUploadJson {
    pub filename: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub base64: bool,
    pub content: String,
    #[serde(default)]
    pub skip_save: bool,
}

impl From<BasicUploadJson> for BasicUploadRequest {
    fn from(body: BasicUploadJson) -> Self {
        let payload = if body.base64 {
            UploadPayload::Base64(body.content)
        } else {
            UploadPayload::Bytes(Bytes::from(body.content))
        };
        BasicUploadRequest {
            filename: body.filename,
            title: body.title,
            description: body.description,
            payload,
            skip_save: body.skip_save,
        }
    }
}

pub async fn basic_upload(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<impl IntoResponse, HttpAppError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let upload = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;
        read_form(multipart).await?
    } else {
        let Json(body) = Json::<BasicUploadJson>::from_request(request, &()).await?;
        body.into()
    };

    let record = state.engine.basic_upload(upload).await?;
    let status = if record.is_persisted() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(record)))
}

async fn read_form(mut multipart: Multipart) -> Result<BasicUploadRequest, HttpAppError> {
    let mut file: Option<(Option<String>, Bytes)> = None;
    let mut title = None;
    let mut description = None;
    let mut skip_save = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                file = Some((filename, field.bytes().await?));
            }
            "title" => title = Some(field.text().await?),
            "description" => description = Some(field.text().await?),
            "skip_save" => skip_save = is_truthy(&field.text().await?),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown form field");
            }
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::InvalidInput("Missing 'file' form field".to_string()))?;
    Ok(BasicUploadRequest {
        filename,
        title,
        description,
        payload: UploadPayload::Bytes(data),
        skip_save,
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
