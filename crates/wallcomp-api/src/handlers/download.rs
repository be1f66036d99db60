//! Artifact download handler.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Serve a composed artifact as `video/mp4`, with range support.
pub async fn download(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let path = state
        .composer
        .artifact_path(&file_name)
        .ok_or_else(|| ApiError::bad_request("Invalid file name"))?;

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ApiError::not_found("File not found"));
    }

    let response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never: Infallible| match never {});

    let mut response = response.map(Body::new);
    let served_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&file_name);
    let disposition = format!("attachment; filename=\"{}\"", served_name);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
