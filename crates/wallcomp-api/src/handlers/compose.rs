//! Composition handlers.
//!
//! Both endpoints resolve every placement to a concrete source, hand the
//! request to the composition service and answer with a download URL. Scratch
//! files (uploads, fetched sources) live in a per-request temp directory that
//! is removed when the handler returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use wallcomp_media::fs_utils;
use wallcomp_models::{ComposeMetadata, ComposeResponse, PlacementId, PlacementSpec, SourceLocation};

use crate::error::{ApiError, ApiResult};
use crate::security::{is_valid_asset_id, validate_source_url};
use crate::state::AppState;

/// Multipart part carrying the JSON layout.
const METADATA_PART: &str = "metadata";
/// Prefix of file parts; the rest of the part name is the placement id.
const MEDIA_PART_PREFIX: &str = "media:";
/// File parts named after the uploaded file, as older clients send them.
const LEGACY_MEDIA_PART: &str = "videos";

/// Compose from uploaded media files.
///
/// Expects a `metadata` text part with the JSON layout and one file part per
/// uploaded asset named `media:<placement id>`.
pub async fn compose_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ComposeResponse>> {
    let scratch = scratch_dir(&state).await?;

    let mut metadata: Option<ComposeMetadata> = None;
    let mut uploads: HashMap<PlacementId, PathBuf> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == METADATA_PART {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Unreadable metadata part: {}", e)))?;
            metadata = Some(parse_metadata(&text)?);
            continue;
        }

        let asset_id = match name.strip_prefix(MEDIA_PART_PREFIX) {
            Some(id) => id.to_string(),
            None if name == LEGACY_MEDIA_PART => legacy_asset_id(&field)?,
            None => {
                warn!(part = %name, "Ignoring unexpected multipart part");
                continue;
            }
        };

        if !is_valid_asset_id(&asset_id) {
            return Err(ApiError::bad_request(format!(
                "Invalid asset id '{}': use 1-128 letters, digits, '-' or '_'",
                asset_id
            )));
        }
        let id = PlacementId::from_string(asset_id);
        if uploads.contains_key(&id) {
            return Err(ApiError::bad_request(format!("Duplicate upload for asset {}", id)));
        }

        let dest = scratch
            .path()
            .join(format!("upload_{}.{}", id, upload_extension(&field)));
        save_field(field, &dest, &id).await?;
        uploads.insert(id, dest);
    }

    let metadata = metadata
        .ok_or_else(|| ApiError::bad_request("Missing 'metadata' part"))?;

    info!(
        uploads = uploads.len(),
        placements = metadata.placements.len(),
        "Received compose upload"
    );

    let request = metadata.resolve(|spec| resolve_source(spec, &uploads, false))?;
    let result = state.composer.compose(request, scratch.path()).await?;

    Ok(Json(ComposeResponse {
        download_url: state.config.download_url(&result.file_name),
        file_name: result.file_name,
    }))
}

/// Compose from sources given by URL (or local path, when enabled).
pub async fn compose_json(
    State(state): State<AppState>,
    payload: Result<Json<ComposeMetadata>, JsonRejection>,
) -> ApiResult<Json<ComposeResponse>> {
    let Json(metadata) =
        payload.map_err(|e| ApiError::Validation(format!("Invalid metadata: {}", e.body_text())))?;

    let no_uploads = HashMap::new();
    let allow_local = state.config.allow_local_sources;
    let request = metadata.resolve(|spec| resolve_source(spec, &no_uploads, allow_local))?;

    let scratch = scratch_dir(&state).await?;
    let result = state.composer.compose(request, scratch.path()).await?;

    Ok(Json(ComposeResponse {
        download_url: state.config.download_url(&result.file_name),
        file_name: result.file_name,
    }))
}

/// Pick the source for one placement: its upload first, then its `source`.
fn resolve_source(
    spec: &PlacementSpec,
    uploads: &HashMap<PlacementId, PathBuf>,
    allow_local: bool,
) -> ApiResult<SourceLocation> {
    if let Some(path) = uploads.get(&spec.id) {
        return Ok(SourceLocation::Local(path.clone()));
    }

    match &spec.source {
        Some(SourceLocation::Remote(url)) => {
            validate_source_url(url).map_err(|reason| {
                ApiError::Validation(format!("placement {}: {}", spec.id, reason))
            })?;
            Ok(SourceLocation::Remote(url.clone()))
        }
        Some(SourceLocation::Local(path)) if allow_local => Ok(SourceLocation::Local(path.clone())),
        Some(SourceLocation::Local(_)) => Err(ApiError::Validation(format!(
            "placement {}: local file sources are not accepted",
            spec.id
        ))),
        None => Err(ApiError::Validation(format!(
            "placement {}: no uploaded file and no source",
            spec.id
        ))),
    }
}

fn parse_metadata(text: &str) -> ApiResult<ComposeMetadata> {
    serde_json::from_str(text)
        .map_err(|e| ApiError::Validation(format!("Invalid metadata: {}", e)))
}

/// Fresh per-request scratch directory under the uploads dir.
async fn scratch_dir(state: &AppState) -> ApiResult<TempDir> {
    let uploads_dir = state.config.uploads_dir();
    fs_utils::ensure_dir(&uploads_dir).await?;
    tempfile::Builder::new()
        .prefix("compose-")
        .tempdir_in(&uploads_dir)
        .map_err(|e| ApiError::internal(format!("Failed to create scratch directory: {}", e)))
}

/// Asset id of a legacy part: the uploaded file name without its extension.
fn legacy_asset_id(field: &Field<'_>) -> ApiResult<String> {
    field
        .file_name()
        .map(Path::new)
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Uploaded file is missing a file name"))
}

/// File extension for a stored upload, from the client's file name.
fn upload_extension(field: &Field<'_>) -> String {
    fs_utils::safe_extension(field.file_name().unwrap_or_default())
}

/// Stream one file part to disk.
async fn save_field(mut field: Field<'_>, dest: &Path, id: &PlacementId) -> ApiResult<()> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;
    let mut size = 0u64;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(format!("Upload for {} was interrupted: {}", id, e)))?
    {
        size += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;

    if size == 0 {
        return Err(ApiError::bad_request(format!("Upload for {} is empty", id)));
    }

    debug!(asset = %id, bytes = size, "Stored upload at {}", dest.display());
    Ok(())
}
