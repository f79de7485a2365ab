use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::storage::validate_object_path;
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub path: Option<String>,
}

/// POST /api/files?path=<relative path> - Upload the raw request body
///
/// The object lands under the caller's tenant (`<tenant_id>/<path>`), so one
/// workspace can never write into another's prefix.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    actor: Actor,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    state.rate_limiter.enforce(&actor)?;

    let relative = validate_object_path(query.path.as_deref().unwrap_or_default())?;
    if body.is_empty() {
        return Err(ApiError::field_error("body", "file content is empty"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let path = format!("{}/{}", actor.tenant_id, relative);
    let size = body.len();
    state.storage.upload(&path, body, &content_type).await?;
    let url = state.storage.public_url(&path)?;
    info!("{} {} uploaded {} ({} bytes)", actor.actor_type, actor.actor_id, path, size);

    Ok(ApiResponse::created(json!({
        "path": path,
        "url": url,
        "content_type": content_type,
        "size": size,
    })))
}
