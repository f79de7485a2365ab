use axum::extract::{Path, RawQuery, State};
use serde_json::Value;
use uuid::Uuid;

use crate::collections::{self, find_collection, CollectionSpec};
use crate::error::ApiError;
use crate::filter::{parse_filter_params, ListQueryParams, Record};
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/data/:collection - One page of a tenant's collection
///
/// Query: `page`, `limit`, `q` plus the collection's filter fields, e.g.
/// `/api/data/tasks?q=invoice&status=open,blocked&page=2`.
/// The body carries `page`, `limit` and `truncated` next to `data`.
pub async fn list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
    actor: Actor,
) -> ApiResult<Vec<Record>> {
    let spec = collection_spec(&collection)?;
    state.rate_limiter.enforce(&actor)?;

    let params = ListQueryParams::parse(query.as_deref(), &state.config.list);
    let filters = parse_filter_params(query.as_deref(), spec.filter_fields);
    let page = collections::list_page(&actor, spec, &params, &filters, state.config.list.agent_fetch_cap).await?;

    Ok(ApiResponse::success(page.records)
        .meta("page", page.page)
        .meta("limit", page.limit)
        .meta("truncated", page.truncated))
}

/// DELETE /api/data/:collection/:id - Soft delete (humans only)
pub async fn record_delete(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    actor: Actor,
) -> ApiResult<Value> {
    let spec = collection_spec(&collection)?;
    let id = record_id(&id)?;
    state.rate_limiter.enforce(&actor)?;

    let result = collections::soft_delete(&actor, spec, &id).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/data/:collection/:id/restore - Undo a soft delete (humans only)
pub async fn record_restore(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    actor: Actor,
) -> ApiResult<Value> {
    let spec = collection_spec(&collection)?;
    let id = record_id(&id)?;
    state.rate_limiter.enforce(&actor)?;

    let result = collections::restore(&actor, spec, &id).await?;
    Ok(ApiResponse::success(result))
}

fn collection_spec(name: &str) -> Result<&'static CollectionSpec, ApiError> {
    find_collection(name).ok_or_else(|| ApiError::not_found(format!("Unknown collection: {}", name)))
}

fn record_id(raw: &str) -> Result<String, ApiError> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::field_error("id", "must be a UUID"))
}
