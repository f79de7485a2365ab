use axum::extract::State;
use serde_json::{json, Value};

use crate::middleware::{AdminUser, ApiResponse, ApiResult, ActorType};
use crate::state::AppState;

pub const LIST_MEMBERS_PROCEDURE: &str = "list_workspace_members";

/// GET /api/admin/members - Members of the admin's workspace
pub async fn list_members(State(state): State<AppState>, admin: AdminUser) -> ApiResult<Value> {
    state
        .rate_limiter
        .enforce_for(&admin.user.identity.user_id, ActorType::Human)?;

    let members = admin.user.data_client.rpc(LIST_MEMBERS_PROCEDURE, json!({})).await?;
    Ok(ApiResponse::success(members).meta("role", json!(admin.role)))
}
