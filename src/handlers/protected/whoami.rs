use axum::extract::State;
use serde_json::{json, Value};

use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/auth/whoami - Who the request resolved to
pub async fn whoami(State(state): State<AppState>, actor: Actor) -> ApiResult<Value> {
    state.rate_limiter.enforce(&actor)?;

    Ok(ApiResponse::success(json!({
        "actor_id": actor.actor_id,
        "actor_type": actor.actor_type,
        "tenant_id": actor.tenant_id,
    })))
}
