//! Unified actor resolution.
//!
//! Every API handler starts here: a bearer token means an agent, otherwise the
//! session cookie means a human. Downstream code only ever sees `Actor`.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::auth::{extract_bearer_token, read_cookie, AuthError, SessionIdentity};
use crate::database::{DataClient, DataStoreError, Scope};
use crate::error::ApiError;
use crate::state::AppState;

pub const TENANT_LOOKUP_PROCEDURE: &str = "get_my_tenant_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Human,
    Agent,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Human => "human",
            ActorType::Agent => "agent",
        }
    }

    /// Agents are served from a fixed RPC and filtered in memory
    pub fn supports_server_search(&self) -> bool {
        match self {
            ActorType::Human => true,
            ActorType::Agent => false,
        }
    }

    pub fn may_delete_or_restore(&self) -> bool {
        match self {
            ActorType::Human => true,
            ActorType::Agent => false,
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized caller of one request
#[derive(Debug, Clone)]
pub struct Actor {
    pub data_client: DataClient,
    pub actor_id: String,
    pub actor_type: ActorType,
    pub tenant_id: String,
}

/// Resolve who is calling.
///
/// Fails with 401 when neither credential is valid, with `NoWorkspace` (403)
/// for a signed-in human without a workspace, and with 403 for an agent that
/// was provisioned without one.
pub async fn resolve_actor_unified(headers: &HeaderMap, state: &AppState) -> Result<Actor, ApiError> {
    if let Some(token) = extract_bearer_token(headers)? {
        let agent = state.agents.verify(&token).await?.ok_or(AuthError::UnknownAgent)?;

        let tenant_id = match agent.tenant_id.filter(|t| !t.trim().is_empty()) {
            Some(tenant_id) => tenant_id,
            None => {
                warn!("Agent {} has no workspace assignment", agent.agent_id);
                return Err(ApiError::forbidden("Agent is not assigned to a workspace"));
            }
        };

        debug!("Resolved agent {} in tenant {}", agent.agent_id, tenant_id);
        return Ok(Actor {
            data_client: DataClient::new(state.store.clone(), Scope::Service),
            actor_id: agent.agent_id,
            actor_type: ActorType::Agent,
            tenant_id,
        });
    }

    let identity = authenticate_session(headers, state).await?;
    let data_client = DataClient::new(state.store.clone(), Scope::User(identity.user_id.clone()));
    let tenant_id = lookup_tenant(&data_client).await?.ok_or_else(ApiError::no_workspace)?;

    debug!("Resolved human {} in tenant {}", identity.user_id, tenant_id);
    Ok(Actor {
        data_client,
        actor_id: identity.user_id,
        actor_type: ActorType::Human,
        tenant_id,
    })
}

/// Validate the interactive session cookie
pub async fn authenticate_session(headers: &HeaderMap, state: &AppState) -> Result<SessionIdentity, AuthError> {
    let token = read_cookie(headers, &state.config.auth.session_cookie).ok_or(AuthError::MissingCredential)?;
    state.sessions.identity_from_session(&token).await
}

/// Current workspace of a signed-in human, `None` before onboarding completes
pub async fn lookup_tenant(client: &DataClient) -> Result<Option<String>, DataStoreError> {
    let result = client.rpc(TENANT_LOOKUP_PROCEDURE, json!({})).await?;
    Ok(tenant_from_value(result))
}

fn tenant_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Array(rows) => rows.into_iter().next().and_then(tenant_from_value),
        Value::Object(mut row) => row.remove("tenant_id").and_then(tenant_from_value),
        _ => None,
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_actor_unified(&parts.headers, state).await
    }
}
