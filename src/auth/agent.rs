use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{hash_agent_token, AuthError};
use crate::database::{DataStore, Scope};

/// A registered agent account, provisioned with a fixed workspace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentIdentity {
    pub agent_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[async_trait]
pub trait AgentVerifier: Send + Sync {
    /// Resolve a bearer token to its agent, `None` if the token is not registered
    async fn verify(&self, token: &str) -> Result<Option<AgentIdentity>, AuthError>;
}

/// Looks agent tokens up by SHA-256 digest through the `verify_agent_token` procedure
pub struct RpcAgentVerifier {
    store: Arc<dyn DataStore>,
}

impl RpcAgentVerifier {
    pub const PROCEDURE: &'static str = "verify_agent_token";

    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AgentVerifier for RpcAgentVerifier {
    async fn verify(&self, token: &str) -> Result<Option<AgentIdentity>, AuthError> {
        let result = self
            .store
            .rpc(&Scope::Service, Self::PROCEDURE, json!({ "p_token_hash": hash_agent_token(token) }))
            .await?;

        // Procedures may return a row, a one-row set or nothing
        let row = match result {
            Value::Null => return Ok(None),
            Value::Array(rows) => match rows.into_iter().next() {
                Some(row) => row,
                None => return Ok(None),
            },
            other => other,
        };

        let identity: AgentIdentity = serde_json::from_value(row)
            .map_err(|e| AuthError::Provider(format!("unexpected agent record: {}", e)))?;
        Ok(Some(identity))
    }
}
