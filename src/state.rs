use anyhow::Context;
use std::sync::Arc;

use crate::auth::{AgentVerifier, GoTrueSessionProvider, RpcAgentVerifier, SessionProvider};
use crate::config::AppConfig;
use crate::database::{DataStore, PgDataStore};
use crate::middleware::RateLimiter;
use crate::services::{HttpLlmGateway, HttpObjectStorage, LlmGateway, ObjectStorage};

/// Shared handles every handler can reach. Collaborators sit behind traits
/// so the whole router can run against in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionProvider>,
    pub agents: Arc<dyn AgentVerifier>,
    pub store: Arc<dyn DataStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub llm: Arc<dyn LlmGateway>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionProvider>,
        agents: Arc<dyn AgentVerifier>,
        store: Arc<dyn DataStore>,
        storage: Arc<dyn ObjectStorage>,
        llm: Arc<dyn LlmGateway>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config: Arc::new(config),
            sessions,
            agents,
            store,
            storage,
            llm,
            rate_limiter,
        }
    }

    /// Wire the production collaborators from configuration
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn DataStore> =
            Arc::new(PgDataStore::connect_lazy(&config.database).context("failed to configure database")?);
        let sessions = Arc::new(GoTrueSessionProvider::new(&config.auth));
        let agents = Arc::new(RpcAgentVerifier::new(store.clone()));
        let storage = Arc::new(HttpObjectStorage::new(&config.storage));
        let llm = Arc::new(HttpLlmGateway::new(&config.llm).context("failed to build LLM gateway client")?);

        Ok(Self::new(config, sessions, agents, store, storage, llm))
    }
}
