//! Managed database surface: named RPCs plus collection queries.
//!
//! Business rules, tenant isolation and idempotency live in the database's
//! stored procedures and row-level security policies. This module only
//! forwards calls under the right scope.

pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::filter::{CollectionQuery, Record};

pub use postgres::PgDataStore;

#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Error raised on purpose by a stored procedure (validation, business rule)
    #[error("{0}")]
    Rejected(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

/// Whose row-level security applies to a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Queries run as this authenticated user
    User(String),
    /// Privileged access; callers must scope by tenant themselves
    Service,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Invoke a stored procedure with a JSON parameter object
    async fn rpc(&self, scope: &Scope, name: &str, params: Value) -> Result<Value, DataStoreError>;

    /// Execute a collection query, returning each row as a JSON object
    async fn fetch(&self, scope: &Scope, query: &CollectionQuery) -> Result<Vec<Record>, DataStoreError>;

    async fn ping(&self) -> Result<(), DataStoreError>;
}

/// Request-scoped handle on the data store, bound to the caller's scope
#[derive(Clone)]
pub struct DataClient {
    store: Arc<dyn DataStore>,
    scope: Scope,
}

impl DataClient {
    pub fn new(store: Arc<dyn DataStore>, scope: Scope) -> Self {
        Self { store, scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub async fn rpc(&self, name: &str, params: Value) -> Result<Value, DataStoreError> {
        self.store.rpc(&self.scope, name, params).await
    }

    pub async fn fetch(&self, query: &CollectionQuery) -> Result<Vec<Record>, DataStoreError> {
        self.store.fetch(&self.scope, query).await
    }
}

impl std::fmt::Debug for DataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataClient").field("scope", &self.scope).finish_non_exhaustive()
    }
}
