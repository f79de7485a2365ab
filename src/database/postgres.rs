use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{
    postgres::{PgArguments, PgPoolOptions},
    PgPool, Postgres, Row, Transaction,
};
use std::time::Duration;
use tracing::{debug, info};

use super::{DataStore, DataStoreError, Scope};
use crate::config::DatabaseConfig;
use crate::filter::{CollectionQuery, Record};

const AUTHENTICATED_ROLE: &str = "authenticated";
const SERVICE_ROLE: &str = "service_role";

/// `DataStore` over a Postgres pool.
///
/// Every call runs in its own transaction with the database role and JWT claims
/// set locally, so row-level security policies see the real caller. Stored
/// procedures follow one calling convention: a single `jsonb` argument in, `jsonb` out.
pub struct PgDataStore {
    pool: PgPool,
}

impl PgDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool without opening a connection; the first query connects
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DataStoreError> {
        if config.url.is_empty() {
            return Err(DataStoreError::ConfigMissing("DATABASE_URL"));
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(&config.url)
            .map_err(classify)?;
        info!("Configured database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    async fn begin_scoped(&self, scope: &Scope) -> Result<Transaction<'_, Postgres>, DataStoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let (role, claims) = match scope {
            Scope::User(user_id) => (AUTHENTICATED_ROLE, json!({ "sub": user_id, "role": AUTHENTICATED_ROLE })),
            Scope::Service => (SERVICE_ROLE, json!({ "role": SERVICE_ROLE })),
        };

        // Role names are constants above, never caller input
        sqlx::query(&format!("SET LOCAL ROLE {}", role))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        sqlx::query("SELECT set_config('request.jwt.claims', $1, true)")
            .bind(claims.to_string())
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        Ok(tx)
    }
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn rpc(&self, scope: &Scope, name: &str, params: Value) -> Result<Value, DataStoreError> {
        if !is_valid_procedure_name(name) {
            return Err(DataStoreError::QueryError(format!("Invalid procedure name: {}", name)));
        }
        let params = match params {
            Value::Null => json!({}),
            Value::Object(_) => params,
            _ => return Err(DataStoreError::QueryError("RPC parameters must be an object".to_string())),
        };

        let mut tx = self.begin_scoped(scope).await?;
        let sql = format!("SELECT public.\"{}\"($1::jsonb) AS result", name);
        debug!("rpc {} as {:?}", name, scope);

        let row = sqlx::query(&sql)
            .bind(params)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;
        let result: Option<Value> = row.try_get("result").map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        Ok(result.unwrap_or(Value::Null))
    }

    async fn fetch(&self, scope: &Scope, query: &CollectionQuery) -> Result<Vec<Record>, DataStoreError> {
        let sql_result = query
            .to_sql()
            .map_err(|e| DataStoreError::QueryError(e.to_string()))?;

        let mut tx = self.begin_scoped(scope).await?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let rows = q.fetch_all(&mut *tx).await.map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        rows.into_iter()
            .map(|row| {
                let record: Value = row.try_get("record").map_err(classify)?;
                match record {
                    Value::Object(map) => Ok(map),
                    other => Err(DataStoreError::QueryError(format!("Expected row object, got {}", other))),
                }
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), DataStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(classify)?;
        Ok(())
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

/// Sort driver errors into what callers may see. SQLSTATE codes follow Postgres.
fn classify(err: sqlx::Error) -> DataStoreError {
    match err {
        sqlx::Error::RowNotFound => DataStoreError::NotFound("Record not found".to_string()),
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some("23505") => DataStoreError::Conflict(message),
                Some("42501") => DataStoreError::PermissionDenied(message),
                Some("P0002") => DataStoreError::NotFound(message),
                Some("P0001") | Some("22P02") | Some("23502") | Some("23503") | Some("23514") => {
                    DataStoreError::Rejected(message)
                }
                _ => DataStoreError::QueryError(message),
            }
        }
        sqlx::Error::Io(e) => DataStoreError::Unavailable(e.to_string()),
        sqlx::Error::PoolTimedOut => DataStoreError::Unavailable("connection pool timed out".to_string()),
        sqlx::Error::PoolClosed => DataStoreError::Unavailable("connection pool closed".to_string()),
        other => DataStoreError::Sqlx(other),
    }
}

fn is_valid_procedure_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    }
}
