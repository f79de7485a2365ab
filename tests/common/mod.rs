#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use lifeos_api::auth::{
    encode_session_token, hash_agent_token, AuthError, Claims, GoTrueSessionProvider, RpcAgentVerifier, Session,
    SessionIdentity, SessionProvider, SessionUser,
};
use lifeos_api::collections::COLLECTIONS;
use lifeos_api::config::AppConfig;
use lifeos_api::database::{DataStore, DataStoreError, Scope};
use lifeos_api::filter::{value_as_text, CollectionQuery, Condition, Record, SortDirection};
use lifeos_api::services::{ChatCompletion, ChatRequest, LlmError, LlmGateway, ObjectStorage, StorageError};
use lifeos_api::{router, AppState};

pub const TEST_SECRET: &str = "test-jwt-secret-for-integration-tests";

pub const TENANT: &str = "t-1";
pub const OTHER_TENANT: &str = "t-2";

pub const ADMIN_USER: &str = "u-admin";
pub const MEMBER_USER: &str = "u-member";
pub const NEW_USER: &str = "u-new";

pub const AGENT_TOKEN: &str = "agent-token-1";
pub const AGENT_ID: &str = "a-1";
pub const ORPHAN_AGENT_TOKEN: &str = "agent-token-orphan";

pub const GOOD_CODE: &str = "good-code";

/// Ids are zero-padded so they sort like the numbers they encode
pub fn task_id(n: u32) -> String {
    format!("00000000-0000-4000-8000-{:012}", n)
}

/// Tasks 1..=25 in `TENANT`; 3, 7 and 15 mention "foo"
pub fn seed_tasks() -> Vec<Record> {
    let statuses = ["open", "done", "blocked"];
    let mut rows: Vec<Record> = (1..=25u32)
        .map(|n| {
            let title = if [3, 7, 15].contains(&n) { format!("Fix FOO widget {}", n) } else { format!("Task {}", n) };
            let description = if n % 5 == 0 { Value::Null } else { json!(format!("details for {}", n)) };
            let assignee = if n % 2 == 0 { json!(MEMBER_USER) } else { Value::Null };
            record(json!({
                "id": task_id(n),
                "tenant_id": TENANT,
                "title": title,
                "description": description,
                "status": statuses[(n as usize) % 3],
                "priority": n % 3,
                "assignee_id": assignee,
                "created_at": format!("2024-01-{:02}T09:00:00Z", n),
            }))
        })
        .collect();

    for n in 26..=27u32 {
        rows.push(record(json!({
            "id": task_id(n),
            "tenant_id": OTHER_TENANT,
            "title": format!("foo elsewhere {}", n),
            "status": "open",
            "priority": 1,
            "created_at": format!("2024-01-{:02}T09:00:00Z", n),
        })));
    }
    rows
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture is not an object: {}", other),
    }
}

pub fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("id").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect()
}

pub fn ids_of(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|r| r["id"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// In-memory stand-in for the managed database: interprets collection
/// queries on its own and serves the handful of procedures the API calls.
#[derive(Default)]
pub struct MemoryStore {
    pub tables: Mutex<HashMap<String, Vec<Record>>>,
    pub tenants: Mutex<HashMap<String, String>>,
    pub roles: Mutex<HashMap<String, String>>,
    pub agents: Mutex<HashMap<String, Value>>,
    pub calls: Mutex<Vec<(Scope, String, Value)>>,
}

impl MemoryStore {
    pub fn seeded() -> Self {
        let store = Self::default();
        store.tables.lock().unwrap().insert("tasks".to_string(), seed_tasks());

        let mut tenants = store.tenants.lock().unwrap();
        tenants.insert(ADMIN_USER.to_string(), TENANT.to_string());
        tenants.insert(MEMBER_USER.to_string(), TENANT.to_string());
        drop(tenants);

        let mut roles = store.roles.lock().unwrap();
        roles.insert(ADMIN_USER.to_string(), "admin".to_string());
        roles.insert(MEMBER_USER.to_string(), "member".to_string());
        drop(roles);

        let mut agents = store.agents.lock().unwrap();
        agents.insert(hash_agent_token(AGENT_TOKEN), json!({ "agent_id": AGENT_ID, "tenant_id": TENANT }));
        agents.insert(hash_agent_token(ORPHAN_AGENT_TOKEN), json!({ "agent_id": "a-orphan", "tenant_id": null }));
        drop(agents);

        store
    }

    pub fn calls_to(&self, name: &str) -> Vec<(Scope, Value)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, n, _)| n == name)
            .map(|(scope, _, params)| (scope.clone(), params.clone()))
            .collect()
    }

    /// Rows of a tenant in list order (newest first, id as tiebreak)
    pub fn tenant_rows(&self, table: &str, tenant_id: &str) -> Vec<Record> {
        let mut rows: Vec<Record> = self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.get("tenant_id").and_then(Value::as_str) == Some(tenant_id))
            .collect();
        rows.sort_by(|a, b| {
            text(b, "created_at")
                .cmp(&text(a, "created_at"))
                .then_with(|| text(b, "id").cmp(&text(a, "id")))
        });
        rows
    }

    fn user_of(scope: &Scope) -> Option<&str> {
        match scope {
            Scope::User(id) => Some(id.as_str()),
            Scope::Service => None,
        }
    }
}

fn text(record: &Record, column: &str) -> String {
    record
        .get(column)
        .and_then(value_as_text)
        .map(|t| t.into_owned())
        .unwrap_or_default()
}

/// Applies conditions with the same text rules as the in-memory filters
/// (`value_as_text`, lowercase contains). The SQL rendering of those rules
/// (`::text`, `ILIKE`) is pinned separately in the query builder's unit tests.
fn matches(record: &Record, condition: &Condition) -> bool {
    match condition {
        Condition::AnyContains { columns, needle } => {
            let needle = needle.to_lowercase();
            columns.iter().any(|c| match record.get(c) {
                Some(Value::String(s)) => s.to_lowercase().contains(&needle),
                _ => false,
            })
        }
        Condition::Eq { column, value } => record.get(column).and_then(value_as_text).as_deref() == Some(value.as_str()),
        Condition::In { column, values } => record
            .get(column)
            .and_then(value_as_text)
            .map(|t| values.iter().any(|v| v.as_str() == &*t))
            .unwrap_or(false),
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn rpc(&self, scope: &Scope, name: &str, params: Value) -> Result<Value, DataStoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((scope.clone(), name.to_string(), params.clone()));

        match name {
            "get_my_tenant_id" => Ok(Self::user_of(scope)
                .and_then(|u| self.tenants.lock().unwrap().get(u).cloned())
                .map(Value::String)
                .unwrap_or(Value::Null)),
            "get_my_role" => Ok(Self::user_of(scope)
                .and_then(|u| self.roles.lock().unwrap().get(u).cloned())
                .map(Value::String)
                .unwrap_or(Value::Null)),
            "verify_agent_token" => {
                let hash = params["p_token_hash"].as_str().unwrap_or_default();
                Ok(match self.agents.lock().unwrap().get(hash) {
                    Some(agent) => json!([agent]),
                    None => json!([]),
                })
            }
            "list_workspace_members" => Ok(json!([
                { "user_id": ADMIN_USER, "role": "admin" },
                { "user_id": MEMBER_USER, "role": "member" },
            ])),
            "soft_delete_record" | "restore_record" => Ok(json!({
                "table": params["p_table"],
                "id": params["p_id"],
                "deleted": name == "soft_delete_record",
            })),
            other => {
                let spec = COLLECTIONS
                    .iter()
                    .find(|c| c.agent_list_rpc == other)
                    .ok_or_else(|| DataStoreError::NotFound(format!("procedure {}", other)))?;
                let tenant_id = params["p_tenant_id"].as_str().unwrap_or_default();
                let limit = params["p_limit"].as_u64().unwrap_or(u64::MAX) as usize;
                let rows: Vec<Value> = self
                    .tenant_rows(spec.table, tenant_id)
                    .into_iter()
                    .take(limit)
                    .map(Value::Object)
                    .collect();
                Ok(Value::Array(rows))
            }
        }
    }

    async fn fetch(&self, _scope: &Scope, query: &CollectionQuery) -> Result<Vec<Record>, DataStoreError> {
        let mut rows: Vec<Record> = self
            .tables
            .lock()
            .unwrap()
            .get(query.table())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|r| query.conditions().iter().all(|c| matches(r, c)))
            .collect();

        rows.sort_by(|a, b| {
            query.order().iter().fold(Ordering::Equal, |acc, order| {
                acc.then_with(|| {
                    let cmp = text(a, &order.column).cmp(&text(b, &order.column));
                    match order.sort {
                        SortDirection::Asc => cmp,
                        SortDirection::Desc => cmp.reverse(),
                    }
                })
            })
        });

        Ok(match query.range() {
            Some(range) => rows.into_iter().skip(range.start).take(range.end - range.start).collect(),
            None => rows,
        })
    }

    async fn ping(&self) -> Result<(), DataStoreError> {
        Ok(())
    }
}

/// Real JWT validation; code exchange accepts `GOOD_CODE` only
pub struct FakeSessions {
    inner: GoTrueSessionProvider,
}

#[async_trait]
impl SessionProvider for FakeSessions {
    async fn identity_from_session(&self, token: &str) -> Result<SessionIdentity, AuthError> {
        self.inner.identity_from_session(token).await
    }

    async fn exchange_code(&self, code: &str, _code_verifier: Option<&str>) -> Result<Session, AuthError> {
        if code != GOOD_CODE {
            return Err(AuthError::CodeExchange("authorization code is invalid or expired".to_string()));
        }
        Ok(Session {
            access_token: mint_session(MEMBER_USER),
            refresh_token: Some("refresh".to_string()),
            expires_in: Some(3600),
            user: SessionUser { id: MEMBER_USER.to_string(), email: None },
        })
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<(String, usize, String)>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), bytes.len(), content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(format!("https://files.test/uploads/{}", path))
    }
}

#[derive(Default)]
pub struct FakeLlm {
    pub requests: Mutex<Vec<ChatRequest>>,
}

#[async_trait]
impl LlmGateway for FakeLlm {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError> {
        let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let model = request.model.clone().unwrap_or_else(|| "fake-model".to_string());
        self.requests.lock().unwrap().push(request);
        Ok(ChatCompletion { content: format!("echo: {}", prompt), model })
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::from_env();
    config.auth.jwt_secret = TEST_SECRET.to_string();
    config.auth.session_cookie = "sb-access-token".to_string();
    config.auth.sign_in_route = "/login".to_string();
    config.auth.onboarding_route = "/onboarding".to_string();
    config.auth.home_route = "/app".to_string();
    config.rate_limit = Default::default();
    config.list = Default::default();
    config
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<FakeStorage>,
    pub llm: Arc<FakeLlm>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = test_config();
        customize(&mut config);

        let store = Arc::new(MemoryStore::seeded());
        let storage = Arc::new(FakeStorage::default());
        let llm = Arc::new(FakeLlm::default());
        let sessions = Arc::new(FakeSessions { inner: GoTrueSessionProvider::new(&config.auth) });
        let agents = Arc::new(RpcAgentVerifier::new(store.clone()));

        let state = AppState::new(config, sessions, agents, store.clone(), storage.clone(), llm.clone());
        Self { state, store, storage, llm }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        send(self.router(), request).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Result<TestResponse> {
    let response = app.oneshot(request).await.context("router failed")?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Ok(TestResponse { status, headers, body })
}

pub fn mint_session(user_id: &str) -> String {
    let claims = Claims::new(user_id, Some(format!("{}@example.com", user_id)), chrono::Duration::hours(1));
    encode_session_token(&claims, TEST_SECRET).expect("failed to mint session token")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

pub fn as_human(user_id: &str, builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::COOKIE, format!("theme=dark; sb-access-token={}", mint_session(user_id)))
}

pub fn as_agent(token: &str, builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
}

pub fn human_get(user_id: &str, uri: &str) -> Request<Body> {
    as_human(user_id, Request::get(uri)).body(Body::empty()).expect("request")
}

pub fn agent_get(token: &str, uri: &str) -> Request<Body> {
    as_agent(token, Request::get(uri)).body(Body::empty()).expect("request")
}
