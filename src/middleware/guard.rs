//! Narrow guards for human-only endpoints.
//!
//! API variants fail with `ApiError`; page variants fail with a `Redirect`
//! to the sign-in or home route.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Uri},
    response::Redirect,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::actor::authenticate_session;
use crate::auth::SessionIdentity;
use crate::database::{DataClient, DataStoreError, Scope};
use crate::error::ApiError;
use crate::state::AppState;

pub const ROLE_LOOKUP_PROCEDURE: &str = "get_my_role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Superadmin,
}

impl Role {
    /// Unknown or missing roles get the least privilege
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("admin") => Role::Admin,
            Some("superadmin") => Role::Superadmin,
            _ => Role::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

/// A signed-in human
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: SessionIdentity,
    pub data_client: DataClient,
}

/// A signed-in human holding the admin or superadmin role
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: AuthUser,
    pub role: Role,
}

pub async fn require_auth_api(headers: &HeaderMap, state: &AppState) -> Result<AuthUser, ApiError> {
    let identity = authenticate_session(headers, state).await?;
    let data_client = DataClient::new(state.store.clone(), Scope::User(identity.user_id.clone()));
    Ok(AuthUser { identity, data_client })
}

pub async fn require_admin_api(headers: &HeaderMap, state: &AppState) -> Result<AdminUser, ApiError> {
    let user = require_auth_api(headers, state).await?;
    let role = lookup_role(&user.data_client).await?;
    if !role.is_admin() {
        warn!("User {} denied admin access", user.identity.user_id);
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(AdminUser { user, role })
}

/// Page variant of `require_auth_api`: unauthenticated callers go to sign-in
pub async fn require_auth(headers: &HeaderMap, uri: &Uri, state: &AppState) -> Result<AuthUser, Redirect> {
    require_auth_api(headers, state)
        .await
        .map_err(|err| page_redirect(err, uri, state))
}

/// Page variant of `require_admin_api`: non-admins go home, anonymous callers to sign-in
pub async fn require_admin(headers: &HeaderMap, uri: &Uri, state: &AppState) -> Result<AdminUser, Redirect> {
    require_admin_api(headers, state)
        .await
        .map_err(|err| page_redirect(err, uri, state))
}

pub async fn lookup_role(client: &DataClient) -> Result<Role, DataStoreError> {
    let result = client.rpc(ROLE_LOOKUP_PROCEDURE, json!({})).await?;
    let raw = match &result {
        Value::String(s) => Some(s.as_str()),
        Value::Object(row) => row.get("role").and_then(Value::as_str),
        _ => None,
    };
    Ok(Role::parse(raw))
}

fn page_redirect(err: ApiError, uri: &Uri, state: &AppState) -> Redirect {
    let routes = &state.config.auth;
    match err {
        ApiError::Unauthorized(_) => Redirect::to(&sign_in_location(&routes.sign_in_route, uri)),
        ApiError::NoWorkspace(_) => Redirect::to(&routes.onboarding_route),
        ApiError::Forbidden(_) => Redirect::to(&routes.home_route),
        other => {
            error!("Page guard failed: {}", other);
            Redirect::to(&routes.home_route)
        }
    }
}

/// `/login?next=<path>` so sign-in can return to where the user was going
pub fn sign_in_location(sign_in_route: &str, uri: &Uri) -> String {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let next: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{}?next={}", sign_in_route, next)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_auth_api(&parts.headers, state).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_admin_api(&parts.headers, state).await
    }
}

/// `AuthUser` for page routes
#[derive(Debug, Clone)]
pub struct PageUser(pub AuthUser);

/// `AdminUser` for page routes
#[derive(Debug, Clone)]
pub struct PageAdmin(pub AdminUser);

#[async_trait]
impl FromRequestParts<AppState> for PageUser {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_auth(&parts.headers, &parts.uri, state).await.map(PageUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for PageAdmin {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_admin(&parts.headers, &parts.uri, state).await.map(PageAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles() {
        assert_eq!(Role::parse(Some("admin")), Role::Admin);
        assert_eq!(Role::parse(Some(" SuperAdmin ")), Role::Superadmin);
        assert_eq!(Role::parse(Some("member")), Role::Member);
        assert_eq!(Role::parse(Some("owner")), Role::Member);
        assert_eq!(Role::parse(None), Role::Member);
        assert!(Role::Superadmin.is_admin());
        assert!(!Role::Member.is_admin());
    }

    #[test]
    fn sign_in_location_keeps_original_target() {
        let uri: Uri = "/app/tasks?view=board".parse().unwrap();
        assert_eq!(sign_in_location("/login", &uri), "/login?next=%2Fapp%2Ftasks%3Fview%3Dboard");
    }
}
