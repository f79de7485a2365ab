pub mod agent;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::database::DataStoreError;

pub use agent::{AgentIdentity, AgentVerifier, RpcAgentVerifier};

/// Audience the auth provider stamps on session access tokens
pub const SESSION_AUDIENCE: &str = "authenticated";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredential,

    #[error("{0}")]
    MalformedHeader(String),

    #[error("Invalid session: {0}")]
    InvalidToken(String),

    #[error("Invalid agent token")]
    UnknownAgent,

    #[error("{0}")]
    CodeExchange(String),

    #[error("Auth provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Auth provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Lookup(#[from] DataStoreError),
}

/// Claims carried by an interactive session access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, email: Option<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            email,
            role: Some(SESSION_AUDIENCE.to_string()),
            aud: SESSION_AUDIENCE.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Who an interactive session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub user_id: String,
    pub email: Option<String>,
}

/// Result of exchanging an authorization code
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: SessionUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Validate a session access token and return its owner
    async fn identity_from_session(&self, token: &str) -> Result<SessionIdentity, AuthError>;

    /// Exchange an authorization code (PKCE) for a session
    async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<Session, AuthError>;
}

/// Session provider for a GoTrue-compatible auth service.
/// Access tokens are verified locally (HS256); code exchange goes over HTTP.
pub struct GoTrueSessionProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    decoding_key: Option<DecodingKey>,
}

impl GoTrueSessionProvider {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding_key = if config.jwt_secret.is_empty() {
            None
        } else {
            Some(DecodingKey::from_secret(config.jwt_secret.as_bytes()))
        };

        Self {
            http: reqwest::Client::new(),
            base_url: config.provider_url.clone(),
            api_key: config.provider_api_key.clone(),
            decoding_key,
        }
    }
}

#[async_trait]
impl SessionProvider for GoTrueSessionProvider {
    async fn identity_from_session(&self, token: &str) -> Result<SessionIdentity, AuthError> {
        let key = self
            .decoding_key
            .as_ref()
            .ok_or(AuthError::NotConfigured("AUTH_JWT_SECRET"))?;
        let claims = decode_session_token(token, key)?;
        Ok(SessionIdentity {
            user_id: claims.sub,
            email: claims.email,
        })
    }

    async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<Session, AuthError> {
        if self.api_key.is_empty() {
            return Err(AuthError::NotConfigured("AUTH_API_KEY"));
        }

        let response = self
            .http
            .post(format!("{}/token?grant_type=pkce", self.base_url))
            .header("apikey", &self.api_key)
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier }))
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Code exchange rejected ({}): {}", status, body);
            return Err(AuthError::CodeExchange("authorization code is invalid or expired".to_string()));
        }
        if !status.is_success() {
            return Err(AuthError::Provider(format!("token endpoint returned {}", status)));
        }

        response
            .json::<Session>()
            .await
            .map_err(|e| AuthError::Provider(format!("unreadable session: {}", e)))
    }
}

pub fn decode_session_token(token: &str, key: &DecodingKey) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[SESSION_AUDIENCE]);

    let token_data = decode::<Claims>(token, key, &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AuthError::InvalidToken("token has no subject".to_string()));
    }
    Ok(token_data.claims)
}

pub fn encode_session_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::NotConfigured("AUTH_JWT_SECRET"));
    }
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Agent tokens are only ever compared by digest
pub fn hash_agent_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Bearer token from the `Authorization` header.
///
/// `Ok(None)` when the header is absent. A present header that is not a
/// non-empty Bearer credential is an error rather than a silent fallback to
/// the session cookie.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("Invalid Authorization header format".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::MalformedHeader("Authorization header must use Bearer token format".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader(
            "Authorization header must use Bearer token format".to_string(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader("Bearer token is empty".to_string()));
    }

    Ok(Some(token.to_string()))
}

/// Value of a named cookie from the `Cookie` header(s)
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_absent_is_none() {
        assert!(extract_bearer_token(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn bearer_token_is_extracted() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer abc.def")]);
        assert_eq!(extract_bearer_token(&map).unwrap().as_deref(), Some("abc.def"));

        let map = headers(&[(header::AUTHORIZATION, "bearer  xyz ")]);
        assert_eq!(extract_bearer_token(&map).unwrap().as_deref(), Some("xyz"));
    }

    #[test]
    fn malformed_authorization_is_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer ", "Bearer", "token"] {
            let map = headers(&[(header::AUTHORIZATION, value)]);
            assert!(
                matches!(extract_bearer_token(&map), Err(AuthError::MalformedHeader(_))),
                "value {:?}",
                value
            );
        }
    }

    #[test]
    fn reads_named_cookie() {
        let map = headers(&[
            (header::COOKIE, "theme=dark; sb-access-token=tok123"),
            (header::COOKIE, "other=1"),
        ]);
        assert_eq!(read_cookie(&map, "sb-access-token").as_deref(), Some("tok123"));
        assert_eq!(read_cookie(&map, "other").as_deref(), Some("1"));
        assert_eq!(read_cookie(&map, "missing"), None);
    }

    #[test]
    fn session_token_round_trip_and_expiry() {
        let secret = "test-secret";
        let key = DecodingKey::from_secret(secret.as_bytes());

        let claims = Claims::new("user-1", Some("a@example.com".to_string()), Duration::hours(1));
        let token = encode_session_token(&claims, secret).unwrap();
        let decoded = decode_session_token(&token, &key).unwrap();
        assert_eq!(decoded.sub, "user-1");

        let expired = Claims::new("user-1", None, Duration::hours(-2));
        let token = encode_session_token(&expired, secret).unwrap();
        assert!(matches!(decode_session_token(&token, &key), Err(AuthError::InvalidToken(_))));

        let wrong_key = DecodingKey::from_secret(b"other");
        let token = encode_session_token(&claims, secret).unwrap();
        assert!(decode_session_token(&token, &wrong_key).is_err());
    }

    #[test]
    fn agent_token_hash_is_stable_hex() {
        let hash = hash_agent_token("agent-token");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_agent_token("agent-token"));
        assert_ne!(hash, hash_agent_token("agent-token2"));
    }
}
