// HTTP API Error Types
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::AuthError;
use crate::database::DataStoreError;
use crate::filter::FilterError;
use crate::services::llm::LlmError;
use crate::services::storage::StorageError;

/// HTTP API error with appropriate status codes and client-friendly messages.
/// Every handler funnels its failures through this one type.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),
    /// Authenticated human who has not finished onboarding
    NoWorkspace(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 429 Too Many Requests
    TooManyRequests { message: String, retry_after: u64 },

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NoWorkspace(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::TooManyRequests { .. } => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NoWorkspace(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::TooManyRequests { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            ApiError::TooManyRequests { message, retry_after } => {
                json!({
                    "error": true,
                    "message": message,
                    "code": self.error_code(),
                    "retry_after": retry_after
                })
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NoWorkspace(_) => "NO_WORKSPACE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn field_error(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), problem.into());
        ApiError::validation_error("Invalid request", Some(field_errors))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn no_workspace() -> Self {
        ApiError::NoWorkspace("No workspace found. Complete onboarding to continue.".to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn too_many_requests(retry_after: u64) -> Self {
        ApiError::TooManyRequests {
            message: format!("Rate limit exceeded. Retry in {} seconds.", retry_after),
            retry_after,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential
            | AuthError::MalformedHeader(_)
            | AuthError::InvalidToken(_)
            | AuthError::UnknownAgent => ApiError::unauthorized(err.to_string()),
            AuthError::CodeExchange(msg) => ApiError::bad_request(format!("Sign-in failed: {}", msg)),
            AuthError::NotConfigured(what) => {
                tracing::error!("Auth provider not configured: {}", what);
                ApiError::internal_server_error("Authentication is not configured")
            }
            AuthError::Provider(msg) => {
                tracing::error!("Auth provider error: {}", msg);
                ApiError::bad_gateway("Authentication provider unavailable")
            }
            AuthError::Lookup(inner) => inner.into(),
        }
    }
}

impl From<DataStoreError> for ApiError {
    fn from(err: DataStoreError) -> Self {
        match err {
            DataStoreError::NotFound(msg) => ApiError::not_found(msg),
            DataStoreError::Conflict(msg) => ApiError::Conflict(msg),
            DataStoreError::PermissionDenied(msg) => ApiError::forbidden(msg),
            // Raised deliberately by stored procedures; the message is meant for callers
            DataStoreError::Rejected(msg) => ApiError::bad_request(msg),
            DataStoreError::Unavailable(msg) => {
                tracing::error!("Data store unavailable: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DataStoreError::ConfigMissing(what) => {
                tracing::error!("Data store not configured: {}", what);
                ApiError::service_unavailable("Database not configured")
            }
            DataStoreError::QueryError(msg) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DataStoreError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        tracing::error!("Collection query rejected: {}", err);
        ApiError::internal_server_error("Invalid collection query")
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPath(msg) => ApiError::field_error("path", msg),
            StorageError::Rejected { status, message } if status < 500 => {
                ApiError::bad_request(format!("Upload rejected: {}", message))
            }
            other => {
                tracing::error!("Object storage error: {}", other);
                ApiError::bad_gateway("File storage unavailable")
            }
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => ApiError::service_unavailable("Text generation is not configured"),
            LlmError::EmptyCompletion => ApiError::bad_gateway("Text generation returned no content"),
            other => {
                tracing::error!("LLM gateway error: {}", other);
                ApiError::bad_gateway("Text generation failed")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidJson(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.to_json())).into_response();
        if let ApiError::TooManyRequests { retry_after, .. } = &self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status_code(), 401);
        assert_eq!(ApiError::forbidden("x").status_code(), 403);
        assert_eq!(ApiError::no_workspace().status_code(), 403);
        assert_eq!(ApiError::field_error("q", "bad").status_code(), 400);
        assert_eq!(ApiError::too_many_requests(5).status_code(), 429);
        assert_eq!(ApiError::bad_gateway("x").status_code(), 502);
    }

    #[test]
    fn no_workspace_is_distinct_from_forbidden() {
        assert_eq!(ApiError::no_workspace().error_code(), "NO_WORKSPACE");
        assert_eq!(ApiError::forbidden("x").error_code(), "FORBIDDEN");
    }

    #[test]
    fn rate_limit_response_carries_retry_after() {
        let response = ApiError::too_many_requests(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
        assert_eq!(ApiError::too_many_requests(42).to_json()["retry_after"], 42);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err: ApiError = DataStoreError::QueryError("syntax error at or near SELECT".to_string()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("SELECT"));
    }

    #[test]
    fn stored_procedure_rejections_surface_their_message() {
        let err: ApiError = DataStoreError::Rejected("Task title required".to_string()).into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Task title required");
    }
}
