use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{read_cookie, Session};
use crate::config::AuthConfig;
use crate::state::AppState;

/// Cookie holding the PKCE verifier written by the sign-in page
pub const CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
}

/// GET /auth/callback?code=&next= - Finish sign-in
///
/// Exchanges the authorization code for a session, stores the access token in
/// the session cookie and sends the browser on to `next`. Failures land back
/// on the sign-in page with an `error` marker instead of a JSON body.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response {
    let auth = &state.config.auth;

    let Some(code) = query.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
        return Redirect::to(&format!("{}?error=missing_code", auth.sign_in_route)).into_response();
    };

    let verifier = read_cookie(&headers, CODE_VERIFIER_COOKIE);
    let session = match state.sessions.exchange_code(code, verifier.as_deref()).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Authorization code exchange failed: {}", e);
            return Redirect::to(&format!("{}?error=auth_failed", auth.sign_in_route)).into_response();
        }
    };

    info!("User {} signed in", session.user.id);
    let target = safe_next(query.next.as_deref(), &auth.home_route);
    (
        [(header::SET_COOKIE, session_cookie(auth, &session))],
        Redirect::to(&target),
    )
        .into_response()
}

pub fn session_cookie(auth: &AuthConfig, session: &Session) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        auth.session_cookie, session.access_token
    );
    if let Some(max_age) = session.expires_in.filter(|s| *s > 0) {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if auth.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Only same-origin relative paths are followed; anything else goes home
pub fn safe_next(next: Option<&str>, home: &str) -> String {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => home.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionUser;
    use crate::config::AppConfig;

    #[test]
    fn next_must_be_relative() {
        assert_eq!(safe_next(Some("/app/tasks?view=board"), "/app"), "/app/tasks?view=board");
        assert_eq!(safe_next(None, "/app"), "/app");
        assert_eq!(safe_next(Some("https://evil.example"), "/app"), "/app");
        assert_eq!(safe_next(Some("//evil.example"), "/app"), "/app");
        assert_eq!(safe_next(Some("/\\evil.example"), "/app"), "/app");
    }

    #[test]
    fn cookie_flags_follow_config() {
        let mut auth = AppConfig::from_env().auth;
        auth.secure_cookies = true;
        let session = Session {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            user: SessionUser { id: "u1".to_string(), email: None },
        };
        let cookie = session_cookie(&auth, &session);
        assert!(cookie.starts_with(&format!("{}=tok;", auth.session_cookie)));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));
    }
}
