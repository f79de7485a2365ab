// handlers/pages.rs - Page routes
//
// Browser-facing routes use the redirecting guards: anonymous visitors go to
// sign-in, non-admins go home, humans without a workspace go to onboarding.
// The HTML itself is a bare shell for the front end to mount into.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::error;

use crate::middleware::{actor::lookup_tenant, PageAdmin, PageUser};
use crate::state::AppState;

/// GET /app - Workspace shell for any signed-in human with a workspace
pub async fn app_page(State(state): State<AppState>, PageUser(user): PageUser) -> Response {
    let routes = &state.config.auth;
    match lookup_tenant(&user.data_client).await {
        Ok(Some(tenant_id)) => Html(shell("app", &tenant_id)).into_response(),
        Ok(None) => Redirect::to(&routes.onboarding_route).into_response(),
        Err(e) => {
            error!("Tenant lookup failed for {}: {}", user.identity.user_id, e);
            Redirect::to(&format!("{}?error=unavailable", routes.sign_in_route)).into_response()
        }
    }
}

/// GET /admin - Workspace settings shell, admins only
pub async fn admin_page(PageAdmin(admin): PageAdmin) -> Html<String> {
    Html(shell("admin", admin.role.as_str()))
}

fn shell(view: &str, context: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>LifeOS</title></head>\n\
         <body><div id=\"root\" data-view=\"{}\" data-context=\"{}\"></div></body>\n</html>\n",
        escape_attr(view),
        escape_attr(context)
    )
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
