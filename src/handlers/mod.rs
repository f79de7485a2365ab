// handlers/mod.rs - Handler tiers and the application router
//
// Public (no credential) → Protected (resolved actor, human or agent) →
// Elevated (workspace admin), plus the redirecting page routes.

pub mod elevated;
pub mod pages;
pub mod protected;
pub mod public;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/callback", get(public::auth_callback))
        // Pages
        .route("/app", get(pages::app_page))
        .route("/admin", get(pages::admin_page))
        // API
        .merge(api_routes())
        .merge(admin_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(protected::whoami))
        .route("/api/data/:collection", get(protected::collection_list))
        .route("/api/data/:collection/:id", delete(protected::record_delete))
        .route("/api/data/:collection/:id/restore", post(protected::record_restore))
        .route("/api/files", post(protected::upload))
        .route("/api/ai/complete", post(protected::complete))
}

fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/admin/members", get(elevated::list_members))
}
