pub mod auth;
pub mod collections;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

pub use handlers::router;
pub use state::AppState;
