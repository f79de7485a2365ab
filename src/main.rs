use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lifeos_api::{config::AppConfig, router, AppState};

#[derive(Parser)]
#[command(name = "lifeos-api")]
#[command(about = "LifeOS API server")]
#[command(version)]
struct Args {
    #[arg(long, env = "BIND_ADDRESS", help = "Address to bind (overrides configuration)")]
    bind: Option<String>,

    #[arg(long, help = "Port to listen on (overrides configuration)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up DATABASE_URL, AUTH_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lifeos_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let mut config: AppConfig = lifeos_api::config::config().clone();
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    tracing::info!("Starting LifeOS API in {:?} mode", config.environment);
    if config.is_production() && config.auth.jwt_secret.is_empty() {
        anyhow::bail!("AUTH_JWT_SECRET must be set in production");
    }

    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("LifeOS API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
