use anyhow::Context;
use tracing_subscriber::EnvFilter;

use divisadero_api::config::AppConfig;
use divisadero_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up SUPABASE_URL and friends.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(environment = ?config.environment, "starting Divisadero API");

    let port = config.port;
    let state = AppState::from_config(config).context("failed to wire application state")?;
    let app = divisadero_api::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server")?;

    Ok(())
}
