use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use anuario_api::config::AppConfig;
use anuario_api::{app, AppState};

#[derive(Parser)]
#[command(name = "anuario-api")]
#[command(about = "Anuario API - yearbook backend")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides PORT / ANUARIO_API_PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Collaborator backend: firebase or memory (overrides ANUARIO_BACKEND)")]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, API_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("anuario_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    // Command-line flags win over the environment and go through the same validation
    let config = if args.port.is_none() && args.backend.is_none() {
        AppConfig::from_env()
    } else {
        AppConfig::from_lookup(|key| match key {
            "ANUARIO_API_PORT" if args.port.is_some() => args.port.map(|p| p.to_string()),
            "ANUARIO_BACKEND" if args.backend.is_some() => args.backend.clone(),
            _ => std::env::var(key).ok(),
        })
    }
    .context("invalid configuration")?;
    tracing::info!("Starting Anuario API in {:?} mode", config.environment);

    let port = config.server.port;
    let state = AppState::from_config(config).context("failed to initialise collaborators")?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Anuario API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
