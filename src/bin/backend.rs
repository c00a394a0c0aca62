use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use drama_proxy::{
    api::{self, AppState},
    config::{self, Environment},
    upstream::HttpUpstream,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "drama_proxy=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(author, version, about = "Caching proxy and player host for the drama catalogue.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = config::DEFAULT_CONFIG_PATH, help = "Path to the env file")]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Address to bind (default 0.0.0.0)")]
    host: Option<String>,
    #[arg(long = "port", value_name = "PORT", help = "Port to listen on (default 3000)")]
    port: Option<u16>,
    #[arg(long = "api-url", value_name = "URL", help = "Base URL of the upstream catalogue")]
    api_url: Option<String>,
    #[arg(long = "public-dir", value_name = "PATH", help = "Directory holding the player UI")]
    public_dir: Option<PathBuf>,
    #[arg(long = "env", value_name = "NAME", help = "development or production")]
    env: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = config::load_settings_from(&cli.config, |key| std::env::var(key).ok())
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url.trim_end_matches('/').to_string();
    }
    if let Some(public_dir) = cli.public_dir {
        settings.public_dir = public_dir;
    }
    if let Some(env) = cli.env {
        settings.environment = Environment::parse(&env);
    }

    let upstream = HttpUpstream::new(settings.api_url.clone(), settings.upstream_timeout)
        .context("building upstream client")?;

    let addr = SocketAddr::new(
        settings
            .host
            .parse()
            .with_context(|| format!("parsing host {:?}", settings.host))?,
        settings.port,
    );
    tracing::info!(
        environment = %settings.environment,
        api_url = %settings.api_url,
        public_dir = %settings.public_dir.display(),
        "starting drama proxy"
    );

    let state = AppState::new(settings, Arc::new(upstream));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
