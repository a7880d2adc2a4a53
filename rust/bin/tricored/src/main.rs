//! `tricored`: the tricore identity server binary.
//!
//! Usage:
//!   tricored -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/tricore/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use tricore_auth::service::OidcProvider;
use tricore_auth::AuthModule;

use config::ServerConfig;

/// Tricore identity server.
#[derive(Parser, Debug)]
#[command(name = "tricored", about = "Tricore identity server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    // Verify configuration is valid.
    bootstrap::verify_config(&server_config)?;

    // Initialize storage.
    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = tricore_core::ServiceConfig {
        data_dir: Some(data_dir),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    let sql: Arc<dyn tricore_sql::SQLStore> = Arc::new(
        tricore_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    // Identity provider + auth module.
    let provider = OidcProvider::new(server_config.provider_config());
    info!(provider = %provider.config().id, "Identity provider configured");

    let auth_module = AuthModule::new(sql, Arc::new(provider), server_config.auth_config())?;
    info!("Auth module initialized");

    // Bootstrap: seed groups, drop stale sessions.
    bootstrap::ensure_groups(auth_module.service(), &server_config.bootstrap.groups)?;
    bootstrap::purge_sessions(auth_module.service())?;

    // Build router.
    let app = routes::build_router(&[&auth_module]);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("tricore server listening on {}", core_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
