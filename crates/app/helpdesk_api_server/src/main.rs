//! Helpdesk authentication API server binary.
//!
//! Prints `{"port": N}` to stdout once bound; logs go to stderr.

use std::sync::Arc;

use clap::Parser;
use helpdesk_api::AppState;
use helpdesk_api::config::ApiConfig;
use helpdesk_core::auth::directory::StaticDirectory;
use helpdesk_core::auth::password::hash_secret;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "helpdesk_api_server", about = "Helpdesk authentication API server")]
struct Args {
    /// Port to listen on on 127.0.0.1 (0 = ephemeral). Overrides `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL. Without it accounts and refresh tokens are
    /// kept in memory.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Print the bcrypt hash of SECRET (for a static directory file) and exit.
    #[arg(long, value_name = "SECRET")]
    hash_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Some(secret) = args.hash_secret.as_deref() {
        println!("{}", hash_secret(secret)?);
        return Ok(());
    }

    // Write logs to stderr so stdout is reserved for the JSON port message.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,helpdesk_api=debug,helpdesk_core=debug")
            }),
        )
        .init();

    let mut config = ApiConfig::from_env();
    if let Some(port) = args.port {
        config.bind_addr = format!("127.0.0.1:{port}");
    }
    if args.database_url.is_some() {
        config.database_url = args.database_url.clone();
    }
    info!(?config, "starting helpdesk_api_server");

    let directory = Arc::new(StaticDirectory::from_config(config.directory.clone())?);

    let state = match config.database_url.clone() {
        Some(url) => {
            info!(max_connections = args.max_connections, "configuring connection pool");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(std::time::Duration::from_secs(30))
                .connect(&url)
                .await?;

            info!("running database migrations");
            helpdesk_api::migrate(&pool).await?;
            AppState::postgres(config.clone(), pool, directory)
        }
        None => {
            warn!("DATABASE_URL not set; sessions and accounts are lost on restart");
            AppState::in_memory(config.clone(), directory)
        }
    };

    let app = helpdesk_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    println!("{}", serde_json::json!({ "port": local_addr.port() }));
    info!(addr = %local_addr, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}
