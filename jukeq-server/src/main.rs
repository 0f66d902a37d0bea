//! jukeq-server - restaurant music-request queue service
//!
//! Serves the per-restaurant playback request queue over HTTP: song request
//! creation with per-user quotas, ordered queue listings, status
//! transitions, promote-to-top, cancellation with position reconciliation,
//! and queue stats.

use anyhow::Result;
use clap::Parser;
use jukeq_common::config;
use jukeq_server::{build_router, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "jukeq-server", about = "Restaurant music-request queue service")]
struct Cli {
    /// Root data folder (overrides JUKEQ_ROOT and the config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Bind address
    #[arg(long, default_value = config::DEFAULT_HOST)]
    host: String,

    /// Listen port
    #[arg(long, default_value_t = config::DEFAULT_PORT, env = "JUKEQ_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber before anything that can log
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting JukeQ queue service (jukeq-server) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let cli = Cli::parse();

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref(), "JUKEQ_ROOT");
    config::ensure_root_folder(&root_folder)?;

    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = jukeq_common::db::init_database(&db_path).await?;

    let state = AppState::new(pool);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    info!("jukeq-server listening on http://{}:{}", cli.host, cli.port);
    info!("Health check: http://{}:{}/health", cli.host, cli.port);

    axum::serve(listener, app).await?;

    Ok(())
}
