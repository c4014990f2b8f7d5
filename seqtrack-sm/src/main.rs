//! seqtrack-sm (Sample Management) - sample tracking service
//!
//! Serves the sample and processing step API over a SQLite database in the
//! root folder, and streams tracker events over SSE.

use anyhow::Result;
use clap::Parser;
use seqtrack_common::config::{RootFolderInitializer, RootFolderResolver};
use seqtrack_common::events::EventBus;
use seqtrack_common::logging::init_tracing;
use seqtrack_sm::{build_router, AppState, EVENT_BUS_CAPACITY};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "seqtrack-sm")]
#[command(about = "Sample Management service for SeqTrack")]
#[command(version)]
struct Args {
    /// Root folder holding seqtrack.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides [service] port)
    #[arg(short, long, env = "SEQTRACK_SM_PORT")]
    port: Option<u16>,

    /// Host to bind (overrides [service] host)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = RootFolderResolver::new("sample-manager").with_cli_arg(args.root_folder);
    let mut config = resolver.load_config();

    init_tracing(&config.logging)?;

    info!(
        "Starting SeqTrack Sample Management (seqtrack-sm) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolver.resolve_with(&config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let pool = match seqtrack_sm::db::init_database_pool(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e);
        }
    };

    if let Some(port) = args.port {
        config.service.port = port;
    }
    if let Some(host) = args.host {
        config.service.host = host;
    }

    let state = AppState::new(
        pool,
        EventBus::new(EVENT_BUS_CAPACITY),
        config.bulk.effective_concurrency(),
    );
    let app = build_router(state);

    let addr = config.service.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return Err(e.into());
        }
    };
    info!("seqtrack-sm listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
