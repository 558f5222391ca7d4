//! Signature Packet Server
//!
//! Turns a set of uploaded transaction documents into print-ready signature
//! packets. Provides REST endpoints for:
//!
//! - Document upload and processing status
//! - Review edits to extracted signature records
//! - Grouping views (by agreement, counterparty or signatory)
//! - Packet export
//!
//! ## Architecture
//!
//! All state lives in a single in-memory `Workspace` from `sigpacket-core`.
//! Signature blocks are read by an OpenAI-compatible vision endpoint; pages
//! are sent to it as standalone one-page PDFs.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sigpacket_core::{
    DocumentPipeline, LopdfTextExtractor, PipelineConfig, SnapshotRasterizer, Workspace,
};

mod api;
mod error;
mod oracle;

use api::{
    handle_edit_record, handle_export, handle_get_document, handle_groups, handle_health,
    handle_list_documents, handle_remove_document, handle_remove_record, handle_upload,
};
use oracle::{HttpOracle, OracleSettings};

/// Command-line arguments for the signature packet server
#[derive(Parser, Debug)]
#[command(name = "sigpacket-server")]
#[command(about = "Signature packet server for transaction closings")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SIGPACKET_PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "SIGPACKET_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Base URL of the OpenAI-compatible extraction endpoint
    #[arg(long, env = "SIGPACKET_ORACLE_URL", default_value = "https://api.openai.com/v1")]
    oracle_url: String,

    /// Vision model used to read signature blocks
    #[arg(long, env = "SIGPACKET_ORACLE_MODEL", default_value = "gpt-4o-mini")]
    oracle_model: String,

    /// API key for the extraction endpoint
    #[arg(long, env = "SIGPACKET_ORACLE_API_KEY", hide_env_values = true)]
    oracle_api_key: Option<String>,

    /// Per-page extraction timeout in seconds
    #[arg(long, env = "SIGPACKET_ORACLE_TIMEOUT_SECS", default_value = "60")]
    oracle_timeout_secs: u64,

    /// Maximum request body size in megabytes
    #[arg(long, env = "SIGPACKET_MAX_UPLOAD_MB", default_value = "64")]
    max_upload_mb: usize,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "SIGPACKET_RATE_LIMIT", default_value = "20")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long, env = "SIGPACKET_VERBOSE")]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub workspace: Workspace,
}

/// Routes and request-scoped middleware, without connection-level layers
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Documents
        .route("/api/documents", post(handle_upload).get(handle_list_documents))
        .route(
            "/api/documents/:id",
            get(handle_get_document).delete(handle_remove_document),
        )
        // Records
        .route(
            "/api/records/:id",
            patch(handle_edit_record).delete(handle_remove_record),
        )
        // Grouping and export
        .route("/api/groups", get(handle_groups))
        .route("/api/export", post(handle_export))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting signature packet server on {}:{}", args.host, args.port);

    if args.oracle_api_key.is_none() {
        warn!("No oracle API key configured; every signature page will get a placeholder record");
    }

    let oracle_timeout = Duration::from_secs(args.oracle_timeout_secs);
    let oracle = HttpOracle::new(OracleSettings {
        base_url: args.oracle_url.clone(),
        model: args.oracle_model.clone(),
        api_key: args.oracle_api_key.clone(),
        // The pipeline enforces the same bound; give the transport a little slack
        timeout: oracle_timeout + Duration::from_secs(5),
    })?;

    let pipeline = DocumentPipeline::new(
        PipelineConfig::default().with_oracle_timeout(oracle_timeout),
        Arc::new(LopdfTextExtractor),
        Arc::new(SnapshotRasterizer),
        Arc::new(oracle),
    );

    // Create shared state
    let state = AppState {
        workspace: Workspace::new(pipeline),
    };

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit: {}", args.rate_limit))?,
    );

    let app = build_router(state, args.max_upload_mb * 1024 * 1024).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Oracle: {} ({})", args.oracle_url, args.oracle_model);
    info!("Oracle timeout: {}s", args.oracle_timeout_secs);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);

    // The rate limiter keys on the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
