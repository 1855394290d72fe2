use anyhow::{Context, Result};
use axum::{Router, http::HeaderValue, routing::get};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod client;
mod config;
mod db;
mod handlers;
mod identity;
mod metrics;
mod models;
mod registry;
mod relay;
mod repository;
mod ws;

use crate::client::{RelayAddr, RelayError};
use crate::config::{AuthConfig, FileConfig, ServerConfig, ShoalConfig};
use crate::db::Database;
use crate::identity::Verifier;
use crate::metrics::ServerMetrics;
use crate::relay::Relay;
use crate::repository::MessageRepository;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "shoal")]
#[command(about = "Minimal realtime group chat: one relay, one room")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom data directory (defaults to ~/.shoal)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server in the foreground
    Serve(ServeArgs),

    /// Join the room from the terminal
    Join(JoinArgs),

    /// Print the message history and exit
    History(HistoryArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Port to listen on (overrides config.toml)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config.toml)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct JoinArgs {
    /// Display name to chat under
    user: String,

    /// Relay host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Relay port
    #[arg(short, long, default_value_t = config::default_port())]
    port: u16,

    /// Shared token, for relays that require one
    #[arg(long)]
    token: Option<String>,
}

#[derive(Parser)]
struct HistoryArgs {
    /// Relay host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Relay port
    #[arg(short, long, default_value_t = config::default_port())]
    port: u16,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub relay: Arc<Relay>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
    /// Server runtime configuration
    pub server_config: Arc<ServerConfig>,
    /// Connect-time identity gate
    pub verifier: Arc<dyn Verifier>,
    pub db: Arc<Database>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_server(args, cli.data_dir).await,
        Commands::Join(args) => {
            let addr = RelayAddr {
                host: args.host,
                port: args.port,
            };
            run_client(client::join(&addr, &args.user, args.token.as_deref()).await, &addr)
        }
        Commands::History(args) => {
            let addr = RelayAddr {
                host: args.host,
                port: args.port,
            };
            run_client(client::history_command(&addr, args.json).await, &addr)
        }
    }
}

fn run_client(result: Result<(), RelayError>, addr: &RelayAddr) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(RelayError::Unavailable) => {
            eprintln!(
                "shoal: no relay at {}:{} (start one with `shoal serve`)",
                addr.host, addr.port
            );
            std::process::exit(1);
        }
        Err(RelayError::Other(e)) => Err(e),
    }
}

async fn run_server(args: ServeArgs, data_dir: Option<PathBuf>) -> Result<()> {
    // Setup logging
    let default_directive = if args.debug {
        "shoal=debug,tower_http=debug,info"
    } else {
        "shoal=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting Shoal relay");

    let config = ShoalConfig::new(data_dir)?;

    let file_config: FileConfig = config::load_config(&config.data_dir)
        .extract()
        .context("Invalid configuration")?;

    // CLI flags win over config.toml, which wins over the defaults
    let host = args
        .host
        .or(file_config.server.host.clone())
        .unwrap_or_else(config::default_host);
    let port = args
        .port
        .or(file_config.server.port)
        .unwrap_or_else(config::default_port);

    // Initialize database
    info!("Initializing database...");
    let db = Arc::new(Database::new(&config).await?);

    let repository = MessageRepository::new(db.pool.clone());
    let metrics = Arc::new(ServerMetrics::new());
    let relay = Arc::new(Relay::new(repository, metrics.clone()));

    let server_config = Arc::new(ServerConfig::from_file(&file_config));
    let auth_config = AuthConfig::from_file(&file_config.auth);
    if auth_config.required {
        if auth_config.token.is_some() {
            info!("Connect-time token check ENABLED");
        } else {
            warn!("auth.required is set but no token is configured; accepting all connections");
        }
    } else {
        info!("Identity gating disabled (asserted names are trusted)");
    }
    let verifier = identity::verifier_from_config(&auth_config);

    let app_state = AppState {
        relay,
        metrics,
        server_config: server_config.clone(),
        verifier,
        db: db.clone(),
    };

    // One allowed browser origin, with credentials
    let allowed_origin = server_config
        .allowed_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid allowed_origin: {}", server_config.allowed_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([axum::http::Method::GET])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = Router::new()
        .route("/messages", get(handlers::list_messages))
        .route("/ws", get(handlers::websocket_handler))
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(cors)
        .with_state(app_state);

    let addr = format!("{}:{}", host, port).parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Shoal listening on http://{}", actual_addr);
    info!("  GET /messages  - message history (ascending)");
    info!("  GET /ws        - persistent chat channel");
    info!("Allowed origin: {}", server_config.allowed_origin);

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, shutting down...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
