use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use coach_core::client::{CompletionGatewayRef, OpenAiClient};
use coach_core::config::{CoachConfig, StoreBackend};
use coach_server::catalog::FileCatalog;
use coach_server::conversation::ConversationManager;
use coach_server::http_server::{self, AppState};
use coach_server::session::{
    ConversationStore, ConversationStoreRef, FileConversationStore, InMemoryConversationStore,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "coach-daemon",
    about = "Resume coaching backend: initial analysis and follow-up chat",
    version
)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Completion API key
    #[arg(short = 'k', long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Completion model to use
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Conversation store backend
    #[arg(long, value_parser = parse_backend)]
    store_backend: Option<StoreBackend>,

    /// Directory for the file conversation store
    #[arg(long)]
    store_path: Option<PathBuf>,

    /// Path to the catalog TOML file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "COACH_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn parse_backend(value: &str) -> Result<StoreBackend, String> {
    match value {
        "memory" => Ok(StoreBackend::Memory),
        "file" => Ok(StoreBackend::File),
        other => Err(format!("unknown store backend '{}' (expected memory or file)", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env never override the real environment.
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("Starting coach daemon");

    // Load config from file or use defaults
    let mut config = match &args.config {
        Some(path) => {
            let mut cfg = CoachConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            cfg.apply_env();
            info!("Loaded configuration from {}", path.display());
            cfg
        }
        None => CoachConfig::load().context("Failed to load configuration")?,
    };

    // Update config from CLI args
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(api_key) = args.api_key {
        config.completion.api_key = Some(api_key);
    }
    if let Some(model) = args.model {
        config.completion.model = model;
    }
    if let Some(backend) = args.store_backend {
        config.store.backend = backend;
    }
    if let Some(path) = args.store_path {
        config.store.path = Some(path);
    }
    if let Some(path) = args.catalog {
        config.catalog.path = Some(path);
    }

    // Initialize completion client
    let client = OpenAiClient::new(config.completion.clone())?;
    if client.is_configured() {
        info!(model = %config.completion.model, "Initialized completion client");
    }
    let gateway: CompletionGatewayRef = Arc::new(client);

    // Initialize conversation store
    let store: ConversationStoreRef = match config.store.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory conversation store; sessions are lost on restart");
            Arc::new(InMemoryConversationStore::new())
        }
        StoreBackend::File => {
            let dir = config
                .store
                .resolve_path()
                .context("Failed to resolve conversation store path")?;
            let store = FileConversationStore::open(&dir)
                .await
                .with_context(|| format!("Failed to open conversation store at {}", dir.display()))?;
            info!("Using conversation store at {}", dir.display());
            Arc::new(store)
        }
    };

    if config.store.sweep_interval_secs > 0 {
        spawn_expiry_sweep(store.clone(), Duration::from_secs(config.store.sweep_interval_secs));
    }

    let catalog = Arc::new(FileCatalog::new(config.catalog.path.clone()));
    match &config.catalog.path {
        Some(path) => info!("Serving catalog from {}", path.display()),
        None => info!("No catalog configured; /items will be empty"),
    }

    let retention = ChronoDuration::hours(i64::from(config.store.retention_hours));
    let manager = ConversationManager::with_retention(store, gateway, retention);
    let state = AppState::new(manager, catalog);

    if let Err(e) = http_server::run_server(&config.server, state).await {
        error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    info!("Coach daemon shutting down");
    Ok(())
}

/// Periodically drop expired records. Reads re-check expiry regardless, so this only
/// reclaims space.
fn spawn_expiry_sweep(store: ConversationStoreRef, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match store.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(count) => info!(count, "Purged expired sessions"),
                Err(e) => warn!(error = %e, "Expiry sweep failed"),
            }
        }
    });
}
