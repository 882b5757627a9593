//! Todo Server
//!
//! HTTP front end for the record service. PostgreSQL holds the records;
//! Redis (or an in-process cache) accelerates reads.

mod handlers;
mod settings;
mod storage;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use todo_core::ports::{RecordCache, RecordStore};
use todo_core::{RecordService, ServiceConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use settings::{CacheBackend, Settings};
use storage::{Database, MemoryCache, RedisCache};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecordService>,
    pub request_timeout: Duration,
}

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Todo Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    info!("Loading configuration...");
    let settings = Settings::load().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, db={}, cache={}, ttl={}s, cache_timeout={}ms, timeout={}ms",
        settings.bind_address,
        settings.redacted_database_url(),
        settings.cache_backend,
        settings.cache_ttl_secs,
        settings.cache_timeout_ms,
        settings.request_timeout_ms
    );

    let store = connect_store(&settings).await?;
    let cache = connect_cache(&settings).await?;

    let service = RecordService::new(
        store,
        cache,
        ServiceConfig {
            cache_ttl: settings.cache_ttl(),
            op_timeout: settings.request_timeout(),
            cache_timeout: settings.cache_timeout(),
        },
    );

    let state = AppState {
        service: Arc::new(service),
        request_timeout: settings.request_timeout(),
    };

    let addr: SocketAddr = settings
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Connect to PostgreSQL and verify it answers
async fn connect_store(settings: &Settings) -> Result<Arc<dyn RecordStore>> {
    let db = Database::connect(
        &settings.database_url,
        settings.db_max_connections,
        settings.request_timeout(),
    )
    .await?;
    db.ping().await.context("PostgreSQL ping failed")?;
    info!("Connected to PostgreSQL");

    Ok(Arc::new(db))
}

/// Connect to the configured cache and verify it answers
async fn connect_cache(settings: &Settings) -> Result<Arc<dyn RecordCache>> {
    match settings.cache_backend {
        CacheBackend::Redis => {
            let cache = RedisCache::connect(&settings.redis_addr).await?;
            if !cache.ping().await {
                anyhow::bail!("Redis ping failed at {}", settings.redis_addr);
            }
            info!("Connected to Redis at {}", settings.redis_addr);
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            info!("Using in-memory cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

pub(crate) fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(record_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn record_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/todos",
            get(handlers::records::list).post(handlers::records::create),
        )
        .route(
            "/todos/:id",
            get(handlers::records::get)
                .put(handlers::records::update)
                .delete(handlers::records::delete),
        )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
