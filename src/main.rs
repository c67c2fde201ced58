//! Libris Server - library lending service

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libris_server::{
    api,
    config::{AppConfig, StorageBackend},
    repository::{memory::MemoryLendingStore, LendingStore, Repository},
    services::{
        audit::{AuditSink, MemoryAuditSink, PgAuditSink},
        Services,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    init_tracing(&config);

    tracing::info!("Starting Libris Server v{}", env!("CARGO_PKG_VERSION"));

    let (store, audit): (Arc<dyn LendingStore>, Arc<dyn AuditSink>) = match config.database.backend {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await?;

            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations").run(&pool).await?;

            tracing::info!("Database migrations completed");

            let repository = Repository::new(pool);
            let store: Arc<dyn LendingStore> = Arc::new(repository.units.clone());
            let audit: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(repository.logs.clone()));
            (store, audit)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory lending store, data is lost on shutdown");
            let store: Arc<dyn LendingStore> = Arc::new(MemoryLendingStore::new());
            let audit: Arc<dyn AuditSink> = Arc::new(MemoryAuditSink::new());
            (store, audit)
        }
    };

    let permissions = config.permissions.table();
    tracing::info!(rules = permissions.len(), "Permission table loaded");

    let services = Services::new(store, audit, permissions);

    let issues = services.lending.audit_consistency().await?;
    if !issues.is_empty() {
        tracing::warn!(count = issues.len(), "Lending ledger has inconsistent units");
    }

    // Save server address before moving config
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("libris_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
