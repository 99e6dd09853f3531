//! tkt-api: HTTP API server for the tkt ticket store
//!
//! Exposes the ticket store's operations as JSON endpoints.

use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tkt_core::{BackendKind, Config, JsonlBackend, MemoryBackend, TicketStore};

mod routes;

use routes::AppState;

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Open the store the environment and config ask for
fn open_store() -> anyhow::Result<TicketStore> {
    let force_memory = std::env::var("TKT_API_MEMORY").is_ok_and(|v| v == "1");
    if force_memory {
        let config = Config::default().with_env_overrides();
        return Ok(TicketStore::open(MemoryBackend::new(), config)?);
    }

    let backend =
        JsonlBackend::discover().map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    let config = Config::load(&backend.config_path())?.with_env_overrides();

    let store = match config.storage.backend {
        BackendKind::Jsonl => TicketStore::open(backend, config)?,
        BackendKind::Memory => TicketStore::open(MemoryBackend::new(), config)?,
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let store = open_store()?;
    let api = store.config().api.clone();
    let tickets = store.len()?;
    tracing::info!(backend = %store.backend_description(), tickets, "store opened");

    let report = store.check()?;
    if !report.is_consistent() {
        tracing::warn!(
            dangling = report.dangling.len(),
            cycles = report.cycles.len(),
            "store has inconsistent parent references"
        );
    }

    let state = Arc::new(AppState {
        store: Arc::new(store),
    });

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", api.host, api.port);
    tracing::info!("Starting tkt-api on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
