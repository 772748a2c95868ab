use axum::{routing::get, Router};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_ledger::{
    config::{Config, LogFormat},
    controllers, AppState,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        environment = %config.app.environment,
        backend = ?config.storage.backend,
        "Starting seat ledger"
    );

    let state = AppState::new(config.clone())
        .await
        .map_err(|e| anyhow::anyhow!("failed to initialise storage: {e}"))?;

    // --- Background reconciliation ---
    if config.reconciliation.interval_secs > 0 {
        let interval = Duration::from_secs(config.reconciliation.interval_secs);
        state
            .engine
            .spawn_reconciliation_loop(interval, config.reconciliation.run_on_start);
        info!(every_secs = config.reconciliation.interval_secs, "Reconciliation loop started");
    }

    // --- Web server ---
    let app = Router::new()
        .route("/", get(|| async { "Seat Ledger API" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
