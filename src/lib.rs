pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;
use tracing::info;

use config::{Config, StorageBackend};
use services::BookingEngine;
use store::{InMemoryStore, PgStore, StoreBackend};

// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: BookingEngine<StoreBackend>,
    pub config: Config,
}

impl AppState {
    /// Connects the configured backend (running migrations for Postgres).
    pub async fn new(config: Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let store = match config.storage.backend {
            StorageBackend::Postgres => {
                let db = database::Database::new(&config.database).await?;
                info!("Database connected");
                db.run_migrations().await?;
                StoreBackend::Postgres(PgStore::new(db.pool))
            }
            StorageBackend::Memory => {
                info!("Using in-memory store, data is lost on restart");
                StoreBackend::Memory(InMemoryStore::new())
            }
        };
        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: StoreBackend, config: Config) -> Arc<Self> {
        let engine = BookingEngine::new(store, &config.ledger);
        Arc::new(Self { engine, config })
    }
}
