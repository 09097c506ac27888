// src/lib.rs
//! Poll creation and voting service.
//!
//! Users register, create polls with a fixed list of options, cast one vote
//! per poll and read aggregated results. Private polls and their results are
//! visible to their creator only; polls can be deleted by their creator or
//! by an administrator.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod policy;
pub mod poll;
pub mod results;
pub mod routes;
pub mod state;
pub mod store;

use std::sync::Arc;

use tracing::info;

use config::{Config, Storage};
use error::AppError;
use state::AppState;
use store::{MemoryStore, PgStore, Store, StoreError};

/// Opens the configured backend, running migrations for Postgres.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match &config.storage {
        Storage::Postgres(database) => {
            let pool = db::create_pool(database).await?;
            db::migrate(&pool).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        Storage::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Wires the services over `store` and creates the bootstrap admin if configured.
pub async fn build_state(store: Arc<dyn Store>, config: &Config) -> Result<AppState, AppError> {
    let state = AppState::new(store, &config.auth);

    if let Some(admin) = &config.admin {
        state.identity.bootstrap_admin(admin).await?;
    }

    Ok(state)
}
