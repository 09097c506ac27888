// src/db.rs
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::StoreError;

pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool<Postgres>, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    info!("Connected to database (max {} connections)", config.max_connections);
    Ok(pool)
}

/// Applies the embedded schema migrations.
pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
