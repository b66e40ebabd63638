//! Database layer for PriceLens
//!
//! Provides:
//! - SeaORM entity models
//! - The `Catalog` abstraction the pricing pipeline reads and writes through
//! - A PostgreSQL-backed repository and an in-process catalog
//! - Connection pool management and embedded migrations

mod catalog;
mod memory;
pub mod models;
mod repository;

pub use catalog::{Catalog, NewPrice, PriceMatch, PriceWithStore, ProductWithPrices};
pub use memory::{CatalogCounts, MemoryCatalog};
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Apply the embedded catalog migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Applying catalog migrations...");

        sqlx::migrate!("./migrations")
            .run(self.conn.get_postgres_connection_pool())
            .await?;

        info!("Catalog migrations applied");
        Ok(())
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}
