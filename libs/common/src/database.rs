//! Database module for handling PostgreSQL connections and operations
//!
//! This module provides connection pooling, configuration, and health checks
//! for the PostgreSQL database backing the club service.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::{env, time::Duration};
use tracing::{error, info};

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database server host
    pub host: String,
    /// Database server port
    pub port: u16,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Database name
    pub name: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DB_HOST`: database host (default: "localhost")
    /// - `DB_PORT`: database port (default: 5432)
    /// - `DB_USER`: database user (default: "postgres")
    /// - `DB_PASSWORD`: database password (default: "postgres")
    /// - `DB_NAME`: database name (default: "fitness_club")
    /// - `DB_MAX_CONNECTIONS`: maximum number of connections (default: 10)
    /// - `DB_ACQUIRE_TIMEOUT`: acquire timeout in seconds (default: 30)
    pub fn from_env() -> DatabaseResult<Self> {
        let port = match env::var("DB_PORT") {
            Ok(raw) => raw.trim().parse().map_err(|e| {
                DatabaseError::Configuration(format!("Invalid DB_PORT '{}': {}", raw, e))
            })?,
            Err(_) => 5432,
        };

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let acquire_timeout = env::var("DB_ACQUIRE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            host: env_or("DB_HOST", "localhost"),
            port,
            user: env_or("DB_USER", "postgres"),
            password: env_or("DB_PASSWORD", "postgres"),
            name: env_or("DB_NAME", "fitness_club"),
            max_connections,
            acquire_timeout,
        })
    }

    /// Build the sqlx connect options for this configuration
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .application_name("fitclub-api")
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout))
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Initialize a PostgreSQL connection pool
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<PgPool>` - PostgreSQL connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    info!(
        "Connecting to PostgreSQL at {}:{}/{}",
        config.host, config.port, config.name
    );

    let pool = config
        .pool_options()
        .connect_with(config.connect_options())
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Build a pool that connects on first use
///
/// Useful for wiring the application without a reachable database.
pub fn lazy_pool(config: &DatabaseConfig) -> PgPool {
    config.pool_options().connect_lazy_with(config.connect_options())
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - PostgreSQL connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if connection is successful
pub async fn health_check(pool: &PgPool) -> DatabaseResult<bool> {
    sqlx::query("SELECT 1").execute(pool).await.map_err(|e| {
        error!("Database health check failed: {}", e);
        DatabaseError::Query(e)
    })?;

    Ok(true)
}
