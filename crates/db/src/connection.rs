use std::time::Duration;

use karmabot_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::migrations;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl From<&DatabaseConfig> for ConnectionSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Shared handle to the store that (re)establishes its pool on demand.
///
/// Readers share the live pool. When the pool is missing or closed, the first
/// caller to take the write lock reconnects and applies pending migrations;
/// callers queued behind it re-check and reuse the fresh pool.
pub struct StoreConnector {
    settings: ConnectionSettings,
    pool: RwLock<Option<DbPool>>,
}

impl StoreConnector {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings, pool: RwLock::new(None) }
    }

    pub async fn pool(&self) -> Result<DbPool, ConnectError> {
        if let Some(pool) = live_pool(self.pool.read().await.as_ref()) {
            return Ok(pool);
        }

        let mut guard = self.pool.write().await;
        if let Some(pool) = live_pool(guard.as_ref()) {
            return Ok(pool);
        }

        info!(
            event_name = "storage.connector.reconnect",
            max_connections = self.settings.max_connections,
            "establishing database connection"
        );
        let pool = connect_with_settings(
            &self.settings.url,
            self.settings.max_connections,
            self.settings.timeout_secs,
        )
        .await
        .map_err(|source| {
            error!(
                event_name = "storage.connector.reconnect_failed",
                error = %source,
                "failed to reconnect to database"
            );
            ConnectError::Connect(source)
        })?;
        migrations::run_pending(&pool).await.map_err(ConnectError::Migrate)?;

        *guard = Some(pool.clone());
        Ok(pool)
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            info!(event_name = "storage.connector.close", "closing database connection");
            pool.close().await;
        }
    }
}

fn live_pool(pool: Option<&DbPool>) -> Option<DbPool> {
    pool.filter(|pool| !pool.is_closed()).cloned()
}
