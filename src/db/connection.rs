use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Connection, SqlitePool};
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::db::collection::{Collection, Document};
use crate::db::feed::{ChangeFeed, ChangeStream};
use crate::db::schema::validate_collection_name;
use crate::error::{ConnectPhase, ConnectionError, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to an open store. Cheap to clone; safe for concurrent use.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    name: String,
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Database {
    fn new(name: &str, pool: SqlitePool) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                name: name.to_string(),
                pool,
                feed: ChangeFeed::new(name),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    pub(crate) fn feed(&self) -> &ChangeFeed {
        &self.inner.feed
    }

    /// Handle to a collection by name. Does not create it; see `storage::provision`.
    pub fn collection(&self, name: &str) -> Result<Collection<Document>, StoreError> {
        validate_collection_name(name)?;
        Ok(Collection::new(self.clone(), name))
    }

    /// Subscribes to every change written through this database's collections.
    pub fn watch(&self) -> ChangeStream {
        self.inner.feed.subscribe()
    }

    /// Names of the collections that currently exist, sorted.
    pub async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
        SELECT name FROM sqlite_master
        WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(names)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pool.is_closed()
    }

    pub async fn close(&self) {
        self.inner.pool.close().await;
        info!(database = %self.inner.name, "database connection closed");
    }
}

/// Opens the store at `uri` and verifies it answers a ping.
///
/// `timeout` bounds the connect phase and the ping phase separately. No retry
/// happens here; a failure is meant to abort startup.
pub async fn connect(
    uri: &str,
    database_name: &str,
    timeout: Duration,
) -> Result<Database, ConnectionError> {
    if !uri.starts_with("sqlite:") {
        return Err(ConnectionError::InvalidUri(sqlx::Error::Configuration(
            format!("unsupported database URI scheme: {uri}").into(),
        )));
    }

    let connect_opts = SqliteConnectOptions::from_str(uri)
        .map_err(ConnectionError::InvalidUri)?
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let mut pool_opts = SqlitePoolOptions::new().acquire_timeout(timeout);
    if is_in_memory(uri) {
        // Every new connection to an in-memory URI is a fresh empty store.
        pool_opts = pool_opts
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = match tokio::time::timeout(timeout, pool_opts.connect_with(connect_opts)).await {
        Ok(Ok(pool)) => pool,
        Ok(Err(e)) => return Err(ConnectionError::from_connect(e, timeout)),
        Err(_) => {
            return Err(ConnectionError::Timeout {
                phase: ConnectPhase::Connect,
                after: timeout,
            });
        }
    };

    let ping_result = match tokio::time::timeout(timeout, ping(&pool)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Ping(e)),
        Err(_) => Err(ConnectionError::Timeout {
            phase: ConnectPhase::Ping,
            after: timeout,
        }),
    };
    if let Err(e) = ping_result {
        warn!(database = %database_name, error = %e, "database ping failed; closing pool");
        pool.close().await;
        return Err(e);
    }

    info!(database = %database_name, "database connected and answered ping");
    Ok(Database::new(database_name, pool))
}

async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    conn.ping().await
}

fn is_in_memory(uri: &str) -> bool {
    uri.contains(":memory:") || uri.contains("mode=memory")
}
