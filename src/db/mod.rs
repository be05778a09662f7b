pub mod models;
pub mod repository;

use std::future::Future;
use std::time::Duration;

use mongodb::{
    bson::doc,
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Database, IndexModel,
};
use tokio::{sync::RwLock, time};
use tracing::{error, info, warn};

use crate::error::DbError;

pub const READINGS: &str = "readings";
pub const ACCESS_LOGS: &str = "access_logs";

/// Lifecycle of the shared store connection. Written once during startup,
/// read by every repository call afterwards.
#[derive(Default)]
pub enum ConnectionState {
    #[default]
    Unconfigured,
    Connecting,
    Ready(Database),
    /// Terminal until the process restarts (or `initialize` is called
    /// again); no background reconnection is attempted.
    Failed,
}

/// Owns the MongoDB client lifecycle: bounded startup retry, index
/// provisioning, and the ready-state gate the repository checks.
///
/// A single instance is constructed at startup and handed (behind `Arc`)
/// to everything that talks to the store.
pub struct ConnectionManager {
    uri: String,
    db_name: String,
    state: RwLock<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(uri: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            db_name: db_name.into(),
            state: RwLock::new(ConnectionState::Unconfigured),
        }
    }

    /// Connect and ping up to `retries` times with a fixed `delay` between
    /// failed attempts, then provision indexes and transition to `Ready`.
    ///
    /// An empty URI is a deployment error and fails immediately without
    /// touching the network. On exhaustion the state becomes `Failed` and
    /// stays that way until `initialize` is called again.
    pub async fn initialize(&self, retries: u32, delay: Duration) -> Result<(), DbError> {
        if self.uri.is_empty() {
            error!("MONGO_URI is not configured, cannot initialize the store");
            return Err(DbError::Configuration);
        }

        *self.state.write().await = ConnectionState::Connecting;

        match with_retry(retries, delay, |attempt| {
            info!(attempt, retries, "connecting to MongoDB");
            self.try_connect()
        })
        .await
        {
            Ok(db) => {
                *self.state.write().await = ConnectionState::Ready(db);
                info!(db = %self.db_name, "MongoDB connection established");
                Ok(())
            }
            Err(attempts) => {
                *self.state.write().await = ConnectionState::Failed;
                error!(attempts, "could not reach MongoDB, giving up");
                Err(DbError::ConnectionExhausted { attempts })
            }
        }
    }

    /// Handle to the logical database, or `NotInitialized` outside `Ready`.
    pub async fn database(&self) -> Result<Database, DbError> {
        match &*self.state.read().await {
            ConnectionState::Ready(db) => Ok(db.clone()),
            _ => Err(DbError::NotInitialized),
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(&*self.state.read().await, ConnectionState::Ready(_))
    }

    /// One connection attempt: parse options, ping, provision indexes.
    async fn try_connect(&self) -> mongodb::error::Result<Database> {
        let mut options = ClientOptions::parse(&self.uri).await?;
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        let client = Client::with_options(options)?;

        client.database("admin").run_command(doc! { "ping": 1 }).await?;

        let db = client.database(&self.db_name);
        ensure_indexes(&db).await?;
        Ok(db)
    }
}

/// Run `op` up to `retries` times with a fixed delay between failed
/// attempts. No backoff: the fixed spacing is part of the observable
/// startup contract. Returns the attempt count on exhaustion.
async fn with_retry<T, E, F, Fut>(retries: u32, delay: Duration, mut op: F) -> Result<T, u32>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    for attempt in 1..=retries {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(attempt, retries, error = %e, "MongoDB connection attempt failed");
                if attempt < retries {
                    time::sleep(delay).await;
                }
            }
        }
    }
    Err(retries)
}

/// Idempotent: `create_index` on an existing index is a no-op server-side.
async fn ensure_indexes(db: &Database) -> mongodb::error::Result<()> {
    let readings = db.collection::<models::Reading>(READINGS);
    readings
        .create_index(IndexModel::builder().keys(doc! { "uid_tag": 1 }).build())
        .await?;
    readings
        .create_index(IndexModel::builder().keys(doc! { "timestamp": 1 }).build())
        .await?;
    db.collection::<models::AccessLogEntry>(ACCESS_LOGS)
        .create_index(IndexModel::builder().keys(doc! { "access_time": 1 }).build())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retry_exhausts_after_configured_attempts() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, Duration::from_secs(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(anyhow::anyhow!("unreachable")) }
        })
        .await;

        assert_eq!(result.unwrap_err(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_on_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(5, Duration::from_secs(2), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt >= 2 {
                    Ok(attempt)
                } else {
                    Err(anyhow::anyhow!("not yet"))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_spaces_attempts_by_fixed_delay() {
        let start = time::Instant::now();
        let _ = with_retry(3, Duration::from_secs(2), |_| async {
            Err::<(), _>(anyhow::anyhow!("down"))
        })
        .await;

        // Two sleeps between three attempts; none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn empty_uri_is_a_configuration_error() {
        let conn = ConnectionManager::new("", "test");
        let err = conn.initialize(3, Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, DbError::Configuration));
        assert!(!conn.is_ready().await);
    }

    #[tokio::test]
    async fn database_before_initialize_is_not_initialized() {
        let conn = ConnectionManager::new("mongodb://127.0.0.1:27017", "test");
        let err = conn.database().await.unwrap_err();
        assert!(matches!(err, DbError::NotInitialized));
    }

    #[tokio::test]
    async fn unreachable_target_exhausts_attempts() {
        // Port 9 (discard) refuses connections; the short server-selection
        // timeout keeps each ping attempt quick.
        let uri = "mongodb://127.0.0.1:9/?serverSelectionTimeoutMS=200&connectTimeoutMS=200";
        let conn = ConnectionManager::new(uri, "test");

        let err = conn.initialize(3, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionExhausted { attempts: 3 }));
        assert!(!conn.is_ready().await);
    }
}
