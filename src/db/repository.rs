use std::sync::Arc;

use chrono::Local;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson};
use tracing::warn;

use super::models::{AccessLogEntry, AccessRecord, Reading, ACCESS_TIME_FORMAT};
use super::{ConnectionManager, ACCESS_LOGS, READINGS};
use crate::error::DbError;

/// Typed operations over the `readings` and `access_logs` collections.
///
/// Every operation gates on the connection being `Ready` and performs no
/// I/O otherwise. Cheap to clone; all clones share the one connection.
#[derive(Clone)]
pub struct Repository {
    conn: Arc<ConnectionManager>,
}

impl Repository {
    pub fn new(conn: Arc<ConnectionManager>) -> Self {
        Self { conn }
    }

    pub async fn is_ready(&self) -> bool {
        self.conn.is_ready().await
    }

    /// Insert one reading and return its generated identifier as an
    /// opaque string.
    pub async fn insert_reading(&self, reading: &Reading) -> Result<String, DbError> {
        let db = self.conn.database().await?;
        let result = db.collection::<Reading>(READINGS).insert_one(reading).await?;
        let id = match result.inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        };
        Ok(id)
    }

    /// Up to `limit` readings, most recent first, storage `_id` excluded.
    /// Boolean fields come back as booleans even when older documents
    /// stored them loosely.
    pub async fn list_readings(&self, limit: i64) -> Result<Vec<Reading>, DbError> {
        let db = self.conn.database().await?;
        let cursor = db
            .collection::<Reading>(READINGS)
            .find(doc! {})
            .projection(doc! { "_id": 0 })
            .sort(doc! { "timestamp": -1 })
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Up to `limit` audit entries, most recent first, `_id` excluded.
    pub async fn list_access_logs(&self, limit: i64) -> Result<Vec<AccessLogEntry>, DbError> {
        let db = self.conn.database().await?;
        let cursor = db
            .collection::<AccessLogEntry>(ACCESS_LOGS)
            .find(doc! {})
            .projection(doc! { "_id": 0 })
            .sort(doc! { "access_time": -1 })
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Best-effort audit write: stamps `access_time` and inserts. Any
    /// failure (store down, not yet initialized) is logged at warn level
    /// and swallowed so the primary operation is never degraded.
    pub async fn write_access_log(&self, record: AccessRecord) {
        if let Err(e) = self.try_write_access_log(record).await {
            warn!(error = %e, "failed to persist access log entry");
        }
    }

    async fn try_write_access_log(&self, record: AccessRecord) -> Result<(), DbError> {
        let db = self.conn.database().await?;
        let entry = AccessLogEntry {
            endpoint: record.endpoint,
            method: record.method,
            access_time: Local::now().format(ACCESS_TIME_FORMAT).to_string(),
            reading_id: record.reading_id,
            client_ip: record.client_ip,
            payload: record.payload,
            status: record.status,
            response_time_ms: record.response_time_ms,
        };
        db.collection::<AccessLogEntry>(ACCESS_LOGS).insert_one(&entry).await?;
        Ok(())
    }
}
