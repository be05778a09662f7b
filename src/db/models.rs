use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp format for readings. Local time, ISO-8601, microsecond
/// precision; lexicographic order matches chronological order so the
/// store can sort on the raw string.
pub const READING_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Timestamp format for audit entries (second precision).
pub const ACCESS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One sensor observation as persisted in the `readings` collection.
///
/// The typed fields carry the wire names used by the devices; anything
/// else the device sends rides along untouched in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default, deserialize_with = "loose_bool")]
    pub presenca: bool,
    #[serde(default, deserialize_with = "loose_bool")]
    pub acesso: bool,
    #[serde(default)]
    pub uid_tag: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: Document,
}

/// One audit record as persisted in the `access_logs` collection.
/// Written once after the originating operation completes, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub endpoint: String,
    pub method: String,
    /// Stamped by the repository at write time, not caller-supplied.
    pub access_time: String,
    pub reading_id: Option<String>,
    pub client_ip: Option<String>,
    /// Small contextual projection (e.g. `{uid_tag}`), never the full body.
    pub payload: Option<Document>,
    #[serde(default)]
    pub status: i32,
    pub response_time_ms: Option<i64>,
}

/// Audit metadata assembled by the adapter layer; the repository turns it
/// into an [`AccessLogEntry`] by stamping `access_time`.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub endpoint: String,
    pub method: String,
    pub reading_id: Option<String>,
    pub client_ip: Option<String>,
    pub payload: Option<Document>,
    pub status: i32,
    pub response_time_ms: Option<i64>,
}

/// Truth-test a stored value the way dynamic clients wrote it: booleans
/// as-is, numbers by non-zero, strings by non-emptiness.
pub fn bson_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(f) => *f != 0.0,
        Bson::String(s) => !s.is_empty(),
        _ => false,
    }
}

fn loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Bson::deserialize(deserializer)?;
    Ok(bson_truthy(&value))
}
