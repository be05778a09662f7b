use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// MongoDB connection string. May be empty here; `ConnectionManager`
    /// rejects an empty URI at `initialize` time so the service can still
    /// be constructed (and tested) without a store configured.
    pub mongo_uri: String,
    /// Logical database name holding the `readings` and `access_logs`
    /// collections.
    pub db_name: String,
    pub server_host: String,
    pub server_port: u16,
    /// Startup connection attempts before giving up.
    pub connect_retries: u32,
    /// Fixed delay between startup connection attempts, in seconds.
    pub connect_retry_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            mongo_uri: optional("MONGO_URI", ""),
            db_name: optional("DB_NAME", "IoT"),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            connect_retries: optional("DB_CONNECT_RETRIES", "5")
                .parse()
                .context("DB_CONNECT_RETRIES must be a positive integer")?,
            connect_retry_secs: optional("DB_CONNECT_RETRY_SECS", "2")
                .parse()
                .context("DB_CONNECT_RETRY_SECS must be a non-negative integer")?,
        })
    }
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
