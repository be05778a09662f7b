use thiserror::Error;

/// Failures raised by the persistence layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// `MONGO_URI` was empty at `initialize` time. A deployment error,
    /// never retried.
    #[error("MONGO_URI is not configured")]
    Configuration,

    /// The store could not be reached within the configured number of
    /// startup attempts.
    #[error("could not reach MongoDB after {attempts} attempts")]
    ConnectionExhausted { attempts: u32 },

    /// A repository operation was invoked before the connection reached
    /// the ready state.
    #[error("database not initialized")]
    NotInitialized,

    /// Any error surfaced by the driver on an established connection
    /// (timeouts, network faults, serialization).
    #[error("database operation failed: {0}")]
    Store(#[from] mongodb::error::Error),
}

/// Rejections produced by reading validation. Request-scoped and always
/// surfaced to the caller, never fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid UID")]
    InvalidUid,
}
