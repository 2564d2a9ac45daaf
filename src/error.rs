//! Error types for the lease manager.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants.

/// Errors that can occur during lease manager operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config, lease document,
    /// or engine event).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate) when the
    /// configuration contains invalid values (e.g., pool_start > pool_end).
    /// Configuration errors are fatal: the process does not start.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The address pool is exhausted.
    ///
    /// Every address in the configured range is leased. Surfaced to the
    /// protocol engine as a NAK; never a crash.
    #[error("No available IP addresses in pool")]
    PoolExhausted,

    /// An inbound engine event could not be decoded.
    ///
    /// Logged and ignored by the event loop; a bad event never commits a
    /// partial mutation to the lease store.
    #[error("Malformed engine event: {0}")]
    MalformedEvent(String),
}

/// A specialized Result type for lease operations.
pub type Result<T> = std::result::Result<T, Error>;
