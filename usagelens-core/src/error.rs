//! Error types for usagelens-core

use thiserror::Error;

/// Main error type for the usagelens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The connection mutex was poisoned by a panicking reader
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

/// Result type alias for usagelens-core
pub type Result<T> = std::result::Result<T, Error>;
