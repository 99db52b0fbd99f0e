use thiserror::Error;

/// Errors produced by the storage substrate.
///
/// These never escape the cache's public surface: the cache logs them and
/// degrades to "absent"/"no-op" as the delivery layer requires.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error from the durable backend.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
