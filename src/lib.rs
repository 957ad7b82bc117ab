//! # jarindex - class index for local Maven repositories
//!
//! Scans jars under a repository tree, records every top-level class they
//! contain in SQLite, and answers lookups over a line-delimited JSON-RPC
//! tool protocol.
//!
//! jarindex provides:
//! - An incremental scanner keyed on archive modification time
//! - SQLite-backed storage with one row per (class, jar)
//! - Ranked substring search, exact lookups and aggregate statistics
//! - A stdio tool server (`initialize`, `tools/list`, `tools/call`)

pub mod config;
pub mod logging;
pub mod query;
pub mod scanner;
pub mod server;
pub mod storage;
pub mod ui;
pub mod unit;

// Re-exports for convenient access
pub use config::{Config, LogLevel};
pub use query::QueryService;
pub use scanner::{ScanStats, Scanner};
pub use server::Dispatcher;
pub use storage::UnitStore;
pub use unit::{Members, UnitRecord};

/// Result type alias for jarindex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for jarindex operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error in {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store is closed")]
    StoreClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure belongs to a single archive and may be skipped.
    pub fn is_archive_local(&self) -> bool {
        matches!(self, Error::Archive { .. } | Error::Io(_))
    }
}
