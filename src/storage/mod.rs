//! Storage Layer - SQLite-backed persistence
//!
//! System of record is a single SQLite file with one table:
//! - units(qualified_name, package_name, archive_path, methods, fields,
//!   payload, last_modified, created_at)
//!
//! The scanner owns the only writer handle; queries go through a separate
//! read-only handle on the same file.

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, StoredUnit, UnitStore, UpsertCounts, UpsertOutcome};
