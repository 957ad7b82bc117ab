//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;

use super::schema;
use crate::unit::{UnitRecord, package_of};
use crate::{Error, Result};

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const UNIT_COLUMNS: &str =
    "qualified_name, package_name, archive_path, methods, fields, last_modified, created_at";

/// SQLite-backed storage for unit records
///
/// The connection is held in an `Option` so that [`UnitStore::close`] can
/// release it explicitly; every operation after close fails with
/// [`Error::StoreClosed`].
#[derive(Debug)]
pub struct UnitStore {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

/// Whether an upsert created a row or rewrote an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Per-batch upsert tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertCounts {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

/// A unit row as stored, without the payload.
///
/// Member lists are left as the raw JSON text; decoding them is the reader's
/// job so that a malformed value never fails the query itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUnit {
    pub qualified_name: String,
    pub package_name: String,
    pub archive_path: String,
    pub methods: Option<String>,
    pub fields: Option<String>,
    pub last_modified: i64,
    pub created_at: i64,
    /// Search tier (1 = exact .. 4 = other), 0 when not ranked
    pub rank: u8,
}

impl UnitStore {
    /// Open the writer handle (creates the file and schema if missing)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets the read-only handle see committed snapshots while the
        // writer holds its transaction.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        let store = Self {
            conn: Some(conn),
            path: Some(path.to_path_buf()),
        };
        store.initialize_schema()?;
        tracing::debug!("Opened unit store at {}", path.display());
        Ok(store)
    }

    /// Open a read-only handle on an existing store file
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!("Opened read-only unit store at {}", path.display());
        Ok(Self {
            conn: Some(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Some(conn),
            path: None,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::StoreClosed)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Release the connection. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| Error::Storage(e))?;
            tracing::debug!("Closed unit store");
        }
        Ok(())
    }

    // ========== Writes ==========

    /// Insert a record or rewrite the existing row with the same key
    pub fn upsert(&mut self, record: &UnitRecord) -> Result<UpsertOutcome> {
        let conn = self.conn.as_mut().ok_or(Error::StoreClosed)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = upsert_row(&tx, record)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Upsert every record of one archive in a single transaction
    pub fn upsert_batch(&mut self, records: &[UnitRecord]) -> Result<UpsertCounts> {
        let mut counts = UpsertCounts::default();
        if records.is_empty() {
            return Ok(counts);
        }

        let conn = self.conn.as_mut().ok_or(Error::StoreClosed)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for record in records {
            counts.record(upsert_row(&tx, record)?);
        }
        tx.commit()?;
        Ok(counts)
    }

    // ========== Staleness ==========

    /// Newest `last_modified` recorded for an archive
    pub fn archive_last_modified(&self, archive_path: &str) -> Result<Option<i64>> {
        let value: Option<i64> = self.conn()?.query_row(
            "SELECT MAX(last_modified) FROM units WHERE archive_path = ?1",
            [archive_path],
            |row| row.get(0),
        )?;
        Ok(value)
    }

    /// True if the archive has never been recorded or changed since
    pub fn is_stale(&self, archive_path: &str, mtime: i64) -> Result<bool> {
        Ok(match self.archive_last_modified(archive_path)? {
            Some(recorded) => recorded < mtime,
            None => true,
        })
    }

    // ========== Reads ==========

    /// Substring search over qualified and package names, ranked by tier
    ///
    /// Matching ignores ASCII case. Tiers: exact name, name prefix, package
    /// prefix, any other substring; ties by name then archive path.
    pub fn search_units(&self, query: &str, limit: usize) -> Result<Vec<StoredUnit>> {
        let sql = format!(
            r#"
            SELECT {UNIT_COLUMNS},
                CASE
                    WHEN lower(qualified_name) = lower(?1) THEN 1
                    WHEN substr(lower(qualified_name), 1, length(?1)) = lower(?1) THEN 2
                    WHEN substr(lower(package_name), 1, length(?1)) = lower(?1) THEN 3
                    ELSE 4
                END AS tier
            FROM units
            WHERE instr(lower(qualified_name), lower(?1)) > 0
               OR instr(lower(package_name), lower(?1)) > 0
            ORDER BY tier, qualified_name, archive_path
            LIMIT ?2
            "#
        );
        let mut stmt = self.conn()?.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![query, limit_param(limit)], row_to_unit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Units whose package starts with `prefix` ignoring ASCII case, ordered
    /// by name
    pub fn units_in_package(&self, prefix: &str, limit: usize) -> Result<Vec<StoredUnit>> {
        let sql = format!(
            r#"
            SELECT {UNIT_COLUMNS}, 0
            FROM units
            WHERE substr(lower(package_name), 1, length(?1)) = lower(?1)
            ORDER BY qualified_name, archive_path
            LIMIT ?2
            "#
        );
        let mut stmt = self.conn()?.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![prefix, limit_param(limit)], row_to_unit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// First unit with this exact name, by archive path order
    pub fn find_unit(&self, qualified_name: &str) -> Result<Option<StoredUnit>> {
        let sql = format!(
            "SELECT {UNIT_COLUMNS}, 0 FROM units WHERE qualified_name = ?1 ORDER BY archive_path LIMIT 1"
        );
        self.conn()?
            .query_row(&sql, [qualified_name], row_to_unit)
            .optional()
            .map_err(Into::into)
    }

    /// All archives that contain this exact name
    pub fn archives_of(&self, qualified_name: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn()?.prepare_cached(
            "SELECT archive_path FROM units WHERE qualified_name = ?1 ORDER BY archive_path",
        )?;
        let rows = stmt
            .query_map([qualified_name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }

    /// Payload of a unit, optionally pinned to one archive
    ///
    /// Returns the archive the payload came from alongside the bytes.
    pub fn find_payload(
        &self,
        qualified_name: &str,
        archive_path: Option<&str>,
    ) -> Result<Option<(String, Vec<u8>)>> {
        let conn = self.conn()?;
        let map = |row: &rusqlite::Row| -> rusqlite::Result<(String, Vec<u8>)> {
            let archive: String = row.get(0)?;
            let payload: Option<Vec<u8>> = row.get(1)?;
            Ok((archive, payload.unwrap_or_default()))
        };

        let found = match archive_path {
            Some(archive) => conn
                .query_row(
                    "SELECT archive_path, payload FROM units WHERE qualified_name = ?1 AND archive_path = ?2",
                    params![qualified_name, archive],
                    map,
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT archive_path, payload FROM units WHERE qualified_name = ?1 ORDER BY archive_path LIMIT 1",
                    [qualified_name],
                    map,
                )
                .optional()?,
        };
        Ok(found)
    }

    #[cfg(test)]
    pub fn count_units(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM units", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        self.conn()?
            .query_row(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(DISTINCT qualified_name),
                    COUNT(DISTINCT package_name),
                    COUNT(DISTINCT archive_path)
                FROM units
                "#,
                [],
                |row| {
                    Ok(DbStats {
                        units: row.get::<_, i64>(0)? as usize,
                        classes: row.get::<_, i64>(1)? as usize,
                        packages: row.get::<_, i64>(2)? as usize,
                        archives: row.get::<_, i64>(3)? as usize,
                    })
                },
            )
            .map_err(Into::into)
    }
}

fn upsert_row(conn: &Connection, record: &UnitRecord) -> Result<UpsertOutcome> {
    let methods = serde_json::to_string(&record.members.methods)?;
    let fields = serde_json::to_string(&record.members.fields)?;

    let existed: bool = conn
        .prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM units WHERE qualified_name = ?1 AND archive_path = ?2)",
        )?
        .query_row(params![record.qualified_name, record.archive_path], |row| row.get(0))?;

    conn.prepare_cached(
        r#"
        INSERT INTO units (qualified_name, package_name, archive_path, methods, fields, payload, last_modified)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(qualified_name, archive_path) DO UPDATE SET
            package_name = excluded.package_name,
            methods = excluded.methods,
            fields = excluded.fields,
            payload = excluded.payload,
            last_modified = MAX(units.last_modified, excluded.last_modified)
        "#,
    )?
    .execute(params![
        record.qualified_name,
        package_of(&record.qualified_name),
        record.archive_path,
        methods,
        fields,
        record.payload,
        record.last_modified,
    ])?;

    Ok(if existed {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Helper to convert a row to a StoredUnit
fn row_to_unit(row: &rusqlite::Row) -> rusqlite::Result<StoredUnit> {
    Ok(StoredUnit {
        qualified_name: row.get(0)?,
        package_name: row.get(1)?,
        archive_path: row.get(2)?,
        methods: row.get(3)?,
        fields: row.get(4)?,
        last_modified: row.get(5)?,
        created_at: row.get(6)?,
        rank: row.get::<_, i64>(7)? as u8,
    })
}

/// Database statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub units: usize,
    pub classes: usize,
    pub packages: usize,
    pub archives: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Units: {}", self.units)?;
        writeln!(f, "  Classes: {}", self.classes)?;
        writeln!(f, "  Packages: {}", self.packages)?;
        write!(f, "  Archives: {}", self.archives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_unit(name: &str, archive: &str, mtime: i64) -> UnitRecord {
        UnitRecord::new(name, archive, b"\xCA\xFE\xBA\xBE".to_vec(), mtime)
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let mut store = UnitStore::open_in_memory().unwrap();
        let unit = sample_unit("com.acme.Foo", "/repo/a.jar", 100);

        assert_eq!(store.upsert(&unit).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&unit).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.count_units().unwrap(), 1);
    }

    #[test]
    fn test_same_name_in_two_archives_is_kept() {
        let mut store = UnitStore::open_in_memory().unwrap();
        store.upsert(&sample_unit("com.acme.Foo", "/repo/a.jar", 1)).unwrap();
        store.upsert(&sample_unit("com.acme.Foo", "/repo/b.jar", 1)).unwrap();

        assert_eq!(store.count_units().unwrap(), 2);
        assert_eq!(
            store.archives_of("com.acme.Foo").unwrap(),
            vec!["/repo/a.jar".to_string(), "/repo/b.jar".to_string()]
        );
    }

    #[test]
    fn test_last_modified_never_decreases() {
        let mut store = UnitStore::open_in_memory().unwrap();
        store.upsert(&sample_unit("a.B", "/repo/a.jar", 200)).unwrap();
        store.upsert(&sample_unit("a.B", "/repo/a.jar", 150)).unwrap();
        assert_eq!(store.archive_last_modified("/repo/a.jar").unwrap(), Some(200));

        store.upsert(&sample_unit("a.B", "/repo/a.jar", 300)).unwrap();
        assert_eq!(store.archive_last_modified("/repo/a.jar").unwrap(), Some(300));
    }

    #[test]
    fn test_created_at_survives_update() {
        let mut store = UnitStore::open_in_memory().unwrap();
        store.upsert(&sample_unit("a.B", "/repo/a.jar", 1)).unwrap();
        let before = store.find_unit("a.B").unwrap().unwrap().created_at;

        store.upsert(&sample_unit("a.B", "/repo/a.jar", 2)).unwrap();
        let after = store.find_unit("a.B").unwrap().unwrap();
        assert_eq!(after.created_at, before);
        assert_eq!(after.last_modified, 2);
    }

    #[test]
    fn test_is_stale() {
        let mut store = UnitStore::open_in_memory().unwrap();
        assert!(store.is_stale("/repo/a.jar", 10).unwrap());

        store.upsert(&sample_unit("a.B", "/repo/a.jar", 10)).unwrap();
        assert!(!store.is_stale("/repo/a.jar", 10).unwrap());
        assert!(!store.is_stale("/repo/a.jar", 9).unwrap());
        assert!(store.is_stale("/repo/a.jar", 11).unwrap());
    }

    #[test]
    fn test_upsert_batch_counts() {
        let mut store = UnitStore::open_in_memory().unwrap();
        let first = vec![sample_unit("a.A", "/x.jar", 1), sample_unit("a.B", "/x.jar", 1)];
        let counts = store.upsert_batch(&first).unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 2, updated: 0 });

        let second = vec![sample_unit("a.B", "/x.jar", 2), sample_unit("a.C", "/x.jar", 2)];
        let counts = store.upsert_batch(&second).unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 1, updated: 1 });
    }

    #[test]
    fn test_package_name_is_derived() {
        let mut store = UnitStore::open_in_memory().unwrap();
        store.upsert(&sample_unit("org.example.util.Strings", "/x.jar", 1)).unwrap();
        store.upsert(&sample_unit("Bare", "/x.jar", 1)).unwrap();

        assert_eq!(store.find_unit("org.example.util.Strings").unwrap().unwrap().package_name, "org.example.util");
        assert_eq!(store.find_unit("Bare").unwrap().unwrap().package_name, "");
    }

    #[test]
    fn test_find_payload_with_and_without_archive() {
        let mut store = UnitStore::open_in_memory().unwrap();
        store.upsert(&UnitRecord::new("a.B", "/b.jar", vec![2], 1)).unwrap();
        store.upsert(&UnitRecord::new("a.B", "/a.jar", vec![1], 1)).unwrap();

        let (archive, bytes) = store.find_payload("a.B", None).unwrap().unwrap();
        assert_eq!(archive, "/a.jar");
        assert_eq!(bytes, vec![1]);

        let (archive, bytes) = store.find_payload("a.B", Some("/b.jar")).unwrap().unwrap();
        assert_eq!(archive, "/b.jar");
        assert_eq!(bytes, vec![2]);

        assert!(store.find_payload("a.B", Some("/c.jar")).unwrap().is_none());
        assert!(store.find_payload("a.Missing", None).unwrap().is_none());
    }

    #[test]
    fn test_stats_counts_distinct_values() {
        let mut store = UnitStore::open_in_memory().unwrap();
        store.upsert(&sample_unit("a.A", "/1.jar", 1)).unwrap();
        store.upsert(&sample_unit("a.A", "/2.jar", 1)).unwrap();
        store.upsert(&sample_unit("b.B", "/2.jar", 1)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats, DbStats { units: 3, classes: 2, packages: 2, archives: 2 });
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut store = UnitStore::open_in_memory().unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.count_units(), Err(Error::StoreClosed)));
    }

    #[test]
    fn test_read_only_handle_sees_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        let mut writer = UnitStore::open(&path).unwrap();
        let mut reader = UnitStore::open_read_only(&path).unwrap();

        writer.upsert(&sample_unit("a.B", "/x.jar", 1)).unwrap();
        assert_eq!(reader.count_units().unwrap(), 1);
        assert!(reader.upsert(&sample_unit("c.D", "/x.jar", 1)).is_err());
    }

    #[test]
    fn test_reopen_keeps_schema_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let mut store = UnitStore::open(&path).unwrap();
            store.upsert(&sample_unit("a.B", "/x.jar", 1)).unwrap();
            store.close().unwrap();
        }
        let store = UnitStore::open(&path).unwrap();
        assert_eq!(store.count_units().unwrap(), 1);
    }
}
