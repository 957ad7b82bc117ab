//! Incremental repository scanner
//!
//! Walks the repository for archives, skips the ones whose modification
//! time is not newer than what the store already recorded, and upserts the
//! classes of the rest. Work is strictly sequential: one archive at a time,
//! one entry at a time.

pub mod archive;
pub mod walk;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Config;
use crate::storage::{UnitStore, UpsertCounts};
use crate::Result;

pub use archive::{MemberDecoder, PlaceholderDecoder, read_archive};
pub use walk::{find_archives, mtime_seconds};

/// Totals reported by one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub scanned_archives: usize,
    pub new_units: usize,
    pub updated_units: usize,
}

impl std::fmt::Display for ScanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} archives scanned, {} new classes, {} updated classes",
            self.scanned_archives, self.new_units, self.updated_units
        )
    }
}

/// Result of looking at a single archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveScan {
    /// Not newer than the recorded modification time
    UpToDate,
    Scanned(UpsertCounts),
}

/// Owns the only writer handle on the store.
pub struct Scanner {
    store: UnitStore,
    root: PathBuf,
    extension: String,
    decoder: Box<dyn MemberDecoder>,
}

impl Scanner {
    /// Open the writer store named by the configuration
    pub fn open(config: &Config) -> Result<Self> {
        let store = UnitStore::open(config.store_path())?;
        Ok(Self::new(
            store,
            config.repository_path(),
            config.archive_extension(),
        ))
    }

    pub fn new(store: UnitStore, root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            store,
            root: root.into(),
            extension: extension.into(),
            decoder: Box::new(PlaceholderDecoder),
        }
    }

    /// Replace the member decoder
    pub fn with_decoder(mut self, decoder: impl MemberDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &UnitStore {
        &self.store
    }

    /// Bring the store up to date with the repository.
    ///
    /// Archives that cannot be read are logged and left out of the totals.
    /// Storage failures abort the scan.
    pub fn scan(&mut self, force: bool) -> Result<ScanStats> {
        let started = Instant::now();
        tracing::info!(
            "Scanning {} for *.{} archives (force: {})",
            self.root.display(),
            self.extension,
            force
        );

        let archives = find_archives(&self.root, &self.extension);
        let mut stats = ScanStats::default();
        let mut skipped = 0usize;

        for archive in &archives {
            match self.scan_archive(archive, force) {
                Ok(ArchiveScan::UpToDate) => {}
                Ok(ArchiveScan::Scanned(counts)) => {
                    stats.scanned_archives += 1;
                    stats.new_units += counts.inserted;
                    stats.updated_units += counts.updated;
                }
                Err(e) if e.is_archive_local() => {
                    skipped += 1;
                    tracing::warn!("Skipping archive {}: {}", archive.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        if skipped > 0 {
            tracing::warn!("{} archives could not be read", skipped);
        }
        tracing::info!(
            "Scan complete in {:?}: {} of {} archives, {} new, {} updated",
            started.elapsed(),
            stats.scanned_archives,
            archives.len(),
            stats.new_units,
            stats.updated_units
        );
        Ok(stats)
    }

    /// Scan one archive unless it is up to date
    pub fn scan_archive(&mut self, path: &Path, force: bool) -> Result<ArchiveScan> {
        let mtime = mtime_seconds(path)?;
        let key = path.to_string_lossy();
        if !force && !self.store.is_stale(&key, mtime)? {
            return Ok(ArchiveScan::UpToDate);
        }

        tracing::debug!("Scanning archive {}", path.display());
        let units = read_archive(path, mtime, self.decoder.as_ref())?;
        let counts = self.store.upsert_batch(&units)?;
        Ok(ArchiveScan::Scanned(counts))
    }

    /// Close the writer handle. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::{Duration, UNIX_EPOCH};
    use zip::write::FileOptions;

    fn write_jar(path: &Path, entries: &[&str], mtime: u64) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default();
        for name in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(name.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        set_mtime(path, mtime);
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    fn scanner_for(root: &Path) -> Scanner {
        Scanner::new(UnitStore::open_in_memory().unwrap(), root, "jar")
    }

    #[test]
    fn test_scan_counts_new_units() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(&dir.path().join("a/a.jar"), &["com/acme/A.class", "com/acme/B.class"], 1000);
        write_jar(&dir.path().join("b/b.jar"), &["org/x/C.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        let stats = scanner.scan(false).unwrap();
        assert_eq!(stats, ScanStats { scanned_archives: 2, new_units: 3, updated_units: 0 });
        assert_eq!(scanner.store().count_units().unwrap(), 3);
    }

    #[test]
    fn test_unchanged_archives_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(&dir.path().join("a.jar"), &["com/acme/A.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        scanner.scan(false).unwrap();
        let again = scanner.scan(false).unwrap();
        assert_eq!(again, ScanStats::default());
        assert_eq!(scanner.store().count_units().unwrap(), 1);
    }

    #[test]
    fn test_forced_rescan_updates_every_unit() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(&dir.path().join("a.jar"), &["com/acme/A.class", "com/acme/B.class"], 1000);
        write_jar(&dir.path().join("b.jar"), &["com/acme/A.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        scanner.scan(false).unwrap();
        let forced = scanner.scan(true).unwrap();
        assert_eq!(forced, ScanStats { scanned_archives: 2, new_units: 0, updated_units: 3 });
        assert_eq!(scanner.store().count_units().unwrap(), 3);
    }

    #[test]
    fn test_newer_archive_is_rescanned() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        write_jar(&jar, &["com/acme/A.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        scanner.scan(false).unwrap();

        write_jar(&jar, &["com/acme/A.class", "com/acme/New.class"], 2000);
        let stats = scanner.scan(false).unwrap();
        assert_eq!(stats, ScanStats { scanned_archives: 1, new_units: 1, updated_units: 1 });

        let key = jar.to_string_lossy();
        assert_eq!(scanner.store().archive_last_modified(&key).unwrap(), Some(2000));
    }

    #[test]
    fn test_nested_units_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(
            &dir.path().join("a.jar"),
            &["com/acme/Foo.class", "com/acme/Foo$Inner.class"],
            1000,
        );

        let mut scanner = scanner_for(dir.path());
        let stats = scanner.scan(false).unwrap();
        assert_eq!(stats.new_units, 1);
        let unit = scanner.store().find_unit("com.acme.Foo").unwrap().unwrap();
        assert_eq!(unit.package_name, "com.acme");
        assert!(scanner.store().find_unit("com.acme.Foo$Inner").unwrap().is_none());
    }

    struct NameDecoder;

    impl MemberDecoder for NameDecoder {
        fn decode(&self, qualified_name: &str, _payload: &[u8]) -> crate::unit::Members {
            crate::unit::Members {
                methods: vec![format!("{}()", qualified_name)],
                fields: vec!["id".to_string()],
            }
        }
    }

    #[test]
    fn test_decoder_members_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(&dir.path().join("a.jar"), &["com/acme/A.class"], 1000);

        let mut scanner = scanner_for(dir.path()).with_decoder(NameDecoder);
        scanner.scan(false).unwrap();
        let unit = scanner.store().find_unit("com.acme.A").unwrap().unwrap();
        assert_eq!(unit.methods.as_deref(), Some(r#"["com.acme.A()"]"#));
        assert_eq!(unit.fields.as_deref(), Some(r#"["id"]"#));
    }

    #[test]
    fn test_corrupt_archive_does_not_abort_scan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a-broken.jar"), b"not a zip").unwrap();
        write_jar(&dir.path().join("b-good.jar"), &["com/acme/Good.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        let stats = scanner.scan(false).unwrap();
        assert_eq!(stats, ScanStats { scanned_archives: 1, new_units: 1, updated_units: 0 });
    }

    #[test]
    fn test_forged_entry_size_does_not_abort_scan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a-forged.jar"),
            archive::tests::forged_size_jar("com/acme/Big.class", b"cafebabe"),
        )
        .unwrap();
        write_jar(&dir.path().join("b-good.jar"), &["com/acme/Good.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        let stats = scanner.scan(false).unwrap();
        assert_eq!(stats, ScanStats { scanned_archives: 2, new_units: 2, updated_units: 0 });
        let (_, payload) = scanner.store().find_payload("com.acme.Big", None).unwrap().unwrap();
        assert_eq!(payload, b"cafebabe");
    }

    #[test]
    fn test_other_extensions_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(&dir.path().join("a.war"), &["com/acme/A.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        assert_eq!(scanner.scan(false).unwrap(), ScanStats::default());

        let mut war_scanner = Scanner::new(UnitStore::open_in_memory().unwrap(), dir.path(), "war");
        assert_eq!(war_scanner.scan(false).unwrap().new_units, 1);
    }

    #[test]
    fn test_scan_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(&dir.path().join("a.jar"), &["com/acme/A.class"], 1000);

        let mut scanner = scanner_for(dir.path());
        scanner.close().unwrap();
        scanner.close().unwrap();
        assert!(matches!(scanner.scan(false), Err(crate::Error::StoreClosed)));
    }
}
