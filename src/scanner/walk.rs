//! Archive discovery under the repository root

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Recursively list files with the given extension, sorted by path.
///
/// Unreadable directories are logged and skipped; the walk itself never
/// fails.
pub fn find_archives(root: &Path, extension: &str) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();

    let mut archives = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable path under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|e| e == extension) {
            archives.push(path.to_path_buf());
        }
    }

    archives.sort();
    archives
}

/// Modification time of a file in whole seconds since the epoch
pub fn mtime_seconds(path: &Path) -> std::io::Result<i64> {
    let modified = path.metadata()?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0))
}

/// Seconds since the epoch for a `SystemTime` read back from the store
pub fn to_system_time(seconds: i64) -> SystemTime {
    UNIX_EPOCH + std::time::Duration::from_secs(seconds.max(0) as u64)
}
