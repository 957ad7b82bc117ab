//! Reading class entries out of one archive

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use zip::ZipArchive;

use crate::unit::{Members, UnitRecord, is_nested, qualified_name_from_entry};
use crate::{Error, Result};

/// Extracts method and field signatures from a class-file payload.
pub trait MemberDecoder: Send + Sync {
    fn decode(&self, qualified_name: &str, payload: &[u8]) -> Members;
}

/// Leaves both member lists empty. Payloads are stored verbatim and not
/// parsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderDecoder;

impl MemberDecoder for PlaceholderDecoder {
    fn decode(&self, _qualified_name: &str, _payload: &[u8]) -> Members {
        Members::default()
    }
}

/// Read every top-level class entry of an archive.
///
/// Entries are read one at a time, each fully before the next. Directories,
/// non-class entries and nested classes are skipped; a repeated entry name
/// keeps its first occurrence.
pub fn read_archive(
    path: &Path,
    last_modified: i64,
    decoder: &dyn MemberDecoder,
) -> Result<Vec<UnitRecord>> {
    let archive_key = path.to_string_lossy().to_string();
    let zip_error = |source| Error::Archive {
        path: archive_key.clone(),
        source,
    };

    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(zip_error)?;

    let mut seen = HashSet::new();
    let mut units = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_error)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = qualified_name_from_entry(entry.name()) else {
            continue;
        };
        if is_nested(&name) || !seen.insert(name.clone()) {
            continue;
        }

        // The declared size comes from the archive and is not trusted.
        let mut payload = Vec::new();
        entry.read_to_end(&mut payload)?;

        let members = decoder.decode(&name, &payload);
        units.push(
            UnitRecord::new(name, archive_key.clone(), payload, last_modified).with_members(members),
        );
    }

    tracing::debug!("Read {} classes from {}", units.len(), archive_key);
    Ok(units)
}
