//! Unit records - one compiled class found inside one archive
//!
//! A unit is identified by `(qualified_name, archive_path)`. The same class
//! may live in several jars; each copy is its own record.

use serde::{Deserialize, Serialize};

/// File extension of compiled units inside an archive
pub const UNIT_EXTENSION: &str = ".class";

/// Separator the compiler uses for nested and synthetic classes
pub const NESTED_SEPARATOR: char = '$';

/// Method and field signatures of a unit.
///
/// Both lists are empty unless a real [`crate::scanner::MemberDecoder`]
/// fills them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    pub methods: Vec<String>,
    pub fields: Vec<String>,
}

impl Members {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.fields.is_empty()
    }
}

/// A class file extracted from an archive, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
    /// Dot-delimited fully-qualified name (`com.acme.Foo`)
    pub qualified_name: String,
    /// Path of the containing archive
    pub archive_path: String,
    pub members: Members,
    /// Raw entry bytes
    pub payload: Vec<u8>,
    /// Archive modification time in seconds since the epoch
    pub last_modified: i64,
}

impl UnitRecord {
    /// Create a record with empty members
    pub fn new(
        qualified_name: impl Into<String>,
        archive_path: impl Into<String>,
        payload: Vec<u8>,
        last_modified: i64,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            archive_path: archive_path.into(),
            members: Members::default(),
            payload,
            last_modified,
        }
    }

    /// Set the member lists
    pub fn with_members(mut self, members: Members) -> Self {
        self.members = members;
        self
    }

    /// Package of this unit, derived from the qualified name
    pub fn package_name(&self) -> &str {
        package_of(&self.qualified_name)
    }
}

/// Everything before the last dot, or `""` for the default package.
pub fn package_of(qualified_name: &str) -> &str {
    match qualified_name.rfind('.') {
        Some(idx) => &qualified_name[..idx],
        None => "",
    }
}

/// Everything after the last dot.
pub fn simple_name_of(qualified_name: &str) -> &str {
    match qualified_name.rfind('.') {
        Some(idx) => &qualified_name[idx + 1..],
        None => qualified_name,
    }
}

/// Derive the qualified name of an archive entry.
///
/// Returns `None` for entries that are not class files.
pub fn qualified_name_from_entry(entry_name: &str) -> Option<String> {
    let stem = entry_name.strip_suffix(UNIT_EXTENSION)?;
    let name = stem.trim_start_matches('/').replace(['/', '\\'], ".");
    if name.is_empty() {
        return None;
    }
    Some(name)
}

/// Nested, anonymous and compiler-synthesised classes carry a `$`.
pub fn is_nested(qualified_name: &str) -> bool {
    qualified_name.contains(NESTED_SEPARATOR)
}
