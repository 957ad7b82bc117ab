//! Database schema definitions

/// SQL to create the units table
///
/// One row per top-level class per archive. `package_name` is always
/// written from `qualified_name`; `created_at` is filled once by the
/// default and never touched by the upsert.
pub const CREATE_UNITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    qualified_name TEXT NOT NULL,
    package_name TEXT NOT NULL,
    archive_path TEXT NOT NULL,
    methods TEXT,
    fields TEXT,
    payload BLOB,
    last_modified INTEGER NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(qualified_name, archive_path)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_units_qualified_name ON units(qualified_name)",
    "CREATE INDEX IF NOT EXISTS idx_units_package_name ON units(package_name)",
    "CREATE INDEX IF NOT EXISTS idx_units_archive_path ON units(archive_path)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_UNITS_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
