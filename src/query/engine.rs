//! Query service implementation
//!
//! Provides the read-only operations behind the tool protocol:
//! - Ranked substring search over class and package names
//! - Package prefix listing
//! - Exact lookups for detail and payload
//! - Aggregate statistics

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::time::SystemTime;

use crate::config::Config;
use crate::scanner::walk::to_system_time;
use crate::storage::{DbStats, StoredUnit, UnitStore};
use crate::unit::Members;
use crate::Result;

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Why a search hit matched, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact = 1,
    NamePrefix = 2,
    PackagePrefix = 3,
    Substring = 4,
}

impl MatchTier {
    fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(MatchTier::Exact),
            2 => Some(MatchTier::NamePrefix),
            3 => Some(MatchTier::PackagePrefix),
            4 => Some(MatchTier::Substring),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::NamePrefix => "name prefix",
            MatchTier::PackagePrefix => "package prefix",
            MatchTier::Substring => "substring",
        }
    }
}

/// A class as returned by searches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
    pub qualified_name: String,
    pub package_name: String,
    pub archive_path: String,
    pub members: Members,
    /// Set for ranked searches only
    pub tier: Option<MatchTier>,
}

/// Full record of one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitDetail {
    pub qualified_name: String,
    pub package_name: String,
    pub archive_path: String,
    pub members: Members,
    pub last_modified: SystemTime,
    pub created_at: SystemTime,
    /// Every archive holding a class with this name, in path order
    pub archives: Vec<String>,
}

/// Transport encoding of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Base64,
}

impl PayloadEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadEncoding::Base64 => "base64",
        }
    }
}

/// Raw class-file bytes, encoded for a text transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitPayload {
    pub qualified_name: String,
    pub archive_path: String,
    pub encoding: PayloadEncoding,
    pub data: String,
}

/// Aggregate counts over the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_units: usize,
    pub distinct_classes: usize,
    pub distinct_packages: usize,
    pub distinct_archives: usize,
}

impl From<DbStats> for Statistics {
    fn from(stats: DbStats) -> Self {
        Self {
            total_units: stats.units,
            distinct_classes: stats.classes,
            distinct_packages: stats.packages,
            distinct_archives: stats.archives,
        }
    }
}

/// Read-only view over the store
pub struct QueryService {
    store: UnitStore,
}

impl QueryService {
    /// Open a read-only handle on the configured store
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(UnitStore::open_read_only(config.store_path())?))
    }

    pub fn new(store: UnitStore) -> Self {
        Self { store }
    }

    /// Search class and package names for `query`
    ///
    /// Substring match ignoring ASCII case. Results are ordered exact name,
    /// name prefix, package prefix, other; each tier by name.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<UnitSummary>> {
        let rows = self.store.search_units(query, limit)?;
        Ok(rows.into_iter().map(to_summary).collect())
    }

    /// Classes whose package starts with `package_prefix`, by name
    pub fn search_by_package(&self, package_prefix: &str, limit: usize) -> Result<Vec<UnitSummary>> {
        let rows = self.store.units_in_package(package_prefix, limit)?;
        Ok(rows.into_iter().map(to_summary).collect())
    }

    /// Exact lookup of a class; `None` if it was never indexed
    pub fn detail(&self, qualified_name: &str) -> Result<Option<UnitDetail>> {
        let Some(row) = self.store.find_unit(qualified_name)? else {
            return Ok(None);
        };
        let archives = self.store.archives_of(qualified_name)?;
        let members = decode_members(&row);

        Ok(Some(UnitDetail {
            qualified_name: row.qualified_name,
            package_name: row.package_name,
            archive_path: row.archive_path,
            members,
            last_modified: to_system_time(row.last_modified),
            created_at: to_system_time(row.created_at),
            archives,
        }))
    }

    /// Class-file bytes, base64 encoded, optionally from one archive
    pub fn payload(
        &self,
        qualified_name: &str,
        archive_path: Option<&str>,
    ) -> Result<Option<UnitPayload>> {
        let found = self.store.find_payload(qualified_name, archive_path)?;
        Ok(found.map(|(archive_path, bytes)| UnitPayload {
            qualified_name: qualified_name.to_string(),
            archive_path,
            encoding: PayloadEncoding::Base64,
            data: STANDARD.encode(bytes),
        }))
    }

    pub fn statistics(&self) -> Result<Statistics> {
        Ok(self.store.stats()?.into())
    }

    /// Close the read handle. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}

fn to_summary(row: StoredUnit) -> UnitSummary {
    let members = decode_members(&row);
    UnitSummary {
        tier: MatchTier::from_rank(row.rank),
        qualified_name: row.qualified_name,
        package_name: row.package_name,
        archive_path: row.archive_path,
        members,
    }
}

fn decode_members(row: &StoredUnit) -> Members {
    Members {
        methods: decode_list(row.methods.as_deref(), "methods", &row.qualified_name),
        fields: decode_list(row.fields.as_deref(), "fields", &row.qualified_name),
    }
}

/// Parse a stored JSON string list; anything malformed becomes empty
fn decode_list(raw: Option<&str>, column: &str, qualified_name: &str) -> Vec<String> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Malformed {} for {}: {}", column, qualified_name, e);
            Vec::new()
        }
    }
}
