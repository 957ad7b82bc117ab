//! Configuration - layered from CLI flags, environment, TOML file and defaults
//!
//! Precedence, highest first: command line, environment (`MAVEN_REPO_PATH`,
//! `CACHE_DB_PATH`, `LOG_LEVEL`), `jarindex.toml`, built-in defaults.
//! The core only ever sees a validated [`Config`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

pub const ENV_REPOSITORY: &str = "MAVEN_REPO_PATH";
pub const ENV_STORE: &str = "CACHE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

pub const DEFAULT_ARCHIVE_EXTENSION: &str = "jar";

/// One configuration layer. Every field is optional; unset fields fall
/// through to the next layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub repository: Option<String>,
    pub store: Option<String>,
    pub log_level: Option<String>,
    pub archive_extension: Option<String>,
}

impl ConfigFile {
    /// Layer read from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            repository: non_empty(ENV_REPOSITORY),
            store: non_empty(ENV_STORE),
            log_level: non_empty(ENV_LOG_LEVEL),
            archive_extension: None,
        }
    }

    /// Fill unset fields from a lower-precedence layer
    pub fn or(self, lower: ConfigFile) -> ConfigFile {
        ConfigFile {
            repository: self.repository.or(lower.repository),
            store: self.store.or(lower.store),
            log_level: self.log_level.or(lower.log_level),
            archive_extension: self.archive_extension.or(lower.archive_extension),
        }
    }
}

/// Log verbosity accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(Error::Config(format!("invalid log level: {}", s))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated configuration consumed by the scanner, query service and server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    repository_path: PathBuf,
    store_path: PathBuf,
    log_level: LogLevel,
    archive_extension: String,
}

impl Config {
    /// Build a configuration directly (defaults for level and extension)
    pub fn new(repository_path: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            repository_path: repository_path.into(),
            store_path: store_path.into(),
            log_level: LogLevel::default(),
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
        }
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_archive_extension(mut self, extension: impl Into<String>) -> Self {
        self.archive_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Resolve a merged layer against the built-in defaults
    pub fn resolve(layer: ConfigFile) -> Result<Self> {
        let repository_path = match layer.repository {
            Some(p) => absolutize(&expand_home(&p))?,
            None => default_repository_path()?,
        };
        let store_path = match layer.store {
            Some(p) => absolutize(&expand_home(&p))?,
            None => default_store_path()?,
        };
        let log_level = match layer.log_level {
            Some(level) => level.parse()?,
            None => LogLevel::default(),
        };
        let extension = layer
            .archive_extension
            .unwrap_or_else(|| DEFAULT_ARCHIVE_EXTENSION.to_string());

        Ok(Self::new(repository_path, store_path)
            .with_log_level(log_level)
            .with_archive_extension(extension))
    }

    /// Check the repository exists and prepare the store directory
    pub fn validate(&self) -> Result<()> {
        if !self.repository_path.is_dir() {
            return Err(Error::Config(format!(
                "repository directory does not exist: {}",
                self.repository_path.display()
            )));
        }
        if self.archive_extension.is_empty() {
            return Err(Error::Config("archive extension must not be empty".into()));
        }
        ensure_db_dir(&self.store_path)
    }

    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn archive_extension(&self) -> &str {
        &self.archive_extension
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("jarindex.toml")
}

pub fn default_repository_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".m2").join("repository"))
}

pub fn default_store_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".jarindex").join("cache.db"))
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| Error::Config("could not determine home directory".into()))
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Load the TOML layer; a missing file is not an error
pub fn load_config(path: Option<&Path>) -> Result<Option<ConfigFile>> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        if explicit {
            return Err(Error::Config(format!("config file not found: {}", path.display())));
        }
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ConfigFile = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
