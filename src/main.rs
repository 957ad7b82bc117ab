//! jarindex CLI - class index for local Maven repositories

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use jarindex::config::{self, ConfigFile};
use jarindex::query::{DEFAULT_SEARCH_LIMIT, QueryService, UnitDetail};
use jarindex::server;
use jarindex::ui::{self, Icons, Spinner};
use jarindex::{Config, Dispatcher, Scanner, UnitStore};

#[derive(Parser)]
#[command(name = "jarindex")]
#[command(version)]
#[command(about = "Class index for local Maven repositories")]
#[command(long_about = r#"
jarindex scans the jars of a local Maven repository, records every top-level
class in SQLite and serves lookups as JSON-RPC tools over stdio.

Example usage:
  jarindex scan
  jarindex search StringUtils
  jarindex detail org.apache.commons.lang3.StringUtils
  jarindex serve
"#)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the TOML config file (default: ./jarindex.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository root to scan (default: ~/.m2/repository)
    #[arg(short, long, global = true)]
    repository: Option<PathBuf>,

    /// Path to the cache database (default: ~/.jarindex/cache.db)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tool protocol on stdin/stdout (default)
    Serve,

    /// Scan the repository and update the index
    Scan {
        /// Rescan every jar, not just modified ones
        #[arg(short, long)]
        force: bool,
    },

    /// Search indexed classes by name or package
    Search {
        /// Fragment of a class or package name, any case
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// Treat the query as a package prefix
        #[arg(short, long)]
        package: bool,
    },

    /// Show one class in detail
    Detail {
        /// Fully qualified class name
        class_name: String,
    },

    /// Show statistics about the index
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    jarindex::logging::init_logging(config.log_level())?;
    config.validate()?;
    tracing::debug!(
        "Repository {}, store {}",
        config.repository_path().display(),
        config.store_path().display()
    );

    let output = if cli.json { OutputMode::Json } else { OutputMode::Human };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_serve(&config).await,
        Commands::Scan { force } => run_scan(&config, force, output),
        Commands::Search { query, limit, package } => {
            run_search(&config, &query, limit, package, output)
        }
        Commands::Detail { class_name } => run_detail(&config, &class_name, output),
        Commands::Stats => run_stats(&config, output),
    }
}

/// Merge CLI flags over environment over the config file
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let verbose = cli.verbose.then(|| "debug".to_string());
    let from_cli = ConfigFile {
        repository: cli.repository.as_deref().map(path_string),
        store: cli.store.as_deref().map(path_string),
        log_level: cli.log_level.clone().or(verbose),
        archive_extension: None,
    };
    let from_file = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    let layer = from_cli.or(ConfigFile::from_env()).or(from_file);
    Config::resolve(layer).context("invalid configuration")
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

async fn run_serve(config: &Config) -> anyhow::Result<()> {
    let mut dispatcher = Dispatcher::open(config)?;
    tracing::info!(
        "Serving index {} for {}",
        config.store_path().display(),
        config.repository_path().display()
    );
    server::run_stdio(&mut dispatcher).await?;
    tracing::info!("Server stopped");
    Ok(())
}

fn run_scan(config: &Config, force: bool, output: OutputMode) -> anyhow::Result<()> {
    let mut scanner = Scanner::open(config)?;

    if output.is_human() {
        ui::header("Scanning repository");
        ui::status(Icons::FOLDER, "Repository", &config.repository_path().display().to_string());
        ui::status(Icons::DATABASE, "Database", &config.store_path().display().to_string());
    }

    let spinner = output.is_human().then(|| {
        let message = if force { "Rescanning all jars" } else { "Scanning modified jars" };
        Spinner::new(message)
    });
    let started = Instant::now();
    let result = scanner.scan(force);
    if let Some(spinner) = &spinner {
        spinner.finish();
    }
    let stats = result?;
    scanner.close()?;

    match output {
        OutputMode::Human => ui::scan_summary(&stats, started.elapsed()),
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}

/// Read-only service over a store that is guaranteed to have its schema
fn open_queries(config: &Config) -> anyhow::Result<QueryService> {
    UnitStore::open(config.store_path())?.close()?;
    Ok(QueryService::open(config)?)
}

fn run_search(
    config: &Config,
    query: &str,
    limit: usize,
    package: bool,
    output: OutputMode,
) -> anyhow::Result<()> {
    let mut queries = open_queries(config)?;
    let results = if package {
        queries.search_by_package(query, limit)?
    } else {
        queries.search(query, limit)?
    };
    queries.close()?;

    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputMode::Human if results.is_empty() => {
            ui::warn(&format!("No classes found for '{}'", query));
        }
        OutputMode::Human => {
            println!(
                "{} {} matching classes for '{}'",
                Icons::SEARCH,
                results.len(),
                query.style(ui::theme().info.clone())
            );
            println!("{}", ui::search_table(&results, Some(config.repository_path())));
        }
    }
    Ok(())
}

fn run_detail(config: &Config, class_name: &str, output: OutputMode) -> anyhow::Result<()> {
    let mut queries = open_queries(config)?;
    let detail = queries.detail(class_name)?;
    queries.close()?;

    let Some(detail) = detail else {
        anyhow::bail!("class not found: {}", class_name);
    };

    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&detail)?),
        OutputMode::Human => print_detail(&detail),
    }
    Ok(())
}

fn print_detail(detail: &UnitDetail) {
    println!("{} {}", Icons::CLASS, ui::class_name(&detail.qualified_name));
    ui::summary_row("Package", &detail.package_name);
    ui::summary_row("Jar", &detail.archive_path);
    for other in detail.archives.iter().filter(|a| **a != detail.archive_path) {
        ui::summary_row("Also in", other);
    }

    for (title, items) in [("Methods", &detail.members.methods), ("Fields", &detail.members.fields)] {
        ui::section(&format!("{} ({})", title, items.len()));
        if items.is_empty() {
            println!("  {}", ui::muted("none recorded"));
        }
        for item in items {
            println!("  {}", item);
        }
    }
}

fn run_stats(config: &Config, output: OutputMode) -> anyhow::Result<()> {
    let mut queries = open_queries(config)?;
    let stats = queries.statistics()?;
    queries.close()?;

    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputMode::Human => {
            println!(
                "{} jarindex statistics ({})",
                Icons::STATS,
                ui::dim(&config.store_path().display().to_string())
            );
            println!("{}", ui::stats_table(&stats));
        }
    }
    Ok(())
}
