//! Database metadata crawler.
//!
//! Connects to a database (or replays a recorded JSON fixture), crawls its
//! structure and lists the resulting catalog as text or JSON.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - Credentials are redacted before anything is logged

mod output;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dbcrawler_core::{
    CrawlOptions, Crawler, DetailLevel, InclusionRule, MemorySource, MetadataSource, SortPolicy,
    error::redact_database_url, logging::init_logging,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dbcrawler")]
#[command(about = "Database metadata crawler")]
#[command(version)]
#[command(long_about = "
dbcrawler - crawl a database and list its structure

Retrieves schemas, tables, columns, keys, indexes, routines, sequences,
synonyms and data types, cross-references them, and prints the result.

SUPPORTED SOURCES:
- SQLite (sqlite:// URLs or .db/.sqlite/.sqlite3 files)
- Recorded metadata fixtures (.json files)

EXAMPLES:
  dbcrawler crawl sqlite:///path/to/database.db
  dbcrawler crawl --info-level maximum --format json --output catalog.json app.db
  dbcrawler crawl --tables 'main\\.(invoice|item)' app.db
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Crawl a database and list its structure
    Crawl(CrawlArgs),
    /// List what each detail level retrieves
    Levels,
}

#[derive(Args)]
pub struct CrawlArgs {
    /// Database connection URL or fixture path
    #[arg(
        env = "DATABASE_URL",
        help = "Database connection string (credentials will be sanitized in logs)"
    )]
    pub database_url: String,

    /// Detail level
    #[arg(long, help = "minimum, basic, standard, detailed or maximum")]
    pub info_level: Option<DetailLevel>,

    /// Sort policy
    #[arg(long, help = "natural (retrieval order) or alphabetical")]
    pub sort: Option<SortPolicy>,

    /// Tables to include
    #[arg(long, help = "Regular expression matched against SCHEMA.TABLE")]
    pub tables: Option<String>,

    /// Tables to exclude
    #[arg(long, help = "Regular expression of tables to leave out")]
    pub exclude_tables: Option<String>,

    /// Schemas to include
    #[arg(long, help = "Regular expression matched against schema names")]
    pub schemas: Option<String>,

    /// Table types to retrieve
    #[arg(long, value_delimiter = ',', help = "Comma-separated table types (TABLE,VIEW)")]
    pub table_types: Vec<String>,

    /// Crawl options file
    #[arg(long, help = "JSON file with crawl options; flags override it")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Output file path
    #[arg(short, long, help = "Write output to a file instead of stdout")]
    pub output: Option<PathBuf>,

    /// Enable compression
    #[arg(long, help = "Compress output file using Zstandard")]
    pub compress: bool,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logging except errors")]
    pub quiet: bool,
}

/// Available output formats
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Indented plain-text listing
    Text,
    /// JSON catalog plus crawl report
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Crawl(args) => crawl(args).await,
        Command::Levels => {
            list_levels();
            Ok(())
        }
    }
}

/// Builds crawl options from the config file and command-line flags.
fn build_options(args: &CrawlArgs) -> anyhow::Result<CrawlOptions> {
    let mut options = match &args.config {
        Some(path) => CrawlOptions::from_json_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => CrawlOptions::new(),
    };

    if let Some(level) = args.info_level {
        options = options.with_detail_level(level);
    }
    if let Some(sort) = args.sort {
        options = options.with_sort_policy(sort);
    }
    if let Some(schemas) = &args.schemas {
        options = options.with_schema_rule(InclusionRule::new(schemas, None)?);
    }
    if args.tables.is_some() || args.exclude_tables.is_some() {
        let include = args.tables.as_deref().unwrap_or(".*");
        let rule = InclusionRule::new(include, args.exclude_tables.as_deref())?;
        options = options.with_table_rule(rule);
    }
    if !args.table_types.is_empty() {
        options = options.with_table_types(args.table_types.iter().cloned());
    }

    options.validate()?;
    Ok(options)
}

/// Opens the metadata source named by a connection string.
async fn open_source(database_url: &str) -> anyhow::Result<Box<dyn MetadataSource>> {
    if database_url.ends_with(".json") {
        let source = MemorySource::from_json_file(database_url)
            .with_context(|| format!("Failed to load fixture {}", database_url))?;
        return Ok(Box::new(source));
    }

    #[cfg(feature = "sqlite")]
    {
        use dbcrawler_core::source::{SqliteSource, sqlite::is_sqlite_connection_string};
        if is_sqlite_connection_string(database_url) {
            let source = SqliteSource::new(database_url).await?;
            return Ok(Box::new(source));
        }
    }

    bail!(
        "Unsupported connection string: {}",
        redact_database_url(database_url)
    )
}

async fn crawl(args: &CrawlArgs) -> anyhow::Result<()> {
    let options = build_options(args)?;
    info!("Target: {}", redact_database_url(&args.database_url));

    let source = open_source(&args.database_url).await?;
    let result = Crawler::new(source.as_ref(), options)?.crawl().await?;

    if !result.report.is_clean() {
        warn!("Crawl finished with {}", result.report.summary());
    }

    let rendered = match args.format {
        OutputFormat::Text => output::render_text(&result.catalog)?,
        OutputFormat::Json => output::render_json(&result)?,
    };
    output::write_output(&rendered, args.output.as_deref(), args.compress).await?;

    if let Some(path) = &args.output {
        info!("Output written to {}", path.display());
    }
    Ok(())
}

fn list_levels() {
    for level in DetailLevel::ALL {
        let families: Vec<String> = level.families().iter().map(ToString::to_string).collect();
        println!("{:<9} schemas, {}", level.to_string(), families.join(", "));
    }
}
