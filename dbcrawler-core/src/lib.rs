//! Crawl orchestration and schema-model assembly for dbcrawler.
//!
//! This crate crawls a database through a metadata source and assembles a
//! cross-referenced, immutable model of its structure: schemas, tables,
//! columns, routines, sequences, synonyms, indexes, foreign keys and the
//! shared column data types.
//!
//! # Architecture
//! - `source`: the metadata source contract plus in-memory and SQLite sources
//! - `retrievers`: one retriever per object family
//! - `catalog`: the in-progress builder, type registry and finalized catalog
//! - `crawl`: the orchestrator and the crawl report
//! - `traversal`: read-only visitor contract for renderers
//!
//! # Guarantees
//! - A finalized catalog exposes no mutation methods
//! - Every foreign key in a catalog resolves to real columns
//! - One shared `ColumnDataType` instance per (schema, type name)
//! - All database access is read-only; connection strings are redacted

pub mod catalog;
pub mod config;
pub mod crawl;
pub mod error;
pub mod inclusion;
pub mod logging;
pub mod models;
mod retrievers;
pub mod source;
pub mod traversal;

// Re-export commonly used types
pub use catalog::{Catalog, CrawlInfo, Schema};
pub use config::{CrawlOptions, DetailLevel, DuplicatePolicy, SortPolicy};
pub use crawl::{CrawlReport, CrawlResult, CrawlWarning, Crawler, FamilyFailure};
pub use error::{CrawlError, Result};
pub use inclusion::InclusionRule;
pub use source::{MemorySource, MetadataRequest, MetadataRow, MetadataSource};
pub use traversal::{SchemaObject, TraversalHandler, traverse};
