//! Configuration types for crawls and metadata sources.
//!
//! - `CrawlOptions`: detail level, inclusion rules, ordering, duplicates
//! - `DetailLevel`: which families run and at what depth
//! - `ConnectionConfig`: settings for database-backed sources

mod connection;
mod crawl;
mod detail;

pub use connection::ConnectionConfig;
pub use crawl::{CrawlOptions, DuplicatePolicy, InclusionRules, SortPolicy};
pub use detail::{AttributeDepth, DetailLevel};
