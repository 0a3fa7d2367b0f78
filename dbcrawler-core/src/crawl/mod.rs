//! Crawl orchestration.
//!
//! A crawl runs four phases in fixed order:
//!
//! 1. **Schema discovery**: enumerate schemas and apply the schema rule.
//!    Failure here is fatal.
//! 2. **Object retrieval**: per schema, run the retrievers the detail level
//!    asks for, in dependency order. A failing family is recorded and the
//!    crawl moves on.
//! 3. **Reference resolution**: resolve parked foreign keys against every
//!    retrieved schema.
//! 4. **Finalize**: order collections by the sort policy and seal the
//!    result into an immutable [`Catalog`].
//!
//! Schemas may be retrieved concurrently (`max_concurrent_schemas`); the
//! families of one schema always run sequentially.

pub mod report;
mod resolve;

pub use report::{CrawlReport, CrawlWarning, FamilyFailure};

use crate::Result;
use crate::catalog::{Catalog, CrawlInfo, Schema, SchemaFragment, TypeRegistry};
use crate::config::CrawlOptions;
use crate::error::{CrawlError, error_chain};
use crate::models::{ObjectFamily, SchemaRef};
use crate::retrievers::{self, RetrieverContext};
use crate::source::{MetadataRequest, MetadataSource};
use futures::{StreamExt, TryStreamExt, stream};
use std::time::Instant;

/// A finalized catalog plus everything that went wrong while building it.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub catalog: Catalog,
    pub report: CrawlReport,
}

/// Drives one crawl against a metadata source.
///
/// # Example
/// ```rust
/// use dbcrawler_core::config::{CrawlOptions, DetailLevel};
/// use dbcrawler_core::crawl::Crawler;
/// use dbcrawler_core::models::SchemaRef;
/// use dbcrawler_core::source::MemorySource;
///
/// # futures::executor::block_on(async {
/// let mut source = MemorySource::new("example");
/// source.add_schema(&SchemaRef::named("PUBLIC"));
///
/// let options = CrawlOptions::new().with_detail_level(DetailLevel::Minimum);
/// let result = Crawler::new(&source, options)?.crawl().await?;
/// assert_eq!(result.catalog.schemas().len(), 1);
/// # Ok::<(), dbcrawler_core::CrawlError>(())
/// # }).unwrap();
/// ```
pub struct Crawler<'a> {
    source: &'a dyn MetadataSource,
    options: CrawlOptions,
}

impl<'a> Crawler<'a> {
    /// Creates a crawler after validating the options.
    pub fn new(source: &'a dyn MetadataSource, options: CrawlOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { source, options })
    }

    /// Options this crawler runs with
    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Runs the crawl.
    ///
    /// # Errors
    /// Returns `CrawlError::SchemaDiscovery` when schemas cannot be listed,
    /// and `CrawlError::DuplicateObject` under the strict duplicate policy.
    /// Every other failure is recorded in the returned report.
    pub async fn crawl(&self) -> Result<CrawlResult> {
        let started = Instant::now();
        let crawled_at = chrono::Utc::now();
        let source_name = self.source.source_name();

        tracing::info!(
            "Starting crawl of '{}' at detail level {}",
            source_name,
            self.options.detail_level
        );

        let schemas = match self.discover_schemas().await {
            Ok(schemas) => schemas,
            Err(e) => {
                tracing::error!("Schema discovery failed: {}", error_chain(&e));
                return Err(e);
            }
        };
        tracing::info!("Discovered {} schemas", schemas.len());

        let registry = TypeRegistry::new();
        let mut fragments: Vec<SchemaFragment> = stream::iter(
            schemas
                .into_iter()
                .map(|schema| self.crawl_schema(schema, &registry)),
        )
        .buffered(self.options.max_concurrent_schemas)
        .try_collect()
        .await?;

        tracing::debug!("Resolving cross-references");
        resolve::resolve_foreign_keys(&mut fragments);

        let mut report = CrawlReport::default();
        let schemas: Vec<Schema> = fragments
            .into_iter()
            .map(|mut fragment| {
                report.merge(std::mem::take(&mut fragment.report));
                let types = registry.types_in(fragment.schema());
                Schema::seal(fragment, types, self.options.sort_policy)
            })
            .collect();

        let elapsed = started.elapsed();
        let info = CrawlInfo {
            source_name,
            detail_level: self.options.detail_level,
            sort_policy: self.options.sort_policy,
            crawled_at,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            dbcrawler_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let catalog = Catalog::new(info, schemas);

        tracing::info!(
            "Crawl finished in {:.2}s: {} schemas, {} tables, {}",
            elapsed.as_secs_f64(),
            catalog.schemas().len(),
            catalog.tables().count(),
            report.summary()
        );

        Ok(CrawlResult { catalog, report })
    }

    /// Lists schemas visible to the source and applies the schema rule.
    async fn discover_schemas(&self) -> Result<Vec<SchemaRef>> {
        let rule = self.options.inclusion.rule_for(ObjectFamily::Schemas);
        if rule.is_exclude_all() {
            tracing::debug!("Schema rule excludes everything, skipping discovery");
            return Ok(Vec::new());
        }

        let request = MetadataRequest::new(ObjectFamily::Schemas);
        let mut rows = self
            .source
            .fetch(&request)
            .await
            .map_err(CrawlError::schema_discovery)?;

        let mut schemas: Vec<SchemaRef> = Vec::new();
        while let Some(row) = rows.next().await {
            let row = row.map_err(CrawlError::schema_discovery)?;
            let catalog = row
                .non_blank_text("TABLE_CATALOG")
                .or_else(|| row.non_blank_text("TABLE_CAT"));
            let schema = SchemaRef::new(catalog, row.non_blank_text("TABLE_SCHEM"));

            if !rule.include(&schema.full_name()) {
                tracing::debug!("Excluding schema '{}'", schema);
                continue;
            }
            if schemas.contains(&schema) {
                tracing::debug!("Ignoring repeated schema row for '{}'", schema);
                continue;
            }
            schemas.push(schema);
        }

        Ok(schemas)
    }

    /// Retrieves every requested family for one schema.
    async fn crawl_schema(
        &self,
        schema: SchemaRef,
        registry: &TypeRegistry,
    ) -> Result<SchemaFragment> {
        let started = Instant::now();
        let ctx = RetrieverContext {
            source: self.source,
            options: &self.options,
            registry,
        };
        let mut fragment = SchemaFragment::new(schema, self.options.duplicate_policy);
        tracing::debug!("Crawling schema '{}'", fragment.schema());

        for family in ObjectFamily::RETRIEVAL_ORDER {
            if !self.options.detail_level.retrieves(family) {
                tracing::debug!(
                    "Skipping {} for schema '{}': not retrieved at detail level {}",
                    family,
                    fragment.schema(),
                    self.options.detail_level
                );
                continue;
            }

            match retrievers::retrieve(family, &ctx, &mut fragment).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!(
                        "Aborting crawl in schema '{}': {}",
                        fragment.schema(),
                        error_chain(&e)
                    );
                    return Err(e);
                }
                Err(e) => {
                    let failure = family_failure(fragment.schema(), family, &e);
                    fragment.report.record_failure(failure);
                }
            }
        }

        tracing::info!(
            "Schema '{}': {} tables, {} routines, {} sequences, {} synonyms in {:.2}s",
            fragment.schema(),
            fragment.table_count(),
            fragment.routines.len(),
            fragment.sequences.len(),
            fragment.synonyms.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(fragment)
    }
}

/// Builds the report entry for a failed family.
fn family_failure(schema: &SchemaRef, family: ObjectFamily, error: &CrawlError) -> FamilyFailure {
    let owner = match error {
        CrawlError::Retrieval { owner, .. } => owner.clone(),
        _ => schema.full_name(),
    };
    FamilyFailure {
        schema: schema.full_name(),
        family,
        owner,
        message: error_chain(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_failure_names_owner() {
        let schema = SchemaRef::named("PUBLIC");
        let error = CrawlError::retrieval(
            ObjectFamily::Indexes,
            "PUBLIC.INVOICE",
            CrawlError::source_message("indexes query", "timeout"),
        );

        let failure = family_failure(&schema, ObjectFamily::Indexes, &error);
        assert_eq!(failure.schema, "PUBLIC");
        assert_eq!(failure.owner, "PUBLIC.INVOICE");
        assert!(failure.message.contains("timeout"));
    }

    #[test]
    fn test_crawler_rejects_invalid_options() {
        let source = crate::source::MemorySource::new("empty");
        let options = CrawlOptions {
            max_concurrent_schemas: 0,
            ..Default::default()
        };
        assert!(Crawler::new(&source, options).is_err());
    }
}
