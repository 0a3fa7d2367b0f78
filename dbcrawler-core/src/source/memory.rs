//! Fixture-backed metadata source.
//!
//! Rows are registered per (family, schema, object) and replayed verbatim,
//! quirks included: no ownership filtering is applied beyond the request
//! key, so rows naming case-variant or foreign objects reach the retrievers
//! exactly as a lax driver would deliver them.
//!
//! The source counts queries per family, tracks open cursors and can be
//! told to fail a family, which is what the crawl tests rely on. It can also
//! be loaded from a JSON fixture for offline replay.

use super::{MetadataRequest, MetadataRow, MetadataRows, MetadataSource};
use crate::Result;
use crate::error::CrawlError;
use crate::models::{ObjectFamily, SchemaRef};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// How an injected failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// The query itself is rejected
    OnQuery,
    /// The stream yields this many rows, then an error
    AfterRows(usize),
}

type RowKey = (ObjectFamily, SchemaRef, Option<String>);

/// In-memory metadata source.
#[derive(Debug, Default)]
pub struct MemorySource {
    name: String,
    rows: HashMap<RowKey, Vec<MetadataRow>>,
    failures: HashMap<ObjectFamily, FailureMode>,
    queries: Mutex<HashMap<ObjectFamily, usize>>,
    open_cursors: Arc<AtomicUsize>,
}

/// One recorded query answer in a JSON fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureQuery {
    pub family: ObjectFamily,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    pub rows: Vec<MetadataRow>,
}

/// JSON fixture layout for [`MemorySource::from_json_str`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default = "default_fixture_name")]
    pub name: String,
    pub queries: Vec<FixtureQuery>,
}

fn default_fixture_name() -> String {
    "memory".to_string()
}

/// Decrements the open cursor count when its stream is dropped.
struct CursorGuard(Arc<AtomicUsize>);

impl CursorGuard {
    fn open(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemorySource {
    /// Creates an empty source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Registers a schema row answering the schema discovery query.
    pub fn add_schema(&mut self, schema: &SchemaRef) {
        let row = MetadataRow::new()
            .with("TABLE_CATALOG", schema.catalog.clone())
            .with("TABLE_SCHEM", schema.schema.clone());
        self.rows
            .entry((ObjectFamily::Schemas, SchemaRef::default(), None))
            .or_default()
            .push(row);
    }

    /// Appends rows answering a query for `(family, schema, object)`.
    pub fn add_rows(
        &mut self,
        family: ObjectFamily,
        schema: &SchemaRef,
        object: Option<&str>,
        rows: impl IntoIterator<Item = MetadataRow>,
    ) {
        self.rows
            .entry((family, schema.clone(), object.map(str::to_string)))
            .or_default()
            .extend(rows);
    }

    /// Makes every query for a family fail.
    pub fn fail_family(&mut self, family: ObjectFamily, mode: FailureMode) {
        self.failures.insert(family, mode);
    }

    /// Number of queries issued for a family so far
    pub fn query_count(&self, family: ObjectFamily) -> usize {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&family)
            .copied()
            .unwrap_or(0)
    }

    /// Total queries issued across all families
    pub fn total_queries(&self) -> usize {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    /// Number of row streams handed out and not yet dropped
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Builds a source from a JSON fixture.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json).map_err(|e| CrawlError::Serialization {
            context: "Failed to parse metadata fixture".to_string(),
            source: e,
        })?;

        let mut source = Self::new(fixture.name);
        for query in fixture.queries {
            let schema = SchemaRef::new(query.catalog, query.schema);
            source.add_rows(query.family, &schema, query.object.as_deref(), query.rows);
        }
        Ok(source)
    }

    /// Loads a JSON fixture from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| CrawlError::Io {
            context: format!("Failed to read metadata fixture {}", path.display()),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    fn record_query(&self, family: ObjectFamily) {
        let mut queries = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
        let count = queries.entry(family).or_insert(0);
        *count = count.saturating_add(1);
    }

    fn rows_for(&self, request: &MetadataRequest) -> Vec<MetadataRow> {
        let key = match request.family {
            ObjectFamily::Schemas => (ObjectFamily::Schemas, SchemaRef::default(), None),
            family => (
                family,
                SchemaRef::new(request.catalog.clone(), request.schema.clone()),
                request.object.clone(),
            ),
        };
        let rows = self.rows.get(&key).cloned().unwrap_or_default();

        if request.family == ObjectFamily::Tables && !request.types.is_empty() {
            rows.into_iter()
                .filter(|row| {
                    row.text("TABLE_TYPE")
                        .is_none_or(|t| request.types.iter().any(|wanted| *wanted == t))
                })
                .collect()
        } else {
            rows
        }
    }
}

#[async_trait]
impl MetadataSource for MemorySource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self, request: &MetadataRequest) -> Result<MetadataRows<'_>> {
        self.record_query(request.family);

        let rows = self.rows_for(request);
        let items: Vec<Result<MetadataRow>> = match self.failures.get(&request.family) {
            Some(FailureMode::OnQuery) => {
                return Err(CrawlError::source_message(
                    format!("{} query", request.family),
                    "injected failure",
                ));
            }
            Some(FailureMode::AfterRows(n)) => {
                let mut items: Vec<_> = rows.into_iter().take(*n).map(Ok).collect();
                items.push(Err(CrawlError::source_message(
                    format!("{} cursor", request.family),
                    "injected failure while reading rows",
                )));
                items
            }
            None => rows.into_iter().map(Ok).collect(),
        };

        let guard = CursorGuard::open(&self.open_cursors);
        Ok(stream::iter(items)
            .map(move |item| {
                let _cursor = &guard;
                item
            })
            .boxed())
    }
}
