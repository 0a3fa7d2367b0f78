//! The schema model.
//!
//! During a crawl each schema is assembled in a [`SchemaFragment`] and data
//! types are shared through the [`TypeRegistry`]. Finalizing turns the
//! fragments into a [`Catalog`]: ordered, immutable, and exposing read-only
//! accessors only.

pub mod builder;
pub mod registry;
pub mod sort;

pub use builder::{PendingForeignKey, SchemaFragment};
pub use registry::TypeRegistry;

use crate::config::{DetailLevel, SortPolicy};
use crate::models::{
    Column, ColumnDataType, ColumnPath, Routine, RoutineColumn, RoutineKey, SchemaRef, Sequence,
    Synonym, Table,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Facts about the crawl that produced a catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlInfo {
    pub source_name: String,
    pub detail_level: DetailLevel,
    pub sort_policy: SortPolicy,
    pub crawled_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub dbcrawler_version: String,
}

/// One finalized schema.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    #[serde(flatten)]
    schema_ref: SchemaRef,
    tables: Vec<Table>,
    routines: Vec<Routine>,
    sequences: Vec<Sequence>,
    synonyms: Vec<Synonym>,
    column_data_types: Vec<Arc<ColumnDataType>>,
}

impl Schema {
    /// Seals a fragment, ordering every named collection by `policy`.
    ///
    /// Routine columns keep their ordinal order: parameter position is
    /// part of a routine's signature.
    pub(crate) fn seal(
        fragment: SchemaFragment,
        column_data_types: Vec<Arc<ColumnDataType>>,
        policy: SortPolicy,
    ) -> Self {
        let schema_ref = fragment.schema().clone();
        let SchemaFragment {
            mut tables,
            mut routines,
            mut sequences,
            mut synonyms,
            ..
        } = fragment;
        let mut column_data_types = column_data_types;

        for table in &mut tables {
            sort::apply(&mut table.columns, policy);
            sort::apply(&mut table.indexes, policy);
            sort::apply(&mut table.foreign_keys, policy);
        }
        sort::apply(&mut tables, policy);
        sort::apply(&mut routines, policy);
        sort::apply(&mut sequences, policy);
        sort::apply(&mut synonyms, policy);
        sort::apply(&mut column_data_types, policy);

        Self {
            schema_ref,
            tables,
            routines,
            sequences,
            synonyms,
            column_data_types,
        }
    }

    /// Catalog and schema names
    pub fn schema_ref(&self) -> &SchemaRef {
        &self.schema_ref
    }

    /// `catalog.schema`
    pub fn full_name(&self) -> String {
        self.schema_ref.full_name()
    }

    /// Tables in finalized order
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Routines in finalized order
    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    /// Sequences in finalized order
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Synonyms in finalized order
    pub fn synonyms(&self) -> &[Synonym] {
        &self.synonyms
    }

    /// Deduplicated column data types owned by this schema
    pub fn column_data_types(&self) -> &[Arc<ColumnDataType>] {
        &self.column_data_types
    }

    /// Looks up a table by unqualified name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Finalized, read-only model of a crawled database.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    info: CrawlInfo,
    schemas: Vec<Schema>,
}

impl Catalog {
    pub(crate) fn new(info: CrawlInfo, schemas: Vec<Schema>) -> Self {
        Self { info, schemas }
    }

    /// How this catalog was crawled
    pub fn info(&self) -> &CrawlInfo {
        &self.info
    }

    /// Schemas in discovery order
    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    /// Looks up a schema by full name
    pub fn schema(&self, full_name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.full_name() == full_name)
    }

    /// Tables of a schema, empty if the schema is unknown
    pub fn tables_of(&self, schema: &str) -> &[Table] {
        self.schema(schema).map(Schema::tables).unwrap_or_default()
    }

    /// Routines of a schema, empty if the schema is unknown
    pub fn routines_of(&self, schema: &str) -> &[Routine] {
        self.schema(schema).map(Schema::routines).unwrap_or_default()
    }

    /// Sequences of a schema, empty if the schema is unknown
    pub fn sequences_of(&self, schema: &str) -> &[Sequence] {
        self.schema(schema).map(Schema::sequences).unwrap_or_default()
    }

    /// Synonyms of a schema, empty if the schema is unknown
    pub fn synonyms_of(&self, schema: &str) -> &[Synonym] {
        self.schema(schema).map(Schema::synonyms).unwrap_or_default()
    }

    /// Column data types of a schema, empty if the schema is unknown
    pub fn column_data_types_of(&self, schema: &str) -> &[Arc<ColumnDataType>] {
        self.schema(schema).map(Schema::column_data_types).unwrap_or_default()
    }

    /// Every table across all schemas
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.schemas.iter().flat_map(|s| s.tables.iter())
    }

    /// Every routine across all schemas
    pub fn routines(&self) -> impl Iterator<Item = &Routine> {
        self.schemas.iter().flat_map(|s| s.routines.iter())
    }

    /// Looks up a table by `schema.name` full name
    pub fn table(&self, full_name: &str) -> Option<&Table> {
        self.tables().find(|t| t.full_name() == full_name)
    }

    /// Columns of a table, empty if the table is unknown
    pub fn columns_of(&self, table_full_name: &str) -> &[Column] {
        self.table(table_full_name)
            .map(|t| t.columns.as_slice())
            .unwrap_or_default()
    }

    /// Columns of the routine with the given lookup key
    pub fn routine_columns_of(&self, routine_key: &RoutineKey) -> &[RoutineColumn] {
        self.routines()
            .find(|r| r.lookup_key() == *routine_key)
            .map(|r| r.columns.as_slice())
            .unwrap_or_default()
    }

    /// Resolves a column path
    pub fn column(&self, path: &ColumnPath) -> Option<&Column> {
        self.table(&path.table_full_name())?.column(&path.column)
    }
}
