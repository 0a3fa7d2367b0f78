//! Retrievers: one per object family.
//!
//! Each retriever queries the metadata source for its family, maps every
//! row onto a model object with a default for every field, re-checks that
//! the row really belongs to the schema being crawled, applies the family's
//! inclusion rule and only then attaches the object to the fragment.
//!
//! # Module Structure
//! - `tables`: tables, columns and primary keys
//! - `indexes`: index definitions grouped per table
//! - `foreign_keys`: imported keys, parked for later resolution
//! - `routines`: routines and their parameter/result columns
//! - `sequences`, `synonyms`: simple schema-owned objects
//! - `data_types`: the type-info query feeding the type registry

mod data_types;
mod foreign_keys;
mod indexes;
mod routines;
mod sequences;
mod synonyms;
mod tables;

use crate::Result;
use crate::catalog::{SchemaFragment, TypeRegistry};
use crate::config::{AttributeDepth, CrawlOptions};
use crate::error::CrawlError;
use crate::inclusion::InclusionRule;
use crate::models::{Attributes, ObjectFamily, SchemaRef};
use crate::source::{MetadataRequest, MetadataRow, MetadataSource};
use futures::StreamExt;

/// Everything a retriever needs besides the fragment it fills.
pub(crate) struct RetrieverContext<'a> {
    pub source: &'a dyn MetadataSource,
    pub options: &'a CrawlOptions,
    pub registry: &'a TypeRegistry,
}

impl RetrieverContext<'_> {
    /// Inclusion rule for a family
    pub fn rule(&self, family: ObjectFamily) -> &InclusionRule {
        self.options.inclusion.rule_for(family)
    }

    /// Attribute depth for a family at the configured detail level
    pub fn depth(&self, family: ObjectFamily) -> AttributeDepth {
        self.options.detail_level.depth(family)
    }

    /// A request for a family scoped to one schema
    pub fn request(&self, family: ObjectFamily, schema: &SchemaRef) -> MetadataRequest {
        MetadataRequest::new(family).in_schema(schema.catalog.as_deref(), schema.schema.as_deref())
    }
}

/// Runs the retriever for one family against one schema.
///
/// A family governed by an exclude-all rule returns before any query.
pub(crate) async fn retrieve(
    family: ObjectFamily,
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    if ctx.rule(family).is_exclude_all() {
        tracing::debug!(
            "Skipping {} for schema '{}': excluded by rule",
            family,
            fragment.schema()
        );
        return Ok(());
    }

    match family {
        ObjectFamily::Schemas => Ok(()),
        ObjectFamily::ColumnDataTypes => data_types::retrieve_data_types(ctx, fragment).await,
        ObjectFamily::Tables => tables::retrieve_tables(ctx, fragment).await,
        ObjectFamily::Columns => tables::retrieve_columns(ctx, fragment).await,
        ObjectFamily::PrimaryKeys => tables::retrieve_primary_keys(ctx, fragment).await,
        ObjectFamily::Indexes => indexes::retrieve_indexes(ctx, fragment).await,
        ObjectFamily::ForeignKeys => foreign_keys::retrieve_foreign_keys(ctx, fragment).await,
        ObjectFamily::Routines => routines::retrieve_routines(ctx, fragment).await,
        ObjectFamily::RoutineColumns => routines::retrieve_routine_columns(ctx, fragment).await,
        ObjectFamily::Sequences => sequences::retrieve_sequences(ctx, fragment).await,
        ObjectFamily::Synonyms => synonyms::retrieve_synonyms(ctx, fragment).await,
    }
}

/// Streams the rows of one request through `handle`.
///
/// Every error, whether from the query, the cursor or the handler, is
/// wrapped as a retrieval error naming the family and the owning object.
/// The row stream is dropped on every return path.
pub(crate) async fn for_each_row<F>(
    ctx: &RetrieverContext<'_>,
    request: &MetadataRequest,
    owner: &str,
    mut handle: F,
) -> Result<usize>
where
    F: FnMut(MetadataRow) -> Result<()>,
{
    let family = request.family;
    let mut rows = ctx
        .source
        .fetch(request)
        .await
        .map_err(|e| CrawlError::retrieval(family, owner, e))?;

    let mut count = 0usize;
    while let Some(row) = rows.next().await {
        let row = row.map_err(|e| CrawlError::retrieval(family, owner, e))?;
        tracing::trace!("{} row for {}: {:?}", family, owner, row);
        handle(row).map_err(|e| CrawlError::retrieval(family, owner, e))?;
        count = count.saturating_add(1);
    }
    Ok(count)
}

/// True when a row's catalog/schema fields name the schema being crawled.
pub(crate) fn belongs_to_schema(
    schema: &SchemaRef,
    row: &MetadataRow,
    catalog_field: &str,
    schema_field: &str,
) -> bool {
    schema.matches(
        row.text(catalog_field).as_deref(),
        row.text(schema_field).as_deref(),
    )
}

/// Remarks, unless the depth drops them.
pub(crate) fn remarks(row: &MetadataRow, depth: AttributeDepth) -> Option<String> {
    match depth {
        AttributeDepth::NamesOnly => None,
        _ => row.non_blank_text("REMARKS"),
    }
}

/// Unrecognised fields, kept only at extended depth.
pub(crate) fn attributes(row: &MetadataRow, depth: AttributeDepth, known: &[&str]) -> Attributes {
    match depth {
        AttributeDepth::Extended => row.extra_attributes(known),
        _ => Attributes::new(),
    }
}

/// Reads a non-negative count-like field as u32.
pub(crate) fn sequence_number(row: &MetadataRow, field: &str) -> u32 {
    u32::try_from(row.int_or(field, 0)).unwrap_or(0)
}

/// Reads a native type code, defaulting to 0 when absent or out of range.
pub(crate) fn type_code(row: &MetadataRow, field: &str) -> i32 {
    i32::try_from(row.int_or(field, 0)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_belongs_to_schema() {
        let schema = SchemaRef::new(Some("DB".to_string()), Some("PUBLIC".to_string()));
        let row = MetadataRow::new()
            .with("TABLE_CAT", "DB")
            .with("TABLE_SCHEM", "PUBLIC");
        assert!(belongs_to_schema(&schema, &row, "TABLE_CAT", "TABLE_SCHEM"));

        let row = MetadataRow::new().with("TABLE_SCHEM", "PUBLIC");
        assert!(belongs_to_schema(&schema, &row, "TABLE_CAT", "TABLE_SCHEM"));

        let row = MetadataRow::new()
            .with("TABLE_CAT", "DB")
            .with("TABLE_SCHEM", "public");
        assert!(!belongs_to_schema(&schema, &row, "TABLE_CAT", "TABLE_SCHEM"));
    }

    #[test]
    fn test_depth_controls_remarks_and_attributes() {
        let row = MetadataRow::new()
            .with("TABLE_NAME", "T")
            .with("REMARKS", "a table")
            .with("OWNER", "sa");

        assert_eq!(remarks(&row, AttributeDepth::NamesOnly), None);
        assert_eq!(remarks(&row, AttributeDepth::Full).as_deref(), Some("a table"));
        assert!(attributes(&row, AttributeDepth::Full, &["TABLE_NAME"]).is_empty());

        let extra = attributes(&row, AttributeDepth::Extended, &["TABLE_NAME", "REMARKS"]);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra.get("OWNER").map(String::as_str), Some("sa"));
    }

    #[test]
    fn test_numeric_defaults() {
        let row = MetadataRow::new().with("KEY_SEQ", -3).with("DATA_TYPE", "x");
        assert_eq!(sequence_number(&row, "KEY_SEQ"), 0);
        assert_eq!(type_code(&row, "DATA_TYPE"), 0);
        assert_eq!(type_code(&row, "MISSING"), 0);
    }
}
