//! Table, column and primary key retrieval.

use super::{
    RetrieverContext, attributes, belongs_to_schema, for_each_row, remarks, sequence_number,
    type_code,
};
use crate::Result;
use crate::catalog::SchemaFragment;
use crate::crawl::report::CrawlWarning;
use crate::models::{Column, Nullability, ObjectFamily, PrimaryKey, Table, UNKNOWN_TYPE_NAME};

const TABLE_FIELDS: &[&str] = &["TABLE_CAT", "TABLE_SCHEM", "TABLE_NAME", "TABLE_TYPE", "REMARKS"];

const COLUMN_FIELDS: &[&str] = &[
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "COLUMN_NAME",
    "DATA_TYPE",
    "TYPE_NAME",
    "COLUMN_SIZE",
    "DECIMAL_DIGITS",
    "NULLABLE",
    "REMARKS",
    "COLUMN_DEF",
    "ORDINAL_POSITION",
];

/// Retrieves the tables of a schema, filtered by table type and table rule.
pub(crate) async fn retrieve_tables(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let depth = ctx.depth(ObjectFamily::Tables);
    let rule = ctx.rule(ObjectFamily::Tables);
    let request = ctx
        .request(ObjectFamily::Tables, &schema)
        .with_types(&ctx.options.table_types);

    let mut attached = 0usize;
    for_each_row(ctx, &request, &schema.full_name(), |row| {
        let Some(name) = row.non_blank_text("TABLE_NAME") else {
            return Ok(());
        };
        if !belongs_to_schema(&schema, &row, "TABLE_CAT", "TABLE_SCHEM") {
            tracing::trace!("Skipping table {} from another schema", name);
            return Ok(());
        }

        let mut table = Table::new(schema.clone(), name);
        if let Some(table_type) = row.non_blank_text("TABLE_TYPE") {
            table.table_type = table_type;
        }
        table.remarks = remarks(&row, depth);
        table.attributes = attributes(&row, depth, TABLE_FIELDS);

        if !rule.include(&table.full_name()) {
            tracing::trace!("Excluding table {}", table.full_name());
            return Ok(());
        }
        if fragment.add_table(table)? {
            attached = attached.saturating_add(1);
        }
        Ok(())
    })
    .await?;

    tracing::debug!("Retrieved {} tables for schema '{}'", attached, schema);
    Ok(())
}

/// Retrieves the columns of every retrieved table in one schema-wide query.
pub(crate) async fn retrieve_columns(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    if fragment.table_count() == 0 {
        tracing::debug!("No tables in schema '{}', skipping columns", fragment.schema());
        return Ok(());
    }

    let schema = fragment.schema().clone();
    let depth = ctx.depth(ObjectFamily::Columns);
    let rule = ctx.rule(ObjectFamily::Columns);
    let request = ctx.request(ObjectFamily::Columns, &schema);

    let mut attached = 0usize;
    for_each_row(ctx, &request, &schema.full_name(), |row| {
        let (Some(table_name), Some(column_name)) =
            (row.non_blank_text("TABLE_NAME"), row.non_blank_text("COLUMN_NAME"))
        else {
            return Ok(());
        };
        if !belongs_to_schema(&schema, &row, "TABLE_CAT", "TABLE_SCHEM") {
            return Ok(());
        }
        let Some(table) = fragment.table(&table_name) else {
            tracing::trace!("Skipping column {} of unknown table {}", column_name, table_name);
            return Ok(());
        };
        let table_full_name = table.full_name();
        if !rule.include(&format!("{}.{}", table_full_name, column_name)) {
            return Ok(());
        }

        let data_type = match row.non_blank_text("TYPE_NAME") {
            Some(type_name) => {
                ctx.registry
                    .lookup_or_create(&schema, type_code(&row, "DATA_TYPE"), &type_name)
            }
            None => {
                fragment.warn(CrawlWarning::UnknownDataType {
                    owner: table_full_name,
                    column: column_name.clone(),
                });
                ctx.registry
                    .lookup_or_create(&schema, type_code(&row, "DATA_TYPE"), UNKNOWN_TYPE_NAME)
            }
        };

        let mut column = Column::new(column_name, data_type);
        column.nullability = Nullability::from_code(row.int_or("NULLABLE", 2));
        column.size = row.int_or("COLUMN_SIZE", 0);
        column.decimal_digits = row.int_or("DECIMAL_DIGITS", 0);
        column.default_value = row.text("COLUMN_DEF");
        column.remarks = remarks(&row, depth);
        column.attributes = attributes(&row, depth, COLUMN_FIELDS);

        if fragment.add_column(&table_name, column)? {
            attached = attached.saturating_add(1);
        }
        Ok(())
    })
    .await?;

    tracing::debug!("Retrieved {} columns for schema '{}'", attached, schema);
    Ok(())
}

/// Retrieves primary keys, one query per table.
pub(crate) async fn retrieve_primary_keys(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();

    for table_name in fragment.table_names() {
        let owner = schema.qualify(&table_name);
        let request = ctx
            .request(ObjectFamily::PrimaryKeys, &schema)
            .for_object(&table_name);

        let mut key_columns: Vec<(u32, String)> = Vec::new();
        let mut key_name = None;
        for_each_row(ctx, &request, &owner, |row| {
            if row.text("TABLE_NAME").is_some_and(|t| t != table_name)
                || !belongs_to_schema(&schema, &row, "TABLE_CAT", "TABLE_SCHEM")
            {
                return Ok(());
            }
            let Some(column_name) = row.non_blank_text("COLUMN_NAME") else {
                return Ok(());
            };
            if key_name.is_none() {
                key_name = row.non_blank_text("PK_NAME");
            }
            key_columns.push((sequence_number(&row, "KEY_SEQ"), column_name));
            Ok(())
        })
        .await?;

        if key_columns.is_empty() {
            continue;
        }
        key_columns.sort_by_key(|(seq, _)| *seq);
        let primary_key = PrimaryKey {
            name: key_name,
            columns: key_columns.into_iter().map(|(_, c)| c).collect(),
        };
        tracing::trace!("Primary key for {}: {:?}", owner, primary_key.columns);
        fragment.set_primary_key(&table_name, primary_key);
    }

    Ok(())
}
