//! Column data type retrieval from the type-info query.
//!
//! Types described here are registered before any column is read, so the
//! columns that reference them share these fully described instances.
//! Rows without a type schema are owned by the schema being crawled.

use super::{RetrieverContext, attributes, belongs_to_schema, for_each_row, remarks, type_code};
use crate::Result;
use crate::catalog::SchemaFragment;
use crate::models::{ColumnDataType, Nullability, ObjectFamily};

const TYPE_FIELDS: &[&str] = &[
    "TYPE_CAT",
    "TYPE_SCHEM",
    "TYPE_NAME",
    "DATA_TYPE",
    "PRECISION",
    "NULLABLE",
    "USER_DEFINED",
    "REMARKS",
];

pub(crate) async fn retrieve_data_types(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let request = ctx.request(ObjectFamily::ColumnDataTypes, &schema);
    let depth = ctx.depth(ObjectFamily::ColumnDataTypes);

    let mut registered = 0usize;
    for_each_row(ctx, &request, &schema.full_name(), |row| {
        let Some(name) = row.non_blank_text("TYPE_NAME") else {
            return Ok(());
        };
        if !belongs_to_schema(&schema, &row, "TYPE_CAT", "TYPE_SCHEM") {
            return Ok(());
        }

        let mut data_type = ColumnDataType::new(schema.clone(), name, type_code(&row, "DATA_TYPE"));
        data_type.precision = row.int("PRECISION");
        data_type.nullability = Nullability::from_code(row.int_or("NULLABLE", 2));
        data_type.user_defined = row.bool_or("USER_DEFINED", false);
        data_type.remarks = remarks(&row, depth);
        data_type.attributes = attributes(&row, depth, TYPE_FIELDS);

        ctx.registry.register(data_type);
        registered = registered.saturating_add(1);
        Ok(())
    })
    .await?;

    tracing::debug!(
        "Registered {} column data types for schema '{}'",
        registered,
        schema
    );
    Ok(())
}
