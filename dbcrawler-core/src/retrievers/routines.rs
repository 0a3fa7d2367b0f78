//! Routine and routine column retrieval.
//!
//! Overloaded routines share a name and differ by specific name. Column
//! rows are fetched per routine and kept only when their specific name is
//! blank or equal to the routine's, so parameter lists of sibling overloads
//! never mix.

use super::{RetrieverContext, attributes, belongs_to_schema, for_each_row, remarks, type_code};
use crate::Result;
use crate::catalog::SchemaFragment;
use crate::models::{
    Nullability, ObjectFamily, Routine, RoutineColumn, RoutineColumnType, RoutineReturnType,
    UNKNOWN_TYPE_NAME,
};

const ROUTINE_FIELDS: &[&str] = &[
    "PROCEDURE_CAT",
    "PROCEDURE_SCHEM",
    "PROCEDURE_NAME",
    "PROCEDURE_TYPE",
    "REMARKS",
    "SPECIFIC_NAME",
];

const ROUTINE_COLUMN_FIELDS: &[&str] = &[
    "PROCEDURE_CAT",
    "PROCEDURE_SCHEM",
    "PROCEDURE_NAME",
    "COLUMN_NAME",
    "COLUMN_TYPE",
    "DATA_TYPE",
    "TYPE_NAME",
    "LENGTH",
    "PRECISION",
    "NULLABLE",
    "REMARKS",
    "SPECIFIC_NAME",
];

/// Retrieves the routines of a schema.
pub(crate) async fn retrieve_routines(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let depth = ctx.depth(ObjectFamily::Routines);
    let rule = ctx.rule(ObjectFamily::Routines);
    let request = ctx.request(ObjectFamily::Routines, &schema);

    let mut attached = 0usize;
    for_each_row(ctx, &request, &schema.full_name(), |row| {
        let Some(name) = row.non_blank_text("PROCEDURE_NAME") else {
            return Ok(());
        };
        if !belongs_to_schema(&schema, &row, "PROCEDURE_CAT", "PROCEDURE_SCHEM") {
            return Ok(());
        }

        let mut routine = Routine::new(schema.clone(), name);
        routine.specific_name = row.non_blank_text("SPECIFIC_NAME");
        routine.return_type = RoutineReturnType::from_code(row.int_or("PROCEDURE_TYPE", 0));
        routine.remarks = remarks(&row, depth);
        routine.attributes = attributes(&row, depth, ROUTINE_FIELDS);

        if !rule.include(&routine.full_name()) {
            tracing::trace!("Excluding routine {}", routine.full_name());
            return Ok(());
        }
        if fragment.add_routine(routine)? {
            attached = attached.saturating_add(1);
        }
        Ok(())
    })
    .await?;

    tracing::debug!("Retrieved {} routines for schema '{}'", attached, schema);
    Ok(())
}

/// Retrieves parameter and result columns, one query per routine.
pub(crate) async fn retrieve_routine_columns(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let depth = ctx.depth(ObjectFamily::RoutineColumns);
    let rule = ctx.rule(ObjectFamily::RoutineColumns);

    for routine_key in fragment.routine_keys() {
        let Some(routine) = fragment.routine(&routine_key) else {
            continue;
        };
        let routine_name = routine.name.clone();
        let routine_full_name = routine.full_name();
        let specific_name = routine.specific_name.clone();

        let request = ctx
            .request(ObjectFamily::RoutineColumns, &schema)
            .for_object(&routine_name);

        for_each_row(ctx, &request, &routine_full_name, |row| {
            let Some(column_name) = row.non_blank_text("COLUMN_NAME") else {
                return Ok(());
            };
            let same_routine = row.text("PROCEDURE_NAME").as_deref() == Some(routine_name.as_str());
            let column_full_name = format!("{}.{}", routine_full_name, column_name);
            if !rule.include(&column_full_name)
                || !same_routine
                || !belongs_to_schema(&schema, &row, "PROCEDURE_CAT", "PROCEDURE_SCHEM")
            {
                return Ok(());
            }
            // A blank specific name comes from a driver that does not tell
            // overloads apart; any other value must match exactly
            if let Some(row_specific) = row.non_blank_text("SPECIFIC_NAME")
                && specific_name.as_deref() != Some(row_specific.as_str())
            {
                tracing::trace!(
                    "Skipping column {} of overload {}",
                    column_full_name,
                    row_specific
                );
                return Ok(());
            }

            let type_name = row
                .non_blank_text("TYPE_NAME")
                .unwrap_or_else(|| UNKNOWN_TYPE_NAME.to_string());
            let data_type =
                ctx.registry
                    .lookup_or_create(&schema, type_code(&row, "DATA_TYPE"), &type_name);

            let column = RoutineColumn {
                name: column_name,
                ordinal_position: 0,
                column_type: RoutineColumnType::from_code(row.int_or("COLUMN_TYPE", 0)),
                data_type,
                nullability: Nullability::from_code(row.int_or("NULLABLE", 2)),
                size: row.int_or("LENGTH", 0),
                precision: row.int_or("PRECISION", 0),
                remarks: remarks(&row, depth),
                attributes: attributes(&row, depth, ROUTINE_COLUMN_FIELDS),
            };
            fragment.add_routine_column(&routine_key, column)?;
            Ok(())
        })
        .await?;
    }

    Ok(())
}
