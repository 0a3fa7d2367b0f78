//! Foreign key retrieval.
//!
//! Imported keys are read per referencing table and parked on the fragment
//! by name. Nothing here touches the referenced table: it may live in a
//! schema that has not been crawled yet. Resolution happens once every
//! schema is in.

use super::{RetrieverContext, belongs_to_schema, for_each_row, sequence_number};
use crate::Result;
use crate::catalog::{PendingForeignKey, SchemaFragment};
use crate::models::{ColumnPath, ColumnReference, ObjectFamily, ReferentialAction, SchemaRef};

/// Retrieves imported foreign keys, one query per table.
pub(crate) async fn retrieve_foreign_keys(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let mut parked = 0usize;

    for table_name in fragment.table_names() {
        let owner = schema.qualify(&table_name);
        let request = ctx
            .request(ObjectFamily::ForeignKeys, &schema)
            .for_object(&table_name);

        let mut keys: Vec<PendingForeignKey> = Vec::new();
        let mut unnamed = 0usize;
        for_each_row(ctx, &request, &owner, |row| {
            if row.text("FKTABLE_NAME").is_some_and(|t| t != table_name)
                || !belongs_to_schema(&schema, &row, "FKTABLE_CAT", "FKTABLE_SCHEM")
            {
                return Ok(());
            }
            let (Some(local_column), Some(remote_table), Some(remote_column)) = (
                row.non_blank_text("FKCOLUMN_NAME"),
                row.non_blank_text("PKTABLE_NAME"),
                row.non_blank_text("PKCOLUMN_NAME"),
            ) else {
                return Ok(());
            };

            let key_sequence = sequence_number(&row, "KEY_SEQ");
            let name = match row.non_blank_text("FK_NAME") {
                Some(name) => name,
                None => {
                    // Unnamed keys restart their sequence at 1
                    let continues = key_sequence > 1
                        && keys.last().is_some_and(|k| k.name.starts_with("FK_UNNAMED_"));
                    if !continues {
                        unnamed = unnamed.saturating_add(1);
                    }
                    format!("FK_UNNAMED_{}_{}", table_name, unnamed)
                }
            };

            let remote_schema = match (
                row.non_blank_text("PKTABLE_CAT"),
                row.non_blank_text("PKTABLE_SCHEM"),
            ) {
                (None, None) => schema.clone(),
                (catalog, schema_name) => SchemaRef::new(
                    catalog.or_else(|| schema.catalog.clone()),
                    schema_name.or_else(|| schema.schema.clone()),
                ),
            };
            let reference = ColumnReference {
                key_sequence,
                local: ColumnPath::new(schema.clone(), table_name.clone(), local_column),
                remote: ColumnPath::new(remote_schema, remote_table, remote_column),
            };

            match keys.iter_mut().find(|k| k.name == name) {
                Some(key) => key.column_references.push(reference),
                None => keys.push(PendingForeignKey {
                    table: owner.clone(),
                    name,
                    column_references: vec![reference],
                    update_rule: row.int("UPDATE_RULE").and_then(ReferentialAction::from_code),
                    delete_rule: row.int("DELETE_RULE").and_then(ReferentialAction::from_code),
                }),
            }
            Ok(())
        })
        .await?;

        for mut key in keys {
            key.column_references.sort_by_key(|r| r.key_sequence);
            if fragment.add_pending_foreign_key(key)? {
                parked = parked.saturating_add(1);
            }
        }
    }

    tracing::debug!(
        "Retrieved {} foreign keys for schema '{}', awaiting resolution",
        parked,
        schema
    );
    Ok(())
}
