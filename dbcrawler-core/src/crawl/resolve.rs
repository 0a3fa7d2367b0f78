//! Reference resolution across all retrieved schemas.
//!
//! Foreign keys were parked by name during retrieval. Here every column
//! pair is looked up in the assembled fragments; a key attaches to its
//! table only when all of its local and remote columns exist. Anything
//! else is dropped with an `UnresolvedReference` warning, so no dangling
//! reference survives into the catalog.

use super::report::CrawlWarning;
use crate::catalog::{PendingForeignKey, SchemaFragment};
use crate::models::{ColumnPath, ColumnReference, ForeignKey, SchemaRef};

/// Finds the fragment that owns a referenced schema.
///
/// An exact match wins; otherwise a row that left out its catalog or
/// schema part matches the single fragment it can belong to.
fn owning_fragment(fragments: &[SchemaFragment], schema: &SchemaRef) -> Option<usize> {
    fragments
        .iter()
        .position(|f| f.schema() == schema)
        .or_else(|| {
            fragments.iter().position(|f| {
                f.schema()
                    .matches(schema.catalog.as_deref(), schema.schema.as_deref())
            })
        })
}

/// Resolves a column path, returning it normalized to the owning schema.
fn resolve_column(fragments: &[SchemaFragment], path: &ColumnPath) -> Option<ColumnPath> {
    let fragment = &fragments[owning_fragment(fragments, &path.schema)?];
    fragment.table(&path.table)?.column(&path.column)?;
    Some(ColumnPath::new(
        fragment.schema().clone(),
        path.table.clone(),
        path.column.clone(),
    ))
}

fn resolve_key(
    fragments: &[SchemaFragment],
    pending: PendingForeignKey,
) -> Result<ForeignKey, CrawlWarning> {
    let mut column_references = Vec::with_capacity(pending.column_references.len());
    for reference in &pending.column_references {
        let local = resolve_column(fragments, &reference.local);
        let remote = resolve_column(fragments, &reference.remote);
        match (local, remote) {
            (Some(local), Some(remote)) => column_references.push(ColumnReference {
                key_sequence: reference.key_sequence,
                local,
                remote,
            }),
            (None, _) => return Err(unresolved(&pending, reference.local.full_name())),
            (_, None) => return Err(unresolved(&pending, reference.remote.full_name())),
        }
    }

    Ok(ForeignKey {
        name: pending.name,
        column_references,
        update_rule: pending.update_rule,
        delete_rule: pending.delete_rule,
    })
}

fn unresolved(pending: &PendingForeignKey, target: String) -> CrawlWarning {
    CrawlWarning::UnresolvedReference {
        table: pending.table.clone(),
        foreign_key: pending.name.clone(),
        local_columns: pending
            .column_references
            .iter()
            .map(|r| r.local.column.clone())
            .collect(),
        target,
    }
}

/// Resolves every parked foreign key in every fragment.
///
/// Returns the number of keys attached.
pub(crate) fn resolve_foreign_keys(fragments: &mut [SchemaFragment]) -> usize {
    let pending: Vec<(usize, PendingForeignKey)> = fragments
        .iter_mut()
        .enumerate()
        .flat_map(|(i, f)| {
            f.take_pending_foreign_keys()
                .into_iter()
                .map(move |fk| (i, fk))
        })
        .collect();

    let outcomes: Vec<(usize, String, Result<ForeignKey, CrawlWarning>)> = pending
        .into_iter()
        .map(|(i, fk)| {
            let table = fk.table.clone();
            (i, table, resolve_key(fragments, fk))
        })
        .collect();

    let mut attached = 0usize;
    for (i, table, outcome) in outcomes {
        match outcome {
            Ok(foreign_key) => {
                tracing::trace!("Resolved foreign key {} on {}", foreign_key.name, table);
                if fragments[i].attach_foreign_key(&table, foreign_key) {
                    attached = attached.saturating_add(1);
                }
            }
            Err(warning) => fragments[i].warn(warning),
        }
    }

    tracing::debug!("Resolved {} foreign keys", attached);
    attached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::models::{Column, ColumnDataType, Table};
    use std::sync::Arc;

    fn fragment_with(schema: &str, tables: &[(&str, &[&str])]) -> SchemaFragment {
        let schema_ref = SchemaRef::named(schema);
        let mut fragment = SchemaFragment::new(schema_ref.clone(), DuplicatePolicy::Fail);
        let data_type = Arc::new(ColumnDataType::new(schema_ref.clone(), "INTEGER", 4));
        for (table, columns) in tables {
            fragment
                .add_table(Table::new(schema_ref.clone(), *table))
                .unwrap();
            for column in *columns {
                fragment
                    .add_column(table, Column::new(*column, Arc::clone(&data_type)))
                    .unwrap();
            }
        }
        fragment
    }

    fn pending(schema: &str, table: &str, name: &str, remote: ColumnPath) -> PendingForeignKey {
        let schema_ref = SchemaRef::named(schema);
        PendingForeignKey {
            table: schema_ref.qualify(table),
            name: name.to_string(),
            column_references: vec![ColumnReference {
                key_sequence: 1,
                local: ColumnPath::new(schema_ref, table, "PRODUCTID"),
                remote,
            }],
            update_rule: None,
            delete_rule: None,
        }
    }

    #[test]
    fn test_cross_schema_reference_resolves() {
        let mut sales = fragment_with("SALES", &[("ITEM", &["PRODUCTID"])]);
        let catalog = fragment_with("CATALOG", &[("PRODUCT", &["ID"])]);
        sales
            .add_pending_foreign_key(pending(
                "SALES",
                "ITEM",
                "FK_ITEM_PRODUCT",
                ColumnPath::new(SchemaRef::named("CATALOG"), "PRODUCT", "ID"),
            ))
            .unwrap();

        let mut fragments = vec![sales, catalog];
        assert_eq!(resolve_foreign_keys(&mut fragments), 1);

        let item = fragments[0].table("ITEM").unwrap();
        assert_eq!(item.foreign_keys.len(), 1);
        assert!(fragments[0].report().warnings.is_empty());
    }

    #[test]
    fn test_unresolved_reference_is_dropped_with_warning() {
        let mut sales = fragment_with("SALES", &[("ITEM", &["PRODUCTID"])]);
        sales
            .add_pending_foreign_key(pending(
                "SALES",
                "ITEM",
                "FK_ITEM_PRODUCT",
                ColumnPath::new(SchemaRef::named("SALES"), "PRODUCT", "ID"),
            ))
            .unwrap();

        let mut fragments = vec![sales];
        assert_eq!(resolve_foreign_keys(&mut fragments), 0);

        assert!(fragments[0].table("ITEM").unwrap().foreign_keys.is_empty());
        let warnings = &fragments[0].report().warnings;
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            CrawlWarning::UnresolvedReference { target, .. } if target == "SALES.PRODUCT.ID"
        ));
    }

    #[test]
    fn test_remote_without_catalog_matches_schema() {
        let schema = SchemaRef::new(Some("DB".to_string()), Some("PUBLIC".to_string()));
        let fragments = vec![SchemaFragment::new(schema.clone(), DuplicatePolicy::Fail)];
        assert_eq!(
            owning_fragment(&fragments, &SchemaRef::named("PUBLIC")),
            Some(0)
        );
        assert_eq!(owning_fragment(&fragments, &SchemaRef::named("OTHER")), None);
    }
}
