//! Index retrieval.
//!
//! The index query returns one row per (index, column). Rows are grouped by
//! index name in order of first appearance, which is the natural order.

use super::{RetrieverContext, attributes, belongs_to_schema, for_each_row, sequence_number};
use crate::Result;
use crate::catalog::SchemaFragment;
use crate::models::{Index, IndexColumn, ObjectFamily, SortOrder};

const INDEX_FIELDS: &[&str] = &[
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "INDEX_NAME",
    "NON_UNIQUE",
    "TYPE",
    "ORDINAL_POSITION",
    "COLUMN_NAME",
    "ASC_OR_DESC",
];

/// Index type name for the standard type code.
fn index_type(code: Option<i64>) -> Option<String> {
    let name = match code? {
        0 => "statistic",
        1 => "clustered",
        2 => "hashed",
        3 => "other",
        _ => return None,
    };
    Some(name.to_string())
}

struct IndexBuilder {
    index: Index,
    columns: Vec<(u32, IndexColumn)>,
}

/// Retrieves indexes, one query per table.
pub(crate) async fn retrieve_indexes(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let depth = ctx.depth(ObjectFamily::Indexes);

    for table_name in fragment.table_names() {
        let owner = schema.qualify(&table_name);
        let request = ctx
            .request(ObjectFamily::Indexes, &schema)
            .for_object(&table_name);

        let mut builders: Vec<IndexBuilder> = Vec::new();
        for_each_row(ctx, &request, &owner, |row| {
            if row.text("TABLE_NAME").is_some_and(|t| t != table_name)
                || !belongs_to_schema(&schema, &row, "TABLE_CAT", "TABLE_SCHEM")
            {
                return Ok(());
            }
            // Table statistics rows carry no index name
            let Some(index_name) = row.non_blank_text("INDEX_NAME") else {
                return Ok(());
            };

            let position = builders.iter().position(|b| b.index.name == index_name);
            let builder = match position {
                Some(i) => &mut builders[i],
                None => {
                    builders.push(IndexBuilder {
                        index: Index {
                            name: index_name,
                            is_unique: !row.bool_or("NON_UNIQUE", true),
                            index_type: index_type(row.int("TYPE")),
                            columns: Vec::new(),
                            attributes: attributes(&row, depth, INDEX_FIELDS),
                        },
                        columns: Vec::new(),
                    });
                    let Some(builder) = builders.last_mut() else {
                        return Ok(());
                    };
                    builder
                }
            };

            if let Some(column_name) = row.non_blank_text("COLUMN_NAME") {
                let sort_order = row
                    .text("ASC_OR_DESC")
                    .and_then(|marker| SortOrder::from_marker(&marker));
                builder.columns.push((
                    sequence_number(&row, "ORDINAL_POSITION"),
                    IndexColumn {
                        name: column_name,
                        sort_order,
                    },
                ));
            }
            Ok(())
        })
        .await?;

        for IndexBuilder { mut index, mut columns } in builders {
            columns.sort_by_key(|(position, _)| *position);
            index.columns = columns.into_iter().map(|(_, c)| c).collect();
            fragment.add_index(&table_name, index)?;
        }
    }

    Ok(())
}
