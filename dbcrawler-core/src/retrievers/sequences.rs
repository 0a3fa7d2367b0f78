//! Sequence retrieval.

use super::{RetrieverContext, attributes, belongs_to_schema, for_each_row, remarks};
use crate::Result;
use crate::catalog::SchemaFragment;
use crate::models::{ObjectFamily, Sequence};

const SEQUENCE_FIELDS: &[&str] = &[
    "SEQUENCE_CAT",
    "SEQUENCE_SCHEM",
    "SEQUENCE_NAME",
    "INCREMENT",
    "MINIMUM_VALUE",
    "MAXIMUM_VALUE",
    "CYCLE",
    "REMARKS",
];

pub(crate) async fn retrieve_sequences(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let depth = ctx.depth(ObjectFamily::Sequences);
    let rule = ctx.rule(ObjectFamily::Sequences);
    let request = ctx.request(ObjectFamily::Sequences, &schema);

    let mut attached = 0usize;
    for_each_row(ctx, &request, &schema.full_name(), |row| {
        let Some(name) = row.non_blank_text("SEQUENCE_NAME") else {
            return Ok(());
        };
        if !belongs_to_schema(&schema, &row, "SEQUENCE_CAT", "SEQUENCE_SCHEM") {
            return Ok(());
        }

        let sequence = Sequence {
            schema: schema.clone(),
            name,
            increment: row.int("INCREMENT"),
            minimum_value: row.int("MINIMUM_VALUE"),
            maximum_value: row.int("MAXIMUM_VALUE"),
            cycle: row.bool_or("CYCLE", false),
            remarks: remarks(&row, depth),
            attributes: attributes(&row, depth, SEQUENCE_FIELDS),
        };
        if rule.include(&sequence.full_name()) && fragment.add_sequence(sequence)? {
            attached = attached.saturating_add(1);
        }
        Ok(())
    })
    .await?;

    tracing::debug!("Retrieved {} sequences for schema '{}'", attached, schema);
    Ok(())
}
