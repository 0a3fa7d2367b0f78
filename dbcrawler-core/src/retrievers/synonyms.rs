//! Synonym retrieval.

use super::{RetrieverContext, attributes, belongs_to_schema, for_each_row, remarks};
use crate::Result;
use crate::catalog::SchemaFragment;
use crate::models::{ObjectFamily, SchemaRef, Synonym};

const SYNONYM_FIELDS: &[&str] = &[
    "SYNONYM_CAT",
    "SYNONYM_SCHEM",
    "SYNONYM_NAME",
    "REFERENCED_OBJECT_CAT",
    "REFERENCED_OBJECT_SCHEM",
    "REFERENCED_OBJECT_NAME",
    "REMARKS",
];

pub(crate) async fn retrieve_synonyms(
    ctx: &RetrieverContext<'_>,
    fragment: &mut SchemaFragment,
) -> Result<()> {
    let schema = fragment.schema().clone();
    let depth = ctx.depth(ObjectFamily::Synonyms);
    let rule = ctx.rule(ObjectFamily::Synonyms);
    let request = ctx.request(ObjectFamily::Synonyms, &schema);

    let mut attached = 0usize;
    for_each_row(ctx, &request, &schema.full_name(), |row| {
        let Some(name) = row.non_blank_text("SYNONYM_NAME") else {
            return Ok(());
        };
        if !belongs_to_schema(&schema, &row, "SYNONYM_CAT", "SYNONYM_SCHEM") {
            return Ok(());
        }

        let referenced_object = row.non_blank_text("REFERENCED_OBJECT_NAME").map(|object| {
            SchemaRef::new(
                row.text("REFERENCED_OBJECT_CAT"),
                row.text("REFERENCED_OBJECT_SCHEM"),
            )
            .qualify(&object)
        });
        let synonym = Synonym {
            schema: schema.clone(),
            name,
            referenced_object,
            remarks: remarks(&row, depth),
            attributes: attributes(&row, depth, SYNONYM_FIELDS),
        };
        if rule.include(&synonym.full_name()) && fragment.add_synonym(synonym)? {
            attached = attached.saturating_add(1);
        }
        Ok(())
    })
    .await?;

    tracing::debug!("Retrieved {} synonyms for schema '{}'", attached, schema);
    Ok(())
}
