//! Rendering and writing crawl results.
//!
//! Plain-text output goes through the catalog traversal; JSON output
//! serializes the catalog next to the crawl report.

use dbcrawler_core::{
    Catalog, CrawlError, CrawlResult, Result, SchemaObject, TraversalHandler,
    models::{Column, Nullability},
    traverse,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Lists every object of a catalog as indented text.
#[derive(Debug, Default)]
pub struct ListFormatter {
    out: String,
}

impl ListFormatter {
    /// Creates an empty formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// The rendered text
    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, indent: usize, text: impl std::fmt::Display) {
        // Writing to a String cannot fail
        let _ = writeln!(self.out, "{:indent$}{}", "", text, indent = indent.saturating_mul(2));
    }

    fn remarks(&mut self, indent: usize, remarks: Option<&String>) {
        if let Some(remarks) = remarks {
            self.line(indent, format_args!("-- {}", remarks));
        }
    }

    fn column(&mut self, column: &Column) {
        let mut text = format!(
            "{}. {} {}",
            column.ordinal_position.saturating_add(1),
            column.name,
            column.data_type.name
        );
        if column.part_of_primary_key {
            text.push_str(" [pk]");
        }
        if column.nullability == Nullability::NoNulls {
            text.push_str(" not null");
        }
        self.line(2, text);
    }
}

impl TraversalHandler for ListFormatter {
    fn begin(&mut self, catalog: &Catalog) -> Result<()> {
        let info = catalog.info();
        self.line(
            0,
            format_args!(
                "# {} (detail level {}, {} schemas)",
                info.source_name,
                info.detail_level,
                catalog.schemas().len()
            ),
        );
        Ok(())
    }

    fn handle(&mut self, object: SchemaObject<'_>) -> Result<()> {
        match object {
            SchemaObject::Schema(schema) => {
                self.line(0, "");
                self.line(0, format_args!("{} [schema]", schema.full_name()));
            }
            SchemaObject::Table(table) => {
                self.line(1, format_args!("{} [{}]", table.name, table.table_type.to_lowercase()));
                self.remarks(2, table.remarks.as_ref());
                for column in &table.columns {
                    self.column(column);
                }
                for index in &table.indexes {
                    let columns: Vec<&str> = index.columns.iter().map(|c| c.name.as_str()).collect();
                    let kind = if index.is_unique { "unique index" } else { "index" };
                    self.line(2, format_args!("{} [{}] ({})", index.name, kind, columns.join(", ")));
                }
                for foreign_key in &table.foreign_keys {
                    let target = foreign_key
                        .column_references
                        .first()
                        .map(|r| r.remote.table_full_name())
                        .unwrap_or_default();
                    self.line(
                        2,
                        format_args!("{} [foreign key] -> {}", foreign_key.name, target),
                    );
                }
            }
            SchemaObject::Routine(routine) => {
                self.line(1, format_args!("{} [routine, {}]", routine.name, routine.return_type));
                self.remarks(2, routine.remarks.as_ref());
                for column in &routine.columns {
                    self.line(
                        2,
                        format_args!(
                            "{}. {} {}",
                            column.ordinal_position.saturating_add(1),
                            column.name,
                            column.data_type.name
                        ),
                    );
                }
            }
            SchemaObject::Sequence(sequence) => {
                self.line(1, format_args!("{} [sequence]", sequence.name));
                self.remarks(2, sequence.remarks.as_ref());
            }
            SchemaObject::Synonym(synonym) => {
                let target = synonym.referenced_object.as_deref().unwrap_or("?");
                self.line(1, format_args!("{} [synonym] -> {}", synonym.name, target));
            }
            SchemaObject::ColumnDataType(data_type) => {
                self.line(
                    1,
                    format_args!("{} [data type {}]", data_type.name, data_type.type_code),
                );
            }
        }
        Ok(())
    }
}

/// Renders a catalog as a plain-text list.
pub fn render_text(catalog: &Catalog) -> Result<String> {
    let mut formatter = ListFormatter::new();
    traverse(catalog, &mut formatter)?;
    Ok(formatter.finish())
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    catalog: &'a Catalog,
    report: &'a dbcrawler_core::CrawlReport,
}

/// Renders a crawl result, report included, as pretty JSON.
pub fn render_json(result: &CrawlResult) -> Result<String> {
    let output = JsonOutput {
        catalog: &result.catalog,
        report: &result.report,
    };
    serde_json::to_string_pretty(&output).map_err(|e| CrawlError::Serialization {
        context: "Failed to serialize crawl result".to_string(),
        source: e,
    })
}

/// Writes rendered output to a file, or to stdout when no path is given.
pub async fn write_output(content: &str, path: Option<&Path>, compress: bool) -> Result<()> {
    let Some(path) = path else {
        if compress {
            return Err(CrawlError::configuration(
                "Compressed output needs an --output file",
            ));
        }
        print!("{}", content);
        return Ok(());
    };

    if compress {
        #[cfg(feature = "compression")]
        {
            return save_compressed(content, path).await;
        }
        #[cfg(not(feature = "compression"))]
        {
            return Err(CrawlError::configuration(
                "Compression not available. Compile with --features compression",
            ));
        }
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|e| CrawlError::Io {
            context: format!("Failed to write to {}", path.display()),
            source: e,
        })
}

/// Saves zstd-compressed output.
#[cfg(feature = "compression")]
async fn save_compressed(content: &str, path: &Path) -> Result<()> {
    let compressed = zstd::encode_all(content.as_bytes(), 3).map_err(|e| CrawlError::Io {
        context: "Compression failed".to_string(),
        source: e,
    })?;

    tokio::fs::write(path, compressed)
        .await
        .map_err(|e| CrawlError::Io {
            context: format!("Failed to write compressed file to {}", path.display()),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbcrawler_core::{
        CrawlOptions, Crawler, DetailLevel, MemorySource, MetadataRow,
        models::{ObjectFamily, SchemaRef},
    };

    async fn crawl() -> CrawlResult {
        let schema = SchemaRef::named("PUBLIC");
        let mut source = MemorySource::new("fixture");
        source.add_schema(&schema);
        source.add_rows(
            ObjectFamily::Tables,
            &schema,
            None,
            [MetadataRow::new()
                .with("TABLE_NAME", "INVOICE")
                .with("TABLE_TYPE", "TABLE")
                .with("REMARKS", "Customer invoices")],
        );
        source.add_rows(
            ObjectFamily::Columns,
            &schema,
            None,
            [MetadataRow::new()
                .with("TABLE_NAME", "INVOICE")
                .with("COLUMN_NAME", "ID")
                .with("TYPE_NAME", "INTEGER")
                .with("DATA_TYPE", 4)
                .with("NULLABLE", 0)],
        );

        let options = CrawlOptions::new().with_detail_level(DetailLevel::Basic);
        Crawler::new(&source, options)
            .unwrap()
            .crawl()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_render_text_lists_objects() {
        let result = crawl().await;
        let text = render_text(&result.catalog).unwrap();

        assert!(text.starts_with("# fixture (detail level basic, 1 schemas)"));
        assert!(text.contains("PUBLIC [schema]"));
        assert!(text.contains("  INVOICE [table]"));
        assert!(text.contains("    -- Customer invoices"));
        assert!(text.contains("    1. ID INTEGER not null"));
    }

    #[tokio::test]
    async fn test_render_json_includes_report() {
        let result = crawl().await;
        let json = render_json(&result).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value["catalog"]["schemas"].is_array());
        assert!(value["report"]["warnings"].is_array());
    }

    #[tokio::test]
    async fn test_write_output_to_file() {
        let path = std::env::temp_dir().join(format!("dbcrawler-output-{}.txt", std::process::id()));
        write_output("hello\n", Some(&path), false).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "hello\n");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_compressed_stdout_is_rejected() {
        assert!(write_output("x", None, true).await.is_err());
    }
}
