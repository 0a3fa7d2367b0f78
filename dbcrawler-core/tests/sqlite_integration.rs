//! SQLite metadata source integration tests.
//!
//! This test suite covers:
//! - Table and view discovery in creation order
//! - Column types and shared type instances
//! - Primary keys, indexes and sort direction
//! - Foreign keys, including implicit primary key targets
//! - Attached databases reported as schemas

#![cfg(feature = "sqlite")]

use dbcrawler_core::{
    CrawlOptions, Crawler, DetailLevel, DuplicatePolicy, MetadataSource, Result, SortPolicy,
    models::{ObjectFamily, ReferentialAction, SortOrder},
    source::{MetadataRequest, SqliteSource},
};
use futures::TryStreamExt;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

/// Creates a single-connection in-memory database and runs the given DDL.
async fn source_with(statements: &[&str]) -> SqliteSource {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    SqliteSource::from_pool(pool, ":memory:")
}

const SALES: &[&str] = &[
    "CREATE TABLE invoice (id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL, total DECIMAL(10, 2))",
    "CREATE TABLE product (id INTEGER PRIMARY KEY, name VARCHAR(64) NOT NULL)",
    "CREATE TABLE item (
        invoice_id INTEGER REFERENCES invoice (id) ON DELETE CASCADE,
        product_id INTEGER REFERENCES product,
        quantity INTEGER DEFAULT 1,
        PRIMARY KEY (invoice_id, product_id)
    )",
    "CREATE INDEX idx_product_name ON product (name DESC)",
    "CREATE UNIQUE INDEX idx_invoice_customer ON invoice (customer_id, total)",
    "CREATE VIEW big_invoice AS SELECT * FROM invoice WHERE total > 100",
];

fn options() -> CrawlOptions {
    CrawlOptions::new()
        .with_detail_level(DetailLevel::Maximum)
        .with_duplicate_policy(DuplicatePolicy::Fail)
}

#[tokio::test]
async fn test_sqlite_reports_main_schema() -> Result<()> {
    let source = source_with(&[]).await;
    let rows: Vec<_> = source
        .fetch(&MetadataRequest::new(ObjectFamily::Schemas))
        .await?
        .try_collect()
        .await?;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text("TABLE_SCHEM").as_deref(), Some("main"));
    assert_eq!(source.source_name(), "sqlite::memory:");
    Ok(())
}

#[tokio::test]
async fn test_sqlite_crawl_builds_tables_and_views() -> Result<()> {
    let source = source_with(SALES).await;
    let result = Crawler::new(&source, options())?.crawl().await?;
    let catalog = &result.catalog;

    let tables: Vec<String> = catalog.tables().map(|t| t.name.clone()).collect();
    assert_eq!(tables, ["invoice", "product", "item", "big_invoice"]);
    assert_eq!(
        catalog.table("main.big_invoice").map(|t| t.table_type.as_str()),
        Some("VIEW")
    );
    assert!(result.report.failures.is_empty(), "{:?}", result.report.failures);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_table_type_filter() -> Result<()> {
    let source = source_with(SALES).await;
    let options = options().with_table_types(["TABLE"]);
    let result = Crawler::new(&source, options)?.crawl().await?;

    assert_eq!(result.catalog.tables().count(), 3);
    assert!(result.catalog.table("main.big_invoice").is_none());
    Ok(())
}

#[tokio::test]
async fn test_sqlite_columns_and_types() -> Result<()> {
    let source = source_with(SALES).await;
    let result = Crawler::new(&source, options())?.crawl().await?;

    let invoice = result.catalog.table("main.invoice").unwrap();
    let names: Vec<&str> = invoice.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "customer_id", "total"]);

    let total = invoice.column("total").unwrap();
    assert_eq!(total.data_type.name, "DECIMAL");
    assert_eq!(total.size, 10);
    assert_eq!(total.decimal_digits, 2);

    let product = result.catalog.table("main.product").unwrap();
    let name = product.column("name").unwrap();
    assert_eq!(name.data_type.name, "VARCHAR");
    assert_eq!(name.size, 64);

    let item = result.catalog.table("main.item").unwrap();
    let quantity = item.column("quantity").unwrap();
    assert_eq!(quantity.default_value.as_deref(), Some("1"));

    // One shared instance per type name
    let invoice_id = invoice.column("id").unwrap();
    assert!(Arc::ptr_eq(&invoice_id.data_type, &quantity.data_type));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_primary_keys_and_indexes() -> Result<()> {
    let source = source_with(SALES).await;
    let result = Crawler::new(&source, options())?.crawl().await?;

    let item = result.catalog.table("main.item").unwrap();
    let primary_key = item.primary_key.as_ref().unwrap();
    assert_eq!(primary_key.columns, ["invoice_id", "product_id"]);
    assert!(item.columns.iter().take(2).all(|c| c.part_of_primary_key));

    let product = result.catalog.table("main.product").unwrap();
    let index = product.index("idx_product_name").unwrap();
    assert!(!index.is_unique);
    assert_eq!(index.columns[0].sort_order, Some(SortOrder::Descending));

    let invoice = result.catalog.table("main.invoice").unwrap();
    let index = invoice.index("idx_invoice_customer").unwrap();
    assert!(index.is_unique);
    let columns: Vec<&str> = index.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, ["customer_id", "total"]);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_foreign_keys_resolve() -> Result<()> {
    let source = source_with(SALES).await;
    let options = options().with_sort_policy(SortPolicy::Alphabetical);
    let result = Crawler::new(&source, options)?.crawl().await?;

    let item = result.catalog.table("main.item").unwrap();
    assert_eq!(item.foreign_keys.len(), 2);

    let to_invoice = item
        .foreign_keys
        .iter()
        .find(|fk| fk.column_references[0].remote.table == "invoice")
        .unwrap();
    assert_eq!(to_invoice.delete_rule, Some(ReferentialAction::Cascade));

    // REFERENCES product names no column and targets the primary key
    let to_product = item
        .foreign_keys
        .iter()
        .find(|fk| fk.column_references[0].remote.table == "product")
        .unwrap();
    assert_eq!(to_product.column_references[0].remote.column, "id");
    assert!(result.report.warnings.is_empty(), "{:?}", result.report.warnings);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_foreign_keys_keep_declaration_order() -> Result<()> {
    let source = source_with(SALES).await;
    let options = options().with_sort_policy(SortPolicy::Natural);
    let result = Crawler::new(&source, options)?.crawl().await?;

    let item = result.catalog.table("main.item").unwrap();
    let keys: Vec<(&str, &str)> = item
        .foreign_keys
        .iter()
        .map(|fk| (fk.name.as_str(), fk.column_references[0].remote.table.as_str()))
        .collect();
    assert_eq!(keys, [("fk_item_0", "invoice"), ("fk_item_1", "product")]);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_has_no_routines() -> Result<()> {
    let source = source_with(SALES).await;
    let result = Crawler::new(&source, options())?.crawl().await?;

    assert_eq!(result.catalog.routines().count(), 0);
    assert!(result.catalog.schemas()[0].sequences().is_empty());
    assert!(result.catalog.schemas()[0].synonyms().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sqlite_attached_database_is_a_schema() -> Result<()> {
    let source = source_with(&[
        "CREATE TABLE invoice (id INTEGER PRIMARY KEY)",
        "ATTACH DATABASE ':memory:' AS archive",
        "CREATE TABLE archive.old_invoice (id INTEGER PRIMARY KEY, closed_at TEXT)",
    ])
    .await;
    let result = Crawler::new(&source, options())?.crawl().await?;

    let schemas: Vec<String> = result
        .catalog
        .schemas()
        .iter()
        .map(|s| s.full_name())
        .collect();
    assert_eq!(schemas, ["main", "archive"]);
    assert_eq!(result.catalog.columns_of("archive.old_invoice").len(), 2);
    assert!(result.catalog.table("main.old_invoice").is_none());
    Ok(())
}
