//! SQLite metadata source.
//!
//! SQLite has no catalogs; every attached database (`main` plus anything
//! attached to the connection) is reported as a schema. Structural facts
//! come from `sqlite_master` and the `table_info`, `index_list`,
//! `index_xinfo` and `foreign_key_list` pragmas. Routines, sequences and
//! synonyms do not exist in SQLite and yield empty results.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - Plain paths ending in `.db`, `.sqlite` or `.sqlite3`
//! - In-memory: `sqlite::memory:` or `:memory:`
//!
//! # Security
//! Databases are opened read-only unless the connection config says
//! otherwise. The connection string itself is never logged.

use super::{MetadataRequest, MetadataRow, MetadataRows, MetadataSource};
use crate::Result;
use crate::config::ConnectionConfig;
use crate::error::CrawlError;
use crate::models::ObjectFamily;
use async_trait::async_trait;
use futures::{StreamExt, stream};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::str::FromStr;
use url::Url;

const TABLES_SQL: &str = r#"
    SELECT name, type
    FROM sqlite_master
    WHERE type IN ('table', 'view')
    AND name NOT LIKE 'sqlite_%'
    ORDER BY rowid
"#;

/// Type codes reported for the five SQLite storage affinities.
const AFFINITIES: &[(&str, i32)] = &[
    ("INTEGER", 4),
    ("TEXT", 12),
    ("REAL", 8),
    ("BLOB", 2004),
    ("NUMERIC", 2),
];

/// Metadata source backed by a SQLite database.
pub struct SqliteSource {
    pool: SqlitePool,
    database_name: String,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("database_name", &self.database_name)
            .finish_non_exhaustive()
    }
}

impl SqliteSource {
    /// Opens a SQLite database with the default (read-only) configuration.
    ///
    /// # Errors
    /// Returns error if the connection string is malformed or the database
    /// cannot be opened
    pub async fn new(connection_string: &str) -> Result<Self> {
        Self::with_config(connection_string, ConnectionConfig::default()).await
    }

    /// Opens a SQLite database with a custom connection configuration.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        validate_sqlite_connection_string(connection_string)?;

        let normalized = normalize_connection_string(connection_string);
        let mut options = SqliteConnectOptions::from_str(&normalized).map_err(|e| {
            CrawlError::configuration(format!("Invalid SQLite connection string: {}", e))
        })?;
        if config.read_only {
            options = options.read_only(true);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| CrawlError::source_failed("Failed to open SQLite database", e))?;

        let database_name = extract_database_name(connection_string);
        tracing::debug!("Opened SQLite database '{}'", database_name);
        Ok(Self {
            pool,
            database_name,
        })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool, database_name: impl Into<String>) -> Self {
        Self {
            pool,
            database_name: database_name.into(),
        }
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_all(&self, sql: &str, context: &str) -> Result<Vec<SqliteRow>> {
        tracing::trace!("SQLite query: {}", sql.trim());
        sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CrawlError::source_failed(context.to_string(), e))
    }

    async fn schemas(&self) -> Result<Vec<MetadataRow>> {
        let rows = self
            .fetch_all("PRAGMA database_list", "Failed to list SQLite databases")
            .await?;
        Ok(rows
            .iter()
            .map(|row| text(row, "name"))
            .filter(|name| name != "temp")
            .map(|name| MetadataRow::new().with("TABLE_SCHEM", name))
            .collect())
    }

    async fn tables(&self, schema: &str, types: &[String]) -> Result<Vec<MetadataRow>> {
        let sql = TABLES_SQL.replace("sqlite_master", &master_table(schema));
        let rows = self.fetch_all(&sql, "Failed to list SQLite tables").await?;
        Ok(rows
            .iter()
            .map(|row| (text(row, "name"), text(row, "type").to_uppercase()))
            .filter(|(_, table_type)| {
                types.is_empty() || types.iter().any(|t| t.eq_ignore_ascii_case(table_type))
            })
            .map(|(name, table_type)| {
                MetadataRow::new()
                    .with("TABLE_SCHEM", schema)
                    .with("TABLE_NAME", name)
                    .with("TABLE_TYPE", table_type)
            })
            .collect())
    }

    /// Tables to inspect: the requested one, or every table and view.
    async fn table_names(&self, schema: &str, object: Option<&str>) -> Result<Vec<String>> {
        if let Some(object) = object {
            return Ok(vec![object.to_string()]);
        }
        let sql = TABLES_SQL.replace("sqlite_master", &master_table(schema));
        let rows = self.fetch_all(&sql, "Failed to list SQLite tables").await?;
        Ok(rows.iter().map(|row| text(row, "name")).collect())
    }

    async fn table_info(&self, schema: &str, table: &str) -> Result<Vec<SqliteRow>> {
        let sql = format!(
            "PRAGMA {}.table_info({})",
            quote_ident(schema),
            quote_literal(table)
        );
        self.fetch_all(&sql, &format!("Failed to collect columns for table '{}'", table))
            .await
    }

    async fn columns(&self, schema: &str, object: Option<&str>) -> Result<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for table in self.table_names(schema, object).await? {
            for row in self.table_info(schema, &table).await? {
                let declared = text(&row, "type");
                let (base, size, scale) = split_declared_type(&declared);
                let not_null = int(&row, "notnull") != 0 || int(&row, "pk") > 0;

                let mut column = MetadataRow::new()
                    .with("TABLE_SCHEM", schema)
                    .with("TABLE_NAME", table.as_str())
                    .with("COLUMN_NAME", text(&row, "name"))
                    .with("DATA_TYPE", affinity_code(&base))
                    .with("NULLABLE", if not_null { 0 } else { 1 })
                    .with("ORDINAL_POSITION", int(&row, "cid").saturating_add(1))
                    .with("COLUMN_DEF", optional_text(&row, "dflt_value"));
                if !base.is_empty() {
                    column.set("TYPE_NAME", base);
                }
                if let Some(size) = size {
                    column.set("COLUMN_SIZE", size);
                }
                if let Some(scale) = scale {
                    column.set("DECIMAL_DIGITS", scale);
                }
                result.push(column);
            }
        }
        Ok(result)
    }

    /// Primary key columns of a table in key order.
    async fn key_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let mut columns: Vec<(i64, String)> = self
            .table_info(schema, table)
            .await?
            .iter()
            .filter(|row| int(row, "pk") > 0)
            .map(|row| (int(row, "pk"), text(row, "name")))
            .collect();
        columns.sort_by_key(|(seq, _)| *seq);
        Ok(columns.into_iter().map(|(_, name)| name).collect())
    }

    async fn primary_keys(&self, schema: &str, object: Option<&str>) -> Result<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for table in self.table_names(schema, object).await? {
            for (seq, column) in self.key_columns(schema, &table).await?.into_iter().enumerate() {
                result.push(
                    MetadataRow::new()
                        .with("TABLE_SCHEM", schema)
                        .with("TABLE_NAME", table.as_str())
                        .with("COLUMN_NAME", column)
                        .with("KEY_SEQ", i64::try_from(seq).unwrap_or(i64::MAX).saturating_add(1)),
                );
            }
        }
        Ok(result)
    }

    async fn indexes(&self, schema: &str, object: Option<&str>) -> Result<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for table in self.table_names(schema, object).await? {
            let list_sql = format!(
                "PRAGMA {}.index_list({})",
                quote_ident(schema),
                quote_literal(&table)
            );
            let listed = self
                .fetch_all(&list_sql, &format!("Failed to collect indexes for table '{}'", table))
                .await?;
            let unique: HashMap<String, bool> = listed
                .iter()
                .map(|entry| (text(entry, "name"), int(entry, "unique") != 0))
                .collect();

            // Creation order, which index_list does not preserve
            let order_sql = format!(
                "SELECT name FROM {} WHERE type = 'index' AND tbl_name = {} ORDER BY rowid",
                master_table(schema),
                quote_literal(&table)
            );
            let ordered = self
                .fetch_all(&order_sql, &format!("Failed to order indexes for table '{}'", table))
                .await?;

            for entry in &ordered {
                let index_name = text(entry, "name");
                let is_unique = unique.get(&index_name).copied().unwrap_or(false);
                let info_sql = format!(
                    "PRAGMA {}.index_xinfo({})",
                    quote_ident(schema),
                    quote_literal(&index_name)
                );
                let info = self
                    .fetch_all(
                        &info_sql,
                        &format!("Failed to collect index columns for '{}'", index_name),
                    )
                    .await?;

                for column in info.iter().filter(|c| int(c, "key") != 0) {
                    let mut row = MetadataRow::new()
                        .with("TABLE_SCHEM", schema)
                        .with("TABLE_NAME", table.as_str())
                        .with("INDEX_NAME", index_name.as_str())
                        .with("NON_UNIQUE", !is_unique)
                        .with("TYPE", 3)
                        .with("ORDINAL_POSITION", int(column, "seqno").saturating_add(1))
                        .with("ASC_OR_DESC", if int(column, "desc") != 0 { "D" } else { "A" });
                    // Expression columns have no name
                    if let Some(name) = optional_text(column, "name") {
                        row.set("COLUMN_NAME", name);
                    }
                    result.push(row);
                }
            }
        }
        Ok(result)
    }

    async fn foreign_keys(&self, schema: &str, object: Option<&str>) -> Result<Vec<MetadataRow>> {
        let mut result = Vec::new();
        for table in self.table_names(schema, object).await? {
            let sql = format!(
                "PRAGMA {}.foreign_key_list({})",
                quote_ident(schema),
                quote_literal(&table)
            );
            let rows = self
                .fetch_all(&sql, &format!("Failed to collect foreign keys for table '{}'", table))
                .await?;

            // Ids count down from the last declared key
            let mut ordered: Vec<&SqliteRow> = rows.iter().collect();
            ordered.sort_by_key(|row| (Reverse(int(row, "id")), int(row, "seq")));

            let mut declared: Vec<i64> = Vec::new();
            for row in ordered {
                let id = int(row, "id");
                if !declared.contains(&id) {
                    declared.push(id);
                }
                let number = declared.len().saturating_sub(1);
                let seq = int(row, "seq");
                let target = text(row, "table");
                // A reference without target columns points at the primary key
                let remote_column = match optional_text(row, "to") {
                    Some(column) => Some(column),
                    None => self
                        .key_columns(schema, &target)
                        .await?
                        .into_iter()
                        .nth(usize::try_from(seq).unwrap_or(usize::MAX)),
                };

                let mut fk = MetadataRow::new()
                    .with("FKTABLE_SCHEM", schema)
                    .with("FKTABLE_NAME", table.as_str())
                    .with("FKCOLUMN_NAME", text(row, "from"))
                    .with("PKTABLE_SCHEM", schema)
                    .with("PKTABLE_NAME", target.as_str())
                    .with("FK_NAME", format!("fk_{}_{}", table, number))
                    .with("KEY_SEQ", seq.saturating_add(1))
                    .with("UPDATE_RULE", referential_action_code(&text(row, "on_update")))
                    .with("DELETE_RULE", referential_action_code(&text(row, "on_delete")));
                if let Some(column) = remote_column {
                    fk.set("PKCOLUMN_NAME", column);
                }
                result.push(fk);
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl MetadataSource for SqliteSource {
    fn source_name(&self) -> String {
        format!("sqlite:{}", self.database_name)
    }

    async fn fetch(&self, request: &MetadataRequest) -> Result<MetadataRows<'_>> {
        let schema = request.schema.clone().unwrap_or_else(|| "main".to_string());
        let object = request.object.as_deref();

        let rows = match request.family {
            ObjectFamily::Schemas => self.schemas().await?,
            ObjectFamily::Tables => self.tables(&schema, &request.types).await?,
            ObjectFamily::Columns => self.columns(&schema, object).await?,
            ObjectFamily::PrimaryKeys => self.primary_keys(&schema, object).await?,
            ObjectFamily::Indexes => self.indexes(&schema, object).await?,
            ObjectFamily::ForeignKeys => self.foreign_keys(&schema, object).await?,
            ObjectFamily::ColumnDataTypes => AFFINITIES
                .iter()
                .map(|(name, code)| {
                    MetadataRow::new()
                        .with("TYPE_SCHEM", schema.as_str())
                        .with("TYPE_NAME", *name)
                        .with("DATA_TYPE", *code)
                        .with("NULLABLE", 1)
                        .with("USER_DEFINED", false)
                })
                .collect(),
            ObjectFamily::Routines
            | ObjectFamily::RoutineColumns
            | ObjectFamily::Sequences
            | ObjectFamily::Synonyms => Vec::new(),
        };

        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}

fn text(row: &SqliteRow, column: &str) -> String {
    row.try_get::<String, _>(column).unwrap_or_default()
}

fn optional_text(row: &SqliteRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column).ok().flatten()
}

fn int(row: &SqliteRow, column: &str) -> i64 {
    row.try_get::<i64, _>(column).unwrap_or(0)
}

fn master_table(schema: &str) -> String {
    format!("{}.sqlite_master", quote_ident(schema))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Splits a declared type such as `DECIMAL(10, 2)` into its base name,
/// size and scale. The base name is upper-cased.
fn split_declared_type(declared: &str) -> (String, Option<i64>, Option<i64>) {
    let declared = declared.trim();
    let Some((base, rest)) = declared.split_once('(') else {
        return (declared.to_uppercase(), None, None);
    };
    let args = rest.trim_end_matches(')');
    let mut parts = args.split(',').map(|p| p.trim().parse::<i64>().ok());
    let size = parts.next().flatten();
    let scale = parts.next().flatten();
    (base.trim().to_uppercase(), size, scale)
}

/// Type code for a declared base type, following SQLite's affinity rules.
fn affinity_code(base: &str) -> i32 {
    let code = |name: &str| {
        AFFINITIES
            .iter()
            .find(|(affinity, _)| *affinity == name)
            .map_or(0, |(_, code)| *code)
    };
    if base.contains("INT") {
        code("INTEGER")
    } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
        code("TEXT")
    } else if base.is_empty() || base.contains("BLOB") {
        code("BLOB")
    } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
        code("REAL")
    } else {
        code("NUMERIC")
    }
}

fn referential_action_code(action: &str) -> Option<i64> {
    match action.to_uppercase().as_str() {
        "CASCADE" => Some(0),
        "RESTRICT" => Some(1),
        "SET NULL" => Some(2),
        "NO ACTION" | "" => Some(3),
        "SET DEFAULT" => Some(4),
        _ => None,
    }
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns error if connection string is invalid
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:" {
        return Ok(());
    }

    if connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    if connection_string.starts_with("sqlite:") {
        if connection_string.contains(":memory:") || connection_string.contains("mode=memory") {
            return Ok(());
        }
        if let Ok(url) = Url::parse(connection_string) {
            if url.scheme() != "sqlite" {
                return Err(CrawlError::configuration(
                    "Connection string must use sqlite:// scheme",
                ));
            }
            return Ok(());
        }
        if connection_string.starts_with("sqlite://") {
            return Ok(());
        }
    }

    Err(CrawlError::configuration(
        "Invalid SQLite connection string format: expected sqlite:// URL, file path, or :memory:",
    ))
}

/// Whether a connection string names a SQLite database.
pub fn is_sqlite_connection_string(connection_string: &str) -> bool {
    validate_sqlite_connection_string(connection_string).is_ok()
}

fn extract_database_name(connection_string: &str) -> String {
    if connection_string.contains(":memory:") {
        return ":memory:".to_string();
    }

    let path = connection_string
        .strip_prefix("sqlite://")
        .or_else(|| connection_string.strip_prefix("sqlite:"))
        .unwrap_or(connection_string);
    let path = path.split('?').next().unwrap_or(path);
    match path.rsplit('/').next() {
        Some(filename) if !filename.is_empty() => filename.to_string(),
        _ => "main".to_string(),
    }
}

fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }
    format!("sqlite://{}", connection_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sqlite_connection_string() {
        assert!(validate_sqlite_connection_string(":memory:").is_ok());
        assert!(validate_sqlite_connection_string("sqlite::memory:").is_ok());
        assert!(validate_sqlite_connection_string("sqlite:///path/to/db.sqlite").is_ok());
        assert!(validate_sqlite_connection_string("./local.sqlite").is_ok());
        assert!(validate_sqlite_connection_string("data.sqlite3").is_ok());

        assert!(validate_sqlite_connection_string("postgres://localhost/db").is_err());
        assert!(validate_sqlite_connection_string("invalid").is_err());
    }

    #[test]
    fn test_extract_database_name() {
        assert_eq!(extract_database_name(":memory:"), ":memory:");
        assert_eq!(
            extract_database_name("sqlite:///path/to/mydb.sqlite"),
            "mydb.sqlite"
        );
        assert_eq!(extract_database_name("/data/app.db?mode=ro"), "app.db");
    }

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(normalize_connection_string("test.db"), "sqlite://test.db");
        assert_eq!(normalize_connection_string("sqlite://x.db"), "sqlite://x.db");
    }

    #[test]
    fn test_split_declared_type() {
        assert_eq!(
            split_declared_type("varchar(255)"),
            ("VARCHAR".to_string(), Some(255), None)
        );
        assert_eq!(
            split_declared_type("DECIMAL(10, 2)"),
            ("DECIMAL".to_string(), Some(10), Some(2))
        );
        assert_eq!(split_declared_type(""), (String::new(), None, None));
    }

    #[test]
    fn test_affinity_codes() {
        assert_eq!(affinity_code("BIGINT"), 4);
        assert_eq!(affinity_code("NVARCHAR"), 12);
        assert_eq!(affinity_code("DOUBLE PRECISION"), 8);
        assert_eq!(affinity_code(""), 2004);
        assert_eq!(affinity_code("DECIMAL"), 2);
    }

    #[test]
    fn test_referential_action_codes() {
        assert_eq!(referential_action_code("CASCADE"), Some(0));
        assert_eq!(referential_action_code("set null"), Some(2));
        assert_eq!(referential_action_code("NO ACTION"), Some(3));
        assert_eq!(referential_action_code("bogus"), None);
    }
}
