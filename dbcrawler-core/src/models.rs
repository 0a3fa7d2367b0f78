//! Core data models for crawled database structure.
//!
//! These are the objects a crawl assembles: schemas, tables, columns,
//! routines, sequences, synonyms, indexes, foreign keys and the shared
//! column data types. Names are kept exactly as the metadata source
//! reported them; no case folding or quoting is applied.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Extra, source-specific metadata kept at the maximum detail level.
pub type Attributes = BTreeMap<String, String>;

/// Name used for the shared sentinel type given to columns whose type
/// could not be determined.
pub const UNKNOWN_TYPE_NAME: &str = "<unknown>";

/// The closed set of object families a crawl knows how to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectFamily {
    Schemas,
    Tables,
    Columns,
    PrimaryKeys,
    Indexes,
    ForeignKeys,
    Routines,
    RoutineColumns,
    Sequences,
    Synonyms,
    ColumnDataTypes,
}

impl ObjectFamily {
    /// Every family, in the order a schema's retrievers run.
    pub const RETRIEVAL_ORDER: [Self; 10] = [
        Self::ColumnDataTypes,
        Self::Tables,
        Self::Columns,
        Self::PrimaryKeys,
        Self::Indexes,
        Self::ForeignKeys,
        Self::Routines,
        Self::RoutineColumns,
        Self::Sequences,
        Self::Synonyms,
    ];
}

impl std::fmt::Display for ObjectFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Schemas => "schemas",
            Self::Tables => "tables",
            Self::Columns => "columns",
            Self::PrimaryKeys => "primary keys",
            Self::Indexes => "indexes",
            Self::ForeignKeys => "foreign keys",
            Self::Routines => "routines",
            Self::RoutineColumns => "routine columns",
            Self::Sequences => "sequences",
            Self::Synonyms => "synonyms",
            Self::ColumnDataTypes => "column data types",
        };
        f.write_str(name)
    }
}

/// Anything with a simple name that can be sorted for output.
pub trait NamedObject {
    /// The unqualified object name
    fn name(&self) -> &str;
}

/// Identifies a schema by its (catalog, schema) pair.
///
/// Either part may be absent for backends that support only one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaRef {
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

impl SchemaRef {
    /// Creates a schema reference; blank names are treated as absent.
    pub fn new(catalog: Option<String>, schema: Option<String>) -> Self {
        Self {
            catalog: catalog.filter(|c| !c.trim().is_empty()),
            schema: schema.filter(|s| !s.trim().is_empty()),
        }
    }

    /// Creates a reference to a schema with no catalog.
    pub fn named(schema: impl Into<String>) -> Self {
        Self::new(None, Some(schema.into()))
    }

    /// Dotted `catalog.schema` name, skipping absent parts.
    pub fn full_name(&self) -> String {
        match (&self.catalog, &self.schema) {
            (Some(catalog), Some(schema)) => format!("{}.{}", catalog, schema),
            (Some(catalog), None) => catalog.clone(),
            (None, Some(schema)) => schema.clone(),
            (None, None) => String::new(),
        }
    }

    /// Qualifies an object name with this schema's full name.
    pub fn qualify(&self, name: &str) -> String {
        let prefix = self.full_name();
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    }

    /// Checks whether a row's catalog/schema pair names this schema.
    ///
    /// A part that is absent on either side is treated as unsupported by the
    /// backend and matches anything.
    pub fn matches(&self, catalog: Option<&str>, schema: Option<&str>) -> bool {
        let part_matches = |ours: Option<&str>, theirs: Option<&str>| match (ours, theirs) {
            (Some(ours), Some(theirs)) => theirs.trim().is_empty() || ours == theirs,
            _ => true,
        };
        part_matches(self.catalog.as_deref(), catalog) && part_matches(self.schema.as_deref(), schema)
    }
}

impl std::fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Nullability as reported by the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    NoNulls,
    Nullable,
    /// The source did not say
    #[default]
    Unknown,
}

impl Nullability {
    /// Decodes the standard metadata code (0 = no nulls, 1 = nullable).
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::NoNulls,
            1 => Self::Nullable,
            _ => Self::Unknown,
        }
    }
}

/// A deduplicated data type shared by every column that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDataType {
    pub schema: SchemaRef,
    pub name: String,
    /// Native type code from the source
    pub type_code: i32,
    pub precision: Option<i64>,
    pub nullability: Nullability,
    pub user_defined: bool,
    pub remarks: Option<String>,
    pub attributes: Attributes,
}

impl ColumnDataType {
    /// Creates a bare type carrying only what a column reference knows.
    pub fn new(schema: SchemaRef, name: impl Into<String>, type_code: i32) -> Self {
        Self {
            schema,
            name: name.into(),
            type_code,
            precision: None,
            nullability: Nullability::Unknown,
            user_defined: false,
            remarks: None,
            attributes: Attributes::new(),
        }
    }

    /// Schema-qualified type name
    pub fn full_name(&self) -> String {
        self.schema.qualify(&self.name)
    }

    /// True for the sentinel given to columns with no resolvable type
    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_TYPE_NAME
    }
}

impl NamedObject for ColumnDataType {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A table (or procedure) column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Dense 0-based position in discovery order
    pub ordinal_position: u32,
    pub data_type: Arc<ColumnDataType>,
    pub nullability: Nullability,
    pub size: i64,
    pub decimal_digits: i64,
    pub default_value: Option<String>,
    pub part_of_primary_key: bool,
    pub remarks: Option<String>,
    pub attributes: Attributes,
}

impl Column {
    /// Creates a column with neutral defaults for every attribute.
    pub fn new(name: impl Into<String>, data_type: Arc<ColumnDataType>) -> Self {
        Self {
            name: name.into(),
            ordinal_position: 0,
            data_type,
            nullability: Nullability::Unknown,
            size: 0,
            decimal_digits: 0,
            default_value: None,
            part_of_primary_key: false,
            remarks: None,
            attributes: Attributes::new(),
        }
    }
}

impl NamedObject for Column {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Primary key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Sort order for index columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Decodes the `A`/`D` marker used by metadata sources.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim() {
            "A" | "a" => Some(Self::Ascending),
            "D" | "d" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// Index column with ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub sort_order: Option<SortOrder>,
}

/// Database index information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub is_unique: bool,
    pub index_type: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub attributes: Attributes,
}

impl NamedObject for Index {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Referential actions for foreign keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    /// Decodes the standard metadata rule code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Cascade),
            1 => Some(Self::Restrict),
            2 => Some(Self::SetNull),
            3 => Some(Self::NoAction),
            4 => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// Name-based path to a column anywhere in the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnPath {
    pub schema: SchemaRef,
    pub table: String,
    pub column: String,
}

impl ColumnPath {
    /// Creates a column path
    pub fn new(schema: SchemaRef, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            schema,
            table: table.into(),
            column: column.into(),
        }
    }

    /// Full name of the owning table
    pub fn table_full_name(&self) -> String {
        self.schema.qualify(&self.table)
    }

    /// `schema.table.column`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.table_full_name(), self.column)
    }
}

/// One (local column -> remote column) pair of a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub key_sequence: u32,
    pub local: ColumnPath,
    pub remote: ColumnPath,
}

/// A foreign key whose every column pair resolved inside the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub column_references: Vec<ColumnReference>,
    pub update_rule: Option<ReferentialAction>,
    pub delete_rule: Option<ReferentialAction>,
}

impl NamedObject for ForeignKey {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Database table information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub schema: SchemaRef,
    pub name: String,
    /// Table type tag exactly as reported (`TABLE`, `VIEW`, ...)
    pub table_type: String,
    pub remarks: Option<String>,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub attributes: Attributes,
}

impl Table {
    /// Creates an empty table
    pub fn new(schema: SchemaRef, name: impl Into<String>) -> Self {
        Self {
            schema,
            name: name.into(),
            table_type: "UNKNOWN".to_string(),
            remarks: None,
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// `schema.name`
    pub fn full_name(&self) -> String {
        self.schema.qualify(&self.name)
    }

    /// Finds a column by exact name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finds an index by exact name
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Finds a foreign key by exact name
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }
}

impl NamedObject for Table {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Whether a routine produces a result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineReturnType {
    #[default]
    Unknown,
    NoResult,
    ReturnsResult,
}

impl RoutineReturnType {
    /// Decodes the standard procedure type code.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::NoResult,
            2 => Self::ReturnsResult,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for RoutineReturnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::NoResult => write!(f, "no result"),
            Self::ReturnsResult => write!(f, "returns result"),
        }
    }
}

/// Role of a routine column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineColumnType {
    #[default]
    Unknown,
    In,
    InOut,
    Result,
    Out,
    Return,
}

impl RoutineColumnType {
    /// Decodes the standard procedure column type code.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::In,
            2 => Self::InOut,
            3 => Self::Result,
            4 => Self::Out,
            5 => Self::Return,
            _ => Self::Unknown,
        }
    }
}

/// A parameter or result column of a routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineColumn {
    pub name: String,
    pub ordinal_position: u32,
    pub column_type: RoutineColumnType,
    pub data_type: Arc<ColumnDataType>,
    pub nullability: Nullability,
    pub size: i64,
    pub precision: i64,
    pub remarks: Option<String>,
    pub attributes: Attributes,
}

impl NamedObject for RoutineColumn {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Stored procedure or function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub schema: SchemaRef,
    pub name: String,
    /// Disambiguates overloads that share `name`
    pub specific_name: Option<String>,
    pub return_type: RoutineReturnType,
    pub remarks: Option<String>,
    pub columns: Vec<RoutineColumn>,
    pub attributes: Attributes,
}

impl Routine {
    /// Creates a routine with no columns
    pub fn new(schema: SchemaRef, name: impl Into<String>) -> Self {
        Self {
            schema,
            name: name.into(),
            specific_name: None,
            return_type: RoutineReturnType::Unknown,
            remarks: None,
            columns: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// `schema.name`
    pub fn full_name(&self) -> String {
        self.schema.qualify(&self.name)
    }

    /// Key unique across overloads: the specific name when there is one.
    pub fn lookup_key(&self) -> RoutineKey {
        match self.specific_name.as_deref() {
            Some(specific) if !specific.trim().is_empty() => {
                RoutineKey::Specific(self.schema.qualify(specific))
            }
            _ => RoutineKey::Name(self.full_name()),
        }
    }
}

/// Identifies one routine among its overloads.
///
/// The two forms never compare equal, so a routine named `X` cannot clash
/// with another routine whose specific name is `X`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoutineKey {
    /// Qualified specific name
    Specific(String),
    /// Qualified routine name, for routines reported without a specific name
    Name(String),
}

impl RoutineKey {
    /// Key for a qualified specific name such as `PUBLIC.CALC_1`
    pub fn specific(qualified: impl Into<String>) -> Self {
        Self::Specific(qualified.into())
    }

    /// Key for a routine without a specific name
    pub fn name(qualified: impl Into<String>) -> Self {
        Self::Name(qualified.into())
    }
}

impl std::fmt::Display for RoutineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Specific(name) | Self::Name(name) => f.write_str(name),
        }
    }
}

impl NamedObject for Routine {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Database sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub schema: SchemaRef,
    pub name: String,
    pub increment: Option<i64>,
    pub minimum_value: Option<i64>,
    pub maximum_value: Option<i64>,
    pub cycle: bool,
    pub remarks: Option<String>,
    pub attributes: Attributes,
}

impl Sequence {
    /// `schema.name`
    pub fn full_name(&self) -> String {
        self.schema.qualify(&self.name)
    }
}

impl NamedObject for Sequence {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Database synonym
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synonym {
    pub schema: SchemaRef,
    pub name: String,
    /// Full name of the object the synonym stands for, when reported
    pub referenced_object: Option<String>,
    pub remarks: Option<String>,
    pub attributes: Attributes,
}

impl Synonym {
    /// `schema.name`
    pub fn full_name(&self) -> String {
        self.schema.qualify(&self.name)
    }
}

impl NamedObject for Synonym {
    fn name(&self) -> &str {
        &self.name
    }
}
