//! Metadata source contract.
//!
//! A metadata source answers structural questions about a database: one
//! query per object family, filtered by catalog, schema and object name,
//! returning a stream of loosely typed rows. Retrievers never assume a
//! field is present; every read goes through a helper with a default.
//!
//! # Resource discipline
//! Rows are returned as a stream borrowed from the source. Dropping the
//! stream, whether after the last row, on an early return, or while
//! unwinding from an error, releases whatever cursor backs it.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{FailureMode, MemorySource};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;

use crate::Result;
use crate::models::{Attributes, ObjectFamily};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single field value as reported by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Outcome of reading a named field: absent is distinct from present-but-null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Absent,
    Null,
    Value(&'a FieldValue),
}

/// One row of metadata, keyed by upper-case field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRow {
    fields: BTreeMap<String, FieldValue>,
}

impl MetadataRow {
    /// Creates an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter used by sources and fixtures.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field value
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Reads a field, telling absent and null apart.
    pub fn field(&self, name: &str) -> Field<'_> {
        match self.fields.get(name) {
            None => Field::Absent,
            Some(FieldValue::Null) => Field::Null,
            Some(value) => Field::Value(value),
        }
    }

    /// Reads a field as text. Numbers and booleans are rendered.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.field(name) {
            Field::Value(FieldValue::Text(s)) => Some(s.clone()),
            Field::Value(value) => Some(value.to_string()),
            Field::Absent | Field::Null => None,
        }
    }

    /// Reads a text field, treating blank values as absent.
    pub fn non_blank_text(&self, name: &str) -> Option<String> {
        self.text(name).filter(|s| !s.trim().is_empty())
    }

    /// Reads an integer field, falling back to `default`.
    ///
    /// Numeric text is parsed; anything else yields the default.
    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        self.int(name).unwrap_or(default)
    }

    /// Reads an integer field if it holds one.
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.field(name) {
            Field::Value(FieldValue::Int(i)) => Some(*i),
            Field::Value(FieldValue::Bool(b)) => Some(i64::from(*b)),
            Field::Value(FieldValue::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Reads a boolean field, falling back to `default`.
    ///
    /// Accepts booleans, 0/1 integers and common yes/no spellings.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.field(name) {
            Field::Value(FieldValue::Bool(b)) => *b,
            Field::Value(FieldValue::Int(i)) => *i != 0,
            Field::Value(FieldValue::Text(s)) => match s.trim().to_ascii_uppercase().as_str() {
                "YES" | "Y" | "TRUE" | "T" | "1" => true,
                "NO" | "N" | "FALSE" | "F" | "0" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// Fields not named in `known`, rendered as strings.
    pub fn extra_attributes(&self, known: &[&str]) -> Attributes {
        self.fields
            .iter()
            .filter(|(name, value)| !known.contains(&name.as_str()) && **value != FieldValue::Null)
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }
}

/// Filters for one metadata query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub family: ObjectFamily,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    /// Owning or target object name (table for columns, routine for
    /// routine columns); `None` means every object in the schema
    pub object: Option<String>,
    /// Family-specific filter (table types for the table query)
    pub types: Vec<String>,
}

impl MetadataRequest {
    /// Request for every object of a family in no particular schema
    pub fn new(family: ObjectFamily) -> Self {
        Self {
            family,
            catalog: None,
            schema: None,
            object: None,
            types: Vec::new(),
        }
    }

    /// Restricts the request to one schema
    pub fn in_schema(mut self, catalog: Option<&str>, schema: Option<&str>) -> Self {
        self.catalog = catalog.map(str::to_string);
        self.schema = schema.map(str::to_string);
        self
    }

    /// Restricts the request to one owning object
    pub fn for_object(mut self, object: &str) -> Self {
        self.object = Some(object.to_string());
        self
    }

    /// Sets the family-specific type filter
    pub fn with_types(mut self, types: &[String]) -> Self {
        self.types = types.to_vec();
        self
    }
}

/// Stream of rows returned for one request.
pub type MetadataRows<'a> = BoxStream<'a, Result<MetadataRow>>;

/// Capability to answer metadata queries.
///
/// Implementations must treat the filters in [`MetadataRequest`] as hints;
/// retrievers re-check ownership of every row they receive.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Human-readable name of the source, safe to log
    fn source_name(&self) -> String;

    /// Runs one metadata query
    async fn fetch(&self, request: &MetadataRequest) -> Result<MetadataRows<'_>>;
}
