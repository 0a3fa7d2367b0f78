//! Read-only traversal of a finalized catalog.
//!
//! Renderers implement [`TraversalHandler`] and receive every object as a
//! [`SchemaObject`], a closed set of variants matched exhaustively. The
//! driver walks each schema in order: the schema itself, its tables,
//! routines, sequences, synonyms and finally its column data types.

use crate::Result;
use crate::catalog::{Catalog, Schema};
use crate::models::{ColumnDataType, ObjectFamily, Routine, Sequence, Synonym, Table};

/// One object handed to a traversal handler.
#[derive(Debug, Clone, Copy)]
pub enum SchemaObject<'a> {
    Schema(&'a Schema),
    Table(&'a Table),
    Routine(&'a Routine),
    Sequence(&'a Sequence),
    Synonym(&'a Synonym),
    ColumnDataType(&'a ColumnDataType),
}

impl SchemaObject<'_> {
    /// The family this object belongs to
    pub fn family(&self) -> ObjectFamily {
        match self {
            Self::Schema(_) => ObjectFamily::Schemas,
            Self::Table(_) => ObjectFamily::Tables,
            Self::Routine(_) => ObjectFamily::Routines,
            Self::Sequence(_) => ObjectFamily::Sequences,
            Self::Synonym(_) => ObjectFamily::Synonyms,
            Self::ColumnDataType(_) => ObjectFamily::ColumnDataTypes,
        }
    }

    /// Fully qualified name of the object
    pub fn full_name(&self) -> String {
        match self {
            Self::Schema(s) => s.full_name(),
            Self::Table(t) => t.full_name(),
            Self::Routine(r) => r.full_name(),
            Self::Sequence(s) => s.full_name(),
            Self::Synonym(s) => s.full_name(),
            Self::ColumnDataType(t) => t.full_name(),
        }
    }
}

/// Visitor over a finalized catalog.
pub trait TraversalHandler {
    /// Called once before the first object
    fn begin(&mut self, _catalog: &Catalog) -> Result<()> {
        Ok(())
    }

    /// Called for every object in traversal order
    fn handle(&mut self, object: SchemaObject<'_>) -> Result<()>;

    /// Called once after the last object
    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Walks a catalog through a handler. Stops at the first handler error.
pub fn traverse<H: TraversalHandler + ?Sized>(catalog: &Catalog, handler: &mut H) -> Result<()> {
    handler.begin(catalog)?;
    for schema in catalog.schemas() {
        handler.handle(SchemaObject::Schema(schema))?;
        for table in schema.tables() {
            handler.handle(SchemaObject::Table(table))?;
        }
        for routine in schema.routines() {
            handler.handle(SchemaObject::Routine(routine))?;
        }
        for sequence in schema.sequences() {
            handler.handle(SchemaObject::Sequence(sequence))?;
        }
        for synonym in schema.synonyms() {
            handler.handle(SchemaObject::Synonym(synonym))?;
        }
        for data_type in schema.column_data_types() {
            handler.handle(SchemaObject::ColumnDataType(data_type))?;
        }
    }
    handler.end()
}
