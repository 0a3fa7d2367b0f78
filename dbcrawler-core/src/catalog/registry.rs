//! Shared column data type registry.
//!
//! One store per catalog maps (schema, type name) to the single shared
//! `ColumnDataType` instance for that pair. Lookup-or-create goes through a
//! `DashMap` entry, which holds the shard lock across the check and the
//! insert, so concurrent schema crawls never create a type twice.

use crate::models::{ColumnDataType, SchemaRef};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// (catalog, schema, type name)
type TypeKey = (Option<String>, Option<String>, String);

fn type_key(schema: &SchemaRef, name: &str) -> TypeKey {
    (schema.catalog.clone(), schema.schema.clone(), name.to_string())
}

/// A registered type and the order it was first seen in.
#[derive(Debug)]
struct RegisteredType {
    order: u64,
    data_type: Arc<ColumnDataType>,
}

/// Deduplicating store of column data types for one catalog.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: DashMap<TypeKey, RegisteredType>,
    next_order: AtomicU64,
}

impl TypeRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_insert_with(
        &self,
        key: TypeKey,
        create: impl FnOnce() -> ColumnDataType,
    ) -> Arc<ColumnDataType> {
        let entry = self.types.entry(key).or_insert_with(|| RegisteredType {
            order: self.next_order.fetch_add(1, Ordering::Relaxed),
            data_type: Arc::new(create()),
        });
        Arc::clone(&entry.data_type)
    }

    /// Returns the shared type for `(schema, name)`, creating it on first use.
    pub fn lookup_or_create(
        &self,
        schema: &SchemaRef,
        type_code: i32,
        name: &str,
    ) -> Arc<ColumnDataType> {
        self.get_or_insert_with(type_key(schema, name), || {
            tracing::trace!("Registering data type {}", schema.qualify(name));
            ColumnDataType::new(schema.clone(), name, type_code)
        })
    }

    /// Registers a fully described type. The first registration for a key wins.
    pub fn register(&self, data_type: ColumnDataType) -> Arc<ColumnDataType> {
        let key = type_key(&data_type.schema, &data_type.name);
        self.get_or_insert_with(key, || data_type)
    }

    /// Looks up a type without creating it
    pub fn lookup(&self, schema: &SchemaRef, name: &str) -> Option<Arc<ColumnDataType>> {
        self.types
            .get(&type_key(schema, name))
            .map(|entry| Arc::clone(&entry.data_type))
    }

    /// Every registered type belonging to one schema, in registration order.
    pub fn types_in(&self, schema: &SchemaRef) -> Vec<Arc<ColumnDataType>> {
        let mut types: Vec<(u64, Arc<ColumnDataType>)> = self
            .types
            .iter()
            .filter(|entry| entry.data_type.schema == *schema)
            .map(|entry| (entry.order, Arc::clone(&entry.data_type)))
            .collect();
        types.sort_by_key(|(order, _)| *order);
        types.into_iter().map(|(_, data_type)| data_type).collect()
    }

    /// Total number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when no type has been registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_or_create_shares_instances() {
        let registry = TypeRegistry::new();
        let schema = SchemaRef::named("PUBLIC");

        let first = registry.lookup_or_create(&schema, 4, "INTEGER");
        let second = registry.lookup_or_create(&schema, 4, "INTEGER");
        let other = registry.lookup_or_create(&schema, 12, "VARCHAR");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_types_are_per_schema() {
        let registry = TypeRegistry::new();
        let public = SchemaRef::named("PUBLIC");
        let sales = SchemaRef::named("SALES");

        let a = registry.lookup_or_create(&public, 4, "INTEGER");
        let b = registry.lookup_or_create(&sales, 4, "INTEGER");

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.types_in(&public).len(), 1);
        assert!(registry.lookup(&sales, "VARCHAR").is_none());
    }

    #[test]
    fn test_types_in_keeps_registration_order() {
        let registry = TypeRegistry::new();
        let schema = SchemaRef::named("PUBLIC");

        for name in ["VARCHAR", "INTEGER", "DECIMAL", "BLOB"] {
            registry.lookup_or_create(&schema, 0, name);
        }
        registry.lookup_or_create(&SchemaRef::named("SALES"), 0, "TEXT");

        let names: Vec<String> = registry
            .types_in(&schema)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, ["VARCHAR", "INTEGER", "DECIMAL", "BLOB"]);
    }

    #[test]
    fn test_register_keeps_first_writer() {
        let registry = TypeRegistry::new();
        let schema = SchemaRef::named("PUBLIC");

        let mut described = ColumnDataType::new(schema.clone(), "DECIMAL", 3);
        described.precision = Some(38);
        let registered = registry.register(described);
        let referenced = registry.lookup_or_create(&schema, 3, "DECIMAL");

        assert!(Arc::ptr_eq(&registered, &referenced));
        assert_eq!(referenced.precision, Some(38));

        let later = registry.register(ColumnDataType::new(schema, "DECIMAL", 3));
        assert_eq!(later.precision, Some(38));
    }

    #[test]
    fn test_concurrent_creation_yields_one_instance() {
        let registry = Arc::new(TypeRegistry::new());
        let schema = SchemaRef::named("PUBLIC");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let schema = schema.clone();
                std::thread::spawn(move || registry.lookup_or_create(&schema, 4, "INTEGER"))
            })
            .collect();

        let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(types.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
