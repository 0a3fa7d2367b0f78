//! Crawl-time builder for one schema.
//!
//! A `SchemaFragment` is the mutable, in-progress model of a single schema.
//! Only the retrievers running for that schema touch it, one family at a
//! time. Objects are stored in discovery order and indexed by full name so
//! ownership lookups do not scan. Foreign keys are parked here unresolved
//! until every schema has been retrieved.

use crate::config::DuplicatePolicy;
use crate::crawl::report::{CrawlReport, CrawlWarning};
use crate::error::CrawlError;
use crate::models::{
    Column, ColumnReference, ForeignKey, Index, ObjectFamily, PrimaryKey, ReferentialAction, Routine,
    RoutineColumn, RoutineKey, SchemaRef, Sequence, Synonym, Table,
};
use crate::Result;
use std::collections::{HashMap, HashSet};

/// A foreign key awaiting resolution against the whole model.
#[derive(Debug, Clone)]
pub struct PendingForeignKey {
    /// Full name of the table holding the referencing columns
    pub table: String,
    pub name: String,
    pub column_references: Vec<ColumnReference>,
    pub update_rule: Option<ReferentialAction>,
    pub delete_rule: Option<ReferentialAction>,
}

/// In-progress model of one schema.
#[derive(Debug)]
pub struct SchemaFragment {
    schema: SchemaRef,
    duplicate_policy: DuplicatePolicy,
    pub(crate) tables: Vec<Table>,
    table_index: HashMap<String, usize>,
    /// (family, owning table full name, child name) for columns, indexes
    /// and foreign keys
    table_children: HashSet<(ObjectFamily, String, String)>,
    pub(crate) routines: Vec<Routine>,
    routine_index: HashMap<RoutineKey, usize>,
    routine_columns: HashSet<(RoutineKey, String)>,
    pub(crate) sequences: Vec<Sequence>,
    sequence_index: HashMap<String, usize>,
    pub(crate) synonyms: Vec<Synonym>,
    synonym_index: HashMap<String, usize>,
    pub(crate) pending_foreign_keys: Vec<PendingForeignKey>,
    pub(crate) report: CrawlReport,
}

impl SchemaFragment {
    /// Creates an empty fragment for a schema
    pub fn new(schema: SchemaRef, duplicate_policy: DuplicatePolicy) -> Self {
        Self {
            schema,
            duplicate_policy,
            tables: Vec::new(),
            table_index: HashMap::new(),
            table_children: HashSet::new(),
            routines: Vec::new(),
            routine_index: HashMap::new(),
            routine_columns: HashSet::new(),
            sequences: Vec::new(),
            sequence_index: HashMap::new(),
            synonyms: Vec::new(),
            synonym_index: HashMap::new(),
            pending_foreign_keys: Vec::new(),
            report: CrawlReport::default(),
        }
    }

    /// The schema this fragment builds
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Records a warning against this schema
    pub fn warn(&mut self, warning: CrawlWarning) {
        self.report.warn(warning);
    }

    /// Warnings and failures recorded so far
    pub fn report(&self) -> &CrawlReport {
        &self.report
    }

    /// Applies the duplicate policy. `Ok(())` means the duplicate was
    /// discarded with a warning.
    fn duplicate(&mut self, family: ObjectFamily, full_name: String) -> Result<()> {
        match self.duplicate_policy {
            DuplicatePolicy::Fail => Err(CrawlError::duplicate_object(family, full_name)),
            DuplicatePolicy::MergeAndWarn => {
                self.warn(CrawlWarning::DuplicateObject { family, full_name });
                Ok(())
            }
        }
    }

    // ========================================================================
    // Tables and their children
    // ========================================================================

    /// Attaches a table. Returns false when a duplicate was discarded.
    pub fn add_table(&mut self, table: Table) -> Result<bool> {
        let full_name = table.full_name();
        if self.table_index.contains_key(&full_name) {
            self.duplicate(ObjectFamily::Tables, full_name)?;
            return Ok(false);
        }
        self.table_index.insert(full_name, self.tables.len());
        self.tables.push(table);
        Ok(true)
    }

    /// Looks up a table of this schema by its unqualified name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.table_index
            .get(&self.schema.qualify(name))
            .map(|&i| &self.tables[i])
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        let index = *self.table_index.get(&self.schema.qualify(name))?;
        self.tables.get_mut(index)
    }

    /// Unqualified names of all tables, in discovery order
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Number of tables attached so far
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Attaches a column to a table, assigning the next dense ordinal.
    ///
    /// Returns false when the table is unknown or the column was a
    /// discarded duplicate.
    pub fn add_column(&mut self, table_name: &str, mut column: Column) -> Result<bool> {
        let table_full_name = self.schema.qualify(table_name);
        let Some(&index) = self.table_index.get(&table_full_name) else {
            return Ok(false);
        };
        if !self.claim_table_child(ObjectFamily::Columns, &table_full_name, &column.name)? {
            return Ok(false);
        }
        let table = &mut self.tables[index];
        column.ordinal_position = u32::try_from(table.columns.len()).unwrap_or(u32::MAX);
        table.columns.push(column);
        Ok(true)
    }

    /// Records a child name of a table. Returns false when the name was
    /// already taken and the duplicate policy discarded the newcomer.
    fn claim_table_child(
        &mut self,
        family: ObjectFamily,
        table_full_name: &str,
        name: &str,
    ) -> Result<bool> {
        let key = (family, table_full_name.to_string(), name.to_string());
        if self.table_children.contains(&key) {
            self.duplicate(family, format!("{}.{}", table_full_name, name))?;
            return Ok(false);
        }
        self.table_children.insert(key);
        Ok(true)
    }

    /// Sets a table's primary key and flags its columns.
    pub fn set_primary_key(&mut self, table_name: &str, primary_key: PrimaryKey) -> bool {
        let Some(table) = self.table_mut(table_name) else {
            return false;
        };
        for column in &mut table.columns {
            column.part_of_primary_key = primary_key.columns.contains(&column.name);
        }
        table.primary_key = Some(primary_key);
        true
    }

    /// Attaches an index to a table.
    pub fn add_index(&mut self, table_name: &str, index: Index) -> Result<bool> {
        let table_full_name = self.schema.qualify(table_name);
        let Some(&position) = self.table_index.get(&table_full_name) else {
            return Ok(false);
        };
        if !self.claim_table_child(ObjectFamily::Indexes, &table_full_name, &index.name)? {
            return Ok(false);
        }
        self.tables[position].indexes.push(index);
        Ok(true)
    }

    /// Parks a foreign key until reference resolution.
    pub fn add_pending_foreign_key(&mut self, foreign_key: PendingForeignKey) -> Result<bool> {
        if !self.claim_table_child(ObjectFamily::ForeignKeys, &foreign_key.table, &foreign_key.name)? {
            return Ok(false);
        }
        self.pending_foreign_keys.push(foreign_key);
        Ok(true)
    }

    /// Hands over every parked foreign key for resolution
    pub(crate) fn take_pending_foreign_keys(&mut self) -> Vec<PendingForeignKey> {
        std::mem::take(&mut self.pending_foreign_keys)
    }

    /// Attaches a resolved foreign key to its table by full name.
    pub(crate) fn attach_foreign_key(&mut self, table_full_name: &str, foreign_key: ForeignKey) -> bool {
        match self.table_index.get(table_full_name) {
            Some(&index) => {
                self.tables[index].foreign_keys.push(foreign_key);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Routines
    // ========================================================================

    /// Attaches a routine, keyed by specific name when it has one.
    pub fn add_routine(&mut self, routine: Routine) -> Result<bool> {
        let key = routine.lookup_key();
        if self.routine_index.contains_key(&key) {
            self.duplicate(ObjectFamily::Routines, key.to_string())?;
            return Ok(false);
        }
        self.routine_index.insert(key, self.routines.len());
        self.routines.push(routine);
        Ok(true)
    }

    /// Lookup keys of all routines, in discovery order
    pub fn routine_keys(&self) -> Vec<RoutineKey> {
        self.routines.iter().map(Routine::lookup_key).collect()
    }

    /// Looks up a routine by its lookup key
    pub fn routine(&self, key: &RoutineKey) -> Option<&Routine> {
        self.routine_index.get(key).map(|&i| &self.routines[i])
    }

    /// Attaches a parameter or result column to a routine.
    pub fn add_routine_column(
        &mut self,
        routine_key: &RoutineKey,
        mut column: RoutineColumn,
    ) -> Result<bool> {
        let Some(&index) = self.routine_index.get(routine_key) else {
            return Ok(false);
        };
        let key = (routine_key.clone(), column.name.clone());
        if self.routine_columns.contains(&key) {
            let full_name = format!("{}.{}", self.routines[index].full_name(), column.name);
            self.duplicate(ObjectFamily::RoutineColumns, full_name)?;
            return Ok(false);
        }
        self.routine_columns.insert(key);
        let routine = &mut self.routines[index];
        column.ordinal_position = u32::try_from(routine.columns.len()).unwrap_or(u32::MAX);
        routine.columns.push(column);
        Ok(true)
    }

    // ========================================================================
    // Sequences and synonyms
    // ========================================================================

    /// Attaches a sequence
    pub fn add_sequence(&mut self, sequence: Sequence) -> Result<bool> {
        let full_name = sequence.full_name();
        if self.sequence_index.contains_key(&full_name) {
            self.duplicate(ObjectFamily::Sequences, full_name)?;
            return Ok(false);
        }
        self.sequence_index.insert(full_name, self.sequences.len());
        self.sequences.push(sequence);
        Ok(true)
    }

    /// Attaches a synonym
    pub fn add_synonym(&mut self, synonym: Synonym) -> Result<bool> {
        let full_name = synonym.full_name();
        if self.synonym_index.contains_key(&full_name) {
            self.duplicate(ObjectFamily::Synonyms, full_name)?;
            return Ok(false);
        }
        self.synonym_index.insert(full_name, self.synonyms.len());
        self.synonyms.push(synonym);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnDataType;
    use std::sync::Arc;

    fn fragment(policy: DuplicatePolicy) -> SchemaFragment {
        SchemaFragment::new(SchemaRef::named("PUBLIC"), policy)
    }

    fn column(name: &str) -> Column {
        let data_type = Arc::new(ColumnDataType::new(SchemaRef::named("PUBLIC"), "INTEGER", 4));
        Column::new(name, data_type)
    }

    #[test]
    fn test_columns_get_dense_ordinals() {
        let mut fragment = fragment(DuplicatePolicy::Fail);
        fragment
            .add_table(Table::new(SchemaRef::named("PUBLIC"), "INVOICE"))
            .unwrap();

        for name in ["ID", "CUSTOMERID", "TOTAL"] {
            let mut c = column(name);
            c.ordinal_position = 99;
            assert!(fragment.add_column("INVOICE", c).unwrap());
        }

        let ordinals: Vec<u32> = fragment.table("INVOICE").unwrap().columns.iter().map(|c| c.ordinal_position).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[test]
    fn test_column_for_unknown_table_is_ignored() {
        let mut fragment = fragment(DuplicatePolicy::Fail);
        assert!(!fragment.add_column("MISSING", column("ID")).unwrap());
    }

    #[test]
    fn test_duplicate_fails_under_strict_policy() {
        let mut fragment = fragment(DuplicatePolicy::Fail);
        let table = Table::new(SchemaRef::named("PUBLIC"), "INVOICE");
        fragment.add_table(table.clone()).unwrap();

        let error = fragment.add_table(table).unwrap_err();
        assert!(matches!(
            error,
            CrawlError::DuplicateObject {
                family: ObjectFamily::Tables,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_merges_and_warns() {
        let mut fragment = fragment(DuplicatePolicy::MergeAndWarn);
        let mut first = Table::new(SchemaRef::named("PUBLIC"), "INVOICE");
        first.remarks = Some("first".to_string());
        fragment.add_table(first).unwrap();

        let added = fragment
            .add_table(Table::new(SchemaRef::named("PUBLIC"), "INVOICE"))
            .unwrap();

        assert!(!added);
        assert_eq!(fragment.table_count(), 1);
        assert_eq!(
            fragment.table("INVOICE").unwrap().remarks.as_deref(),
            Some("first")
        );
        assert_eq!(fragment.report().warnings.len(), 1);
    }

    #[test]
    fn test_primary_key_flags_columns() {
        let mut fragment = fragment(DuplicatePolicy::Fail);
        fragment
            .add_table(Table::new(SchemaRef::named("PUBLIC"), "ITEM"))
            .unwrap();
        fragment.add_column("ITEM", column("INVOICEID")).unwrap();
        fragment.add_column("ITEM", column("ITEM")).unwrap();
        fragment.add_column("ITEM", column("QUANTITY")).unwrap();

        fragment.set_primary_key(
            "ITEM",
            PrimaryKey {
                name: Some("PK_ITEM".to_string()),
                columns: vec!["INVOICEID".to_string(), "ITEM".to_string()],
            },
        );

        let table = fragment.table("ITEM").unwrap();
        let flags: Vec<bool> = table.columns.iter().map(|c| c.part_of_primary_key).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_overloaded_routines_are_distinct() {
        let mut fragment = fragment(DuplicatePolicy::Fail);
        let schema = SchemaRef::named("PUBLIC");

        let mut first = Routine::new(schema.clone(), "NEW_PUBLISHER");
        first.specific_name = Some("NEW_PUBLISHER_1".to_string());
        let mut second = Routine::new(schema, "NEW_PUBLISHER");
        second.specific_name = Some("NEW_PUBLISHER_2".to_string());

        assert!(fragment.add_routine(first).unwrap());
        assert!(fragment.add_routine(second).unwrap());
        assert_eq!(
            fragment.routine_keys(),
            vec![
                RoutineKey::specific("PUBLIC.NEW_PUBLISHER_1"),
                RoutineKey::specific("PUBLIC.NEW_PUBLISHER_2")
            ]
        );
    }

    #[test]
    fn test_routine_named_like_a_specific_name_is_not_a_duplicate() {
        let mut fragment = fragment(DuplicatePolicy::Fail);
        let schema = SchemaRef::named("PUBLIC");

        let mut overload = Routine::new(schema.clone(), "CALC");
        overload.specific_name = Some("CALC_1".to_string());
        let plain = Routine::new(schema, "CALC_1");

        assert!(fragment.add_routine(overload).unwrap());
        assert!(fragment.add_routine(plain).unwrap());
        assert!(fragment.routine(&RoutineKey::name("PUBLIC.CALC_1")).is_some());
    }

    #[test]
    fn test_duplicate_children_are_keyed_per_table() {
        let mut fragment = fragment(DuplicatePolicy::MergeAndWarn);
        let schema = SchemaRef::named("PUBLIC");
        fragment.add_table(Table::new(schema.clone(), "INVOICE")).unwrap();
        fragment.add_table(Table::new(schema, "ITEM")).unwrap();

        assert!(fragment.add_column("INVOICE", column("ID")).unwrap());
        assert!(fragment.add_column("ITEM", column("ID")).unwrap());
        assert!(!fragment.add_column("ITEM", column("ID")).unwrap());

        let foreign_key = |table: &str| PendingForeignKey {
            table: format!("PUBLIC.{}", table),
            name: "FK_INVOICE".to_string(),
            column_references: Vec::new(),
            update_rule: None,
            delete_rule: None,
        };
        assert!(fragment.add_pending_foreign_key(foreign_key("ITEM")).unwrap());
        assert!(!fragment.add_pending_foreign_key(foreign_key("ITEM")).unwrap());
        assert!(fragment.add_pending_foreign_key(foreign_key("INVOICE")).unwrap());

        assert_eq!(fragment.table("ITEM").unwrap().columns.len(), 1);
        assert_eq!(fragment.pending_foreign_keys.len(), 2);
        assert_eq!(fragment.report().warnings.len(), 2);
    }
}
