//! Schema comparator
//!
//! Computes the [`SchemaDiff`] that turns one [`DatabaseSchema`] into another.
//! Comparison is purely structural: names are matched case-insensitively and
//! index names are ignored when deciding whether two indexes are equivalent.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::config::ComparatorConfig;
use crate::schema::column::Column;
use crate::schema::constraint::{ForeignKeyConstraint, Index};
use crate::schema::diff::{ColumnDiff, SchemaDiff, TableDiff};
use crate::schema::sequence::Sequence;
use crate::schema::table::Table;
use crate::schema::types::DatabaseSchema;
use crate::utils::naming::normalize_identifier;

/// Compares schemas, tables and their assets
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    config: ComparatorConfig,
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Compare two schemas with the default settings
    pub fn compare_schemas(from_schema: &DatabaseSchema, to_schema: &DatabaseSchema) -> SchemaDiff {
        Self::new().compare(from_schema, to_schema)
    }

    /// Compute the changes that turn `from_schema` into `to_schema`
    pub fn compare(&self, from_schema: &DatabaseSchema, to_schema: &DatabaseSchema) -> SchemaDiff {
        let mut diff = SchemaDiff::default();

        for (key, namespace) in to_schema.namespaces() {
            if !from_schema.namespaces().contains_key(key) {
                diff.new_namespaces.push(namespace.clone());
            }
        }

        for (key, namespace) in from_schema.namespaces() {
            if !to_schema.namespaces().contains_key(key) {
                diff.removed_namespaces.push(namespace.clone());
            }
        }

        for table in to_schema.tables().values() {
            let table_name = table.shortest_name(to_schema.name());

            match from_schema.find_table(&table_name) {
                None => {
                    debug!(table = %table_name, "Table added");
                    diff.new_tables.insert(table_name, table.clone());
                }
                Some(from_table) => {
                    if let Some(table_diff) = self.diff_table(from_table, table) {
                        debug!(table = %table_name, "Table changed");
                        diff.changed_tables.insert(table_name, table_diff);
                    }
                }
            }
        }

        // Foreign keys of the source schema, grouped by the table they reference
        let mut foreign_keys_to_table: IndexMap<String, Vec<&ForeignKeyConstraint>> = IndexMap::new();

        for table in from_schema.tables().values() {
            let table_name = table.shortest_name(from_schema.name());

            if !to_schema.has_table(&table_name) {
                debug!(table = %table_name, "Table removed");
                diff.removed_tables.insert(table_name, table.clone());
            }

            for foreign_key in table.foreign_keys().values() {
                foreign_keys_to_table
                    .entry(foreign_key.foreign_table.shortest_name(from_schema.name()))
                    .or_default()
                    .push(foreign_key);
            }
        }

        let removed_table_names: Vec<String> = diff.removed_tables.keys().cloned().collect();

        for removed_table in &removed_table_names {
            let Some(foreign_keys) = foreign_keys_to_table.get(removed_table) else {
                continue;
            };

            for foreign_key in foreign_keys {
                let local_table = local_table_key(foreign_key, from_schema.name());

                // Dropping the referencing table drops its keys as well
                if diff.removed_tables.contains_key(&local_table) {
                    continue;
                }

                debug!(key = %foreign_key.name, table = %removed_table, "Foreign key orphaned");
                diff.orphaned_foreign_keys.push((*foreign_key).clone());
            }

            // The orphaned list already drops these, the table diff must not drop them twice
            for foreign_key in foreign_keys {
                let local_table = local_table_key(foreign_key, from_schema.name());
                let Some(table_diff) = diff.changed_tables.get_mut(&local_table) else {
                    continue;
                };

                table_diff.removed_foreign_keys.retain(|removed| {
                    removed.foreign_table.shortest_name(from_schema.name()) != *removed_table
                });
            }
        }

        for sequence in to_schema.sequences().values() {
            let sequence_name = sequence.shortest_name(to_schema.name());

            match from_schema.find_sequence(&sequence_name) {
                None => {
                    if !is_autoincrement_sequence_in_schema(from_schema, sequence) {
                        debug!(sequence = %sequence_name, "Sequence added");
                        diff.new_sequences.push(sequence.clone());
                    }
                }
                Some(from_sequence) => {
                    if self.diff_sequence(sequence, from_sequence) {
                        debug!(sequence = %sequence_name, "Sequence changed");
                        diff.changed_sequences.push(sequence.clone());
                    }
                }
            }
        }

        for sequence in from_schema.sequences().values() {
            if is_autoincrement_sequence_in_schema(to_schema, sequence) {
                continue;
            }

            if to_schema.has_sequence(&sequence.shortest_name(from_schema.name())) {
                continue;
            }

            debug!(sequence = %sequence.name, "Sequence removed");
            diff.removed_sequences.push(sequence.clone());
        }

        info!(
            new_tables = diff.new_tables.len(),
            changed_tables = diff.changed_tables.len(),
            removed_tables = diff.removed_tables.len(),
            orphaned_foreign_keys = diff.orphaned_foreign_keys.len(),
            "Schema comparison complete"
        );

        diff
    }

    /// True when the two sequences differ in allocation size or initial value
    pub fn diff_sequence(&self, sequence1: &Sequence, sequence2: &Sequence) -> bool {
        sequence1.allocation_size != sequence2.allocation_size
            || sequence1.initial_value != sequence2.initial_value
    }

    /// Compute the changes that turn `from_table` into `to_table`
    ///
    /// Returns `None` when the tables are equivalent.
    pub fn diff_table(&self, from_table: &Table, to_table: &Table) -> Option<TableDiff> {
        let mut changes = 0usize;
        let mut table_diff = TableDiff::for_table(from_table);

        for (column_name, column) in to_table.columns() {
            if from_table.has_column(column_name) {
                continue;
            }

            table_diff
                .added_columns
                .insert(column_name.clone(), column.clone());
            changes += 1;
        }

        for (column_name, column) in from_table.columns() {
            let Some(to_column) = to_table.find_column(column_name) else {
                table_diff
                    .removed_columns
                    .insert(column_name.clone(), column.clone());
                changes += 1;
                continue;
            };

            let changed_properties = self.diff_column(column, to_column);
            if changed_properties.is_empty() {
                continue;
            }

            table_diff.changed_columns.insert(
                column_name.clone(),
                ColumnDiff::new(
                    column.name.clone(),
                    to_column.clone(),
                    changed_properties,
                    Some(column.clone()),
                ),
            );
            changes += 1;
        }

        if self.config.detect_column_renames {
            self.detect_column_renamings(&mut table_diff);
        }

        for (index_name, index) in to_table.indexes() {
            if (index.primary && from_table.has_primary_key()) || from_table.has_index(index_name) {
                continue;
            }

            table_diff
                .added_indexes
                .insert(index_name.clone(), index.clone());
            changes += 1;
        }

        for (index_name, index) in from_table.indexes() {
            // The primary key is matched by role, whatever it is called
            let to_index = if index.primary {
                to_table.primary_key()
            } else {
                to_table.find_index(index_name)
            };

            let Some(to_index) = to_index else {
                table_diff
                    .removed_indexes
                    .insert(index_name.clone(), index.clone());
                changes += 1;
                continue;
            };

            if !self.diff_index(index, to_index) {
                continue;
            }

            table_diff
                .changed_indexes
                .insert(index_name.clone(), to_index.clone());
            changes += 1;
        }

        if self.config.detect_index_renames {
            self.detect_index_renamings(&mut table_diff);
        }

        changes += self.diff_foreign_keys(from_table, to_table, &mut table_diff);

        if changes == 0 && table_diff.is_empty() {
            return None;
        }

        Some(table_diff)
    }

    /// Pair up foreign keys; equivalent pairs cancel out, same-named pairs count as changed
    fn diff_foreign_keys(&self, from_table: &Table, to_table: &Table, table_diff: &mut TableDiff) -> usize {
        let from_keys: Vec<&ForeignKeyConstraint> = from_table.foreign_keys().values().collect();
        let to_keys: Vec<&ForeignKeyConstraint> = to_table.foreign_keys().values().collect();

        let mut from_remaining = vec![true; from_keys.len()];
        let mut to_remaining = vec![true; to_keys.len()];
        let mut changes = 0usize;

        for (i, from_key) in from_keys.iter().enumerate() {
            for (j, to_key) in to_keys.iter().enumerate() {
                if !from_remaining[i] {
                    break;
                }

                if !to_remaining[j] {
                    continue;
                }

                if !self.diff_foreign_key(from_key, to_key) {
                    from_remaining[i] = false;
                    to_remaining[j] = false;
                } else if from_key.name == to_key.name {
                    table_diff.changed_foreign_keys.push((*to_key).clone());
                    changes += 1;
                    from_remaining[i] = false;
                    to_remaining[j] = false;
                }
            }
        }

        for (from_key, remaining) in from_keys.iter().zip(&from_remaining) {
            if *remaining {
                table_diff.removed_foreign_keys.push((*from_key).clone());
                changes += 1;
            }
        }

        for (to_key, remaining) in to_keys.iter().zip(&to_remaining) {
            if *remaining {
                table_diff.added_foreign_keys.push((*to_key).clone());
                changes += 1;
            }
        }

        changes
    }

    /// Turn an added and a removed column into a rename when they are the only match for each other
    fn detect_column_renamings(&self, table_diff: &mut TableDiff) {
        let mut candidates: IndexMap<String, Vec<String>> = IndexMap::new();

        for (added_name, added_column) in &table_diff.added_columns {
            for (removed_name, removed_column) in &table_diff.removed_columns {
                if !self.diff_column(added_column, removed_column).is_empty() {
                    continue;
                }

                candidates
                    .entry(added_name.clone())
                    .or_default()
                    .push(removed_name.clone());
            }
        }

        for (added_name, removed_names) in candidates {
            if removed_names.len() != 1 {
                continue;
            }

            let removed_name = &removed_names[0];
            if table_diff.renamed_columns.contains_key(removed_name) {
                continue;
            }

            let Some(added_column) = table_diff.added_columns.shift_remove(&added_name) else {
                continue;
            };
            table_diff.removed_columns.shift_remove(removed_name);

            debug!(from = %removed_name, to = %added_name, "Column renamed");
            table_diff
                .renamed_columns
                .insert(removed_name.clone(), added_column);
        }
    }

    /// Same as column renames, for indexes that differ only by name
    fn detect_index_renamings(&self, table_diff: &mut TableDiff) {
        let mut candidates: IndexMap<String, Vec<String>> = IndexMap::new();

        for (added_name, added_index) in &table_diff.added_indexes {
            for (removed_name, removed_index) in &table_diff.removed_indexes {
                if self.diff_index(added_index, removed_index) {
                    continue;
                }

                candidates
                    .entry(added_name.clone())
                    .or_default()
                    .push(removed_name.clone());
            }
        }

        for (added_name, removed_names) in candidates {
            if removed_names.len() != 1 {
                continue;
            }

            let removed_name = &removed_names[0];
            if table_diff.renamed_indexes.contains_key(removed_name) {
                continue;
            }

            let Some(added_index) = table_diff.added_indexes.shift_remove(&added_name) else {
                continue;
            };
            table_diff.removed_indexes.shift_remove(removed_name);

            debug!(from = %removed_name, to = %added_name, "Index renamed");
            table_diff
                .renamed_indexes
                .insert(removed_name.clone(), added_index);
        }
    }

    /// True when the two foreign keys differ in columns, target table or actions
    ///
    /// # Panics
    ///
    /// Panics when either key maps a different number of local and foreign columns.
    pub fn diff_foreign_key(&self, key1: &ForeignKeyConstraint, key2: &ForeignKeyConstraint) -> bool {
        assert_column_parity(key1);
        assert_column_parity(key2);

        if normalized_columns(&key1.local_columns) != normalized_columns(&key2.local_columns) {
            return true;
        }

        if normalized_columns(&key1.foreign_columns) != normalized_columns(&key2.foreign_columns) {
            return true;
        }

        if key1.unqualified_foreign_table_name() != key2.unqualified_foreign_table_name() {
            return true;
        }

        key1.on_update() != key2.on_update() || key1.on_delete() != key2.on_delete()
    }

    /// Names of the properties that differ between two columns
    ///
    /// The result is empty when the columns are equivalent and never holds a
    /// property twice.
    pub fn diff_column(&self, column1: &Column, column2: &Column) -> Vec<String> {
        let mut changed: IndexSet<String> = IndexSet::new();

        if column1.column_type != column2.column_type {
            changed.insert("type".to_string());
        }

        for (property, differs) in [
            ("notnull", column1.not_null != column2.not_null),
            ("unsigned", column1.unsigned != column2.unsigned),
            ("autoincrement", column1.autoincrement != column2.autoincrement),
        ] {
            if differs {
                changed.insert(property.to_string());
            }
        }

        let default_changed = match (&column1.default, &column2.default) {
            (None, None) => false,
            (Some(a), Some(b)) => !a.loosely_equals(b),
            _ => true,
        };
        if default_changed {
            changed.insert("default".to_string());
        }

        if column1.column_type.has_length() {
            if column1.effective_length() != column2.effective_length() {
                changed.insert("length".to_string());
            }

            if column1.fixed != column2.fixed {
                changed.insert("fixed".to_string());
            }
        } else if column1.column_type.is_decimal() {
            if column1.effective_precision() != column2.effective_precision() {
                changed.insert("precision".to_string());
            }

            if column1.scale != column2.scale {
                changed.insert("scale".to_string());
            }
        }

        // A missing comment and an empty one are the same thing
        let comment1 = column1.comment.as_deref().unwrap_or_default();
        let comment2 = column2.comment.as_deref().unwrap_or_default();
        if comment1 != comment2 {
            changed.insert("comment".to_string());
        }

        let custom_keys: IndexSet<&String> = column1
            .custom_schema_options
            .keys()
            .chain(column2.custom_schema_options.keys())
            .collect();

        for key in custom_keys {
            let value1 = column1.custom_schema_options.get(key);
            let value2 = column2.custom_schema_options.get(key);
            if value1.is_none() || value2.is_none() || value1 != value2 {
                changed.insert(key.clone());
            }
        }

        // Platform options only count when both sides declare them
        for (key, value1) in &column1.platform_options {
            if let Some(value2) = column2.platform_options.get(key) {
                if value1 != value2 {
                    changed.insert(key.clone());
                }
            }
        }

        changed.into_iter().collect()
    }

    /// True when the indexes are not equivalent; names are ignored
    pub fn diff_index(&self, index1: &Index, index2: &Index) -> bool {
        !(index1.is_fulfilled_by(index2) && index2.is_fulfilled_by(index1))
    }
}

fn local_table_key(foreign_key: &ForeignKeyConstraint, default_namespace: &str) -> String {
    foreign_key
        .local_table_name()
        .map(|table| table.shortest_name(default_namespace))
        .unwrap_or_default()
}

fn is_autoincrement_sequence_in_schema(schema: &DatabaseSchema, sequence: &Sequence) -> bool {
    schema
        .tables()
        .values()
        .any(|table| sequence.is_autoincrement_for(table))
}

fn normalized_columns(columns: &[String]) -> Vec<String> {
    columns.iter().map(|column| normalize_identifier(column)).collect()
}

fn assert_column_parity(key: &ForeignKeyConstraint) {
    assert_eq!(
        key.local_columns.len(),
        key.foreign_columns.len(),
        "foreign key {} maps {} local columns to {} foreign columns",
        key.name,
        key.local_columns.len(),
        key.foreign_columns.len()
    );
}
