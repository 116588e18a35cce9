//! Sequences
//!
//! A sequence named after a table's autoincrement primary key belongs to that
//! table and is not diffed on its own.

use serde::Serialize;

use crate::schema::identifier::Identifier;
use crate::schema::table::Table;

/// Represents a database sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    pub name: Identifier,
    pub allocation_size: i64,
    pub initial_value: i64,
    pub cache: Option<i64>,
}

impl Sequence {
    pub fn new(name: &str) -> Self {
        Self {
            name: Identifier::parse(name),
            allocation_size: 1,
            initial_value: 1,
            cache: None,
        }
    }

    pub fn allocation_size(mut self, allocation_size: i64) -> Self {
        self.allocation_size = allocation_size;
        self
    }

    pub fn initial_value(mut self, initial_value: i64) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn cache(mut self, cache: i64) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn shortest_name(&self, default_namespace: &str) -> String {
        self.name.shortest_name(default_namespace)
    }

    /// True when this sequence backs the autoincrement primary key of `table`
    ///
    /// The primary key must be a single autoincrement column and the sequence
    /// must be named `<table>_<column>_seq` relative to the table's namespace.
    pub fn is_autoincrement_for(&self, table: &Table) -> bool {
        let Some(primary_key) = table.primary_key() else {
            return false;
        };

        if primary_key.columns.len() != 1 {
            return false;
        }

        let Some(column) = table.find_column(&primary_key.columns[0]) else {
            return false;
        };

        if !column.autoincrement {
            return false;
        }

        let namespace = table.namespace_name();
        let sequence_name = relative_name(&self.name, namespace);
        let table_name = relative_name(table.name(), namespace);
        let column_name = relative_name(&column.name, namespace);

        format!("{}_{}_seq", table_name, column_name) == sequence_name
    }
}

fn relative_name(identifier: &Identifier, namespace: Option<&str>) -> String {
    match namespace {
        Some(namespace) => identifier.shortest_name(namespace),
        None => identifier.name().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::{Column, ColumnType};

    fn table_with_key(name: &str, autoincrement: bool) -> Table {
        let mut table = Table::new(name).unwrap();
        table
            .add_column(Column::new("id", ColumnType::Integer).autoincrement(autoincrement))
            .unwrap();
        table.set_primary_key(&["id"], None).unwrap();
        table
    }

    #[test]
    fn test_defaults() {
        let sequence = Sequence::new("users_id_seq");
        assert_eq!(sequence.allocation_size, 1);
        assert_eq!(sequence.initial_value, 1);
        assert_eq!(sequence.cache, None);
    }

    #[test]
    fn test_is_autoincrement_for() {
        let table = table_with_key("users", true);
        assert!(Sequence::new("users_id_seq").is_autoincrement_for(&table));
        assert!(Sequence::new("USERS_ID_SEQ").is_autoincrement_for(&table));
        assert!(!Sequence::new("users_seq").is_autoincrement_for(&table));
        assert!(!Sequence::new("users_id_seq").is_autoincrement_for(&table_with_key("users", false)));
    }

    #[test]
    fn test_is_autoincrement_for_namespaced_table() {
        let table = table_with_key("audit.events", true);
        assert!(Sequence::new("audit.events_id_seq").is_autoincrement_for(&table));
        assert!(!Sequence::new("other.events_id_seq").is_autoincrement_for(&table));
    }

    #[test]
    fn test_composite_primary_key_has_no_sequence() {
        let mut table = Table::new("pairs").unwrap();
        table
            .add_column(Column::new("a", ColumnType::Integer).autoincrement(true))
            .unwrap();
        table.add_column(Column::new("b", ColumnType::Integer)).unwrap();
        table.set_primary_key(&["a", "b"], None).unwrap();

        assert!(!Sequence::new("pairs_a_seq").is_autoincrement_for(&table));
    }
}
