//! Schema difference records
//!
//! Produced by the [`Comparator`](crate::schema::comparator::Comparator). Every
//! record owns copies of the assets it refers to, so it can outlive both
//! compared schemas.

use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::column::Column;
use crate::schema::constraint::{ForeignKeyConstraint, Index};
use crate::schema::identifier::Identifier;
use crate::schema::sequence::Sequence;
use crate::schema::table::Table;

/// Represents the changes between two schemas
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDiff {
    pub new_namespaces: Vec<String>,
    pub removed_namespaces: Vec<String>,
    /// Keyed by the table's shortest name
    pub new_tables: IndexMap<String, Table>,
    pub changed_tables: IndexMap<String, TableDiff>,
    pub removed_tables: IndexMap<String, Table>,
    pub new_sequences: Vec<Sequence>,
    pub changed_sequences: Vec<Sequence>,
    pub removed_sequences: Vec<Sequence>,
    /// Foreign keys of surviving tables that point at a removed table
    pub orphaned_foreign_keys: Vec<ForeignKeyConstraint>,
}

impl SchemaDiff {
    /// True when the two schemas are equivalent
    pub fn is_empty(&self) -> bool {
        self.new_namespaces.is_empty()
            && self.removed_namespaces.is_empty()
            && self.new_tables.is_empty()
            && self.changed_tables.is_empty()
            && self.removed_tables.is_empty()
            && self.new_sequences.is_empty()
            && self.changed_sequences.is_empty()
            && self.removed_sequences.is_empty()
            && self.orphaned_foreign_keys.is_empty()
    }
}

/// Represents the changes to a single table
///
/// Column and index maps are keyed by the lower-cased name. For renames the
/// key is the old name and the value is the asset under its new name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDiff {
    pub name: String,
    pub new_name: Option<String>,
    pub added_columns: IndexMap<String, Column>,
    pub changed_columns: IndexMap<String, ColumnDiff>,
    pub removed_columns: IndexMap<String, Column>,
    pub renamed_columns: IndexMap<String, Column>,
    pub added_indexes: IndexMap<String, Index>,
    pub changed_indexes: IndexMap<String, Index>,
    pub removed_indexes: IndexMap<String, Index>,
    pub renamed_indexes: IndexMap<String, Index>,
    pub added_foreign_keys: Vec<ForeignKeyConstraint>,
    pub changed_foreign_keys: Vec<ForeignKeyConstraint>,
    pub removed_foreign_keys: Vec<ForeignKeyConstraint>,
    #[serde(skip)]
    pub from_table: Option<Table>,
}

impl TableDiff {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            new_name: None,
            added_columns: IndexMap::new(),
            changed_columns: IndexMap::new(),
            removed_columns: IndexMap::new(),
            renamed_columns: IndexMap::new(),
            added_indexes: IndexMap::new(),
            changed_indexes: IndexMap::new(),
            removed_indexes: IndexMap::new(),
            renamed_indexes: IndexMap::new(),
            added_foreign_keys: Vec::new(),
            changed_foreign_keys: Vec::new(),
            removed_foreign_keys: Vec::new(),
            from_table: None,
        }
    }

    /// Start a diff against `table`, keeping a copy of it for reference
    pub fn for_table(table: &Table) -> Self {
        let mut diff = Self::new(&table.name().name());
        diff.from_table = Some(table.clone());
        diff
    }

    pub fn with_new_name(mut self, new_name: &str) -> Self {
        self.new_name = Some(new_name.to_string());
        self
    }

    /// New name of the table, if it is renamed
    pub fn new_name(&self) -> Option<&str> {
        self.new_name.as_deref()
    }

    /// True when the diff records no change at all
    pub fn is_empty(&self) -> bool {
        self.new_name.is_none()
            && self.added_columns.is_empty()
            && self.changed_columns.is_empty()
            && self.removed_columns.is_empty()
            && self.renamed_columns.is_empty()
            && self.added_indexes.is_empty()
            && self.changed_indexes.is_empty()
            && self.removed_indexes.is_empty()
            && self.renamed_indexes.is_empty()
            && self.added_foreign_keys.is_empty()
            && self.changed_foreign_keys.is_empty()
            && self.removed_foreign_keys.is_empty()
    }
}

/// Represents a changed column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDiff {
    pub old_column_name: Identifier,
    /// The column as it appears in the target table
    pub column: Column,
    /// Names of the properties that differ, without duplicates
    pub changed_properties: Vec<String>,
    #[serde(skip)]
    pub from_column: Option<Column>,
}

impl ColumnDiff {
    pub fn new(
        old_column_name: Identifier,
        column: Column,
        changed_properties: Vec<String>,
        from_column: Option<Column>,
    ) -> Self {
        Self {
            old_column_name,
            column,
            changed_properties,
            from_column,
        }
    }

    pub fn has_changed(&self, property: &str) -> bool {
        self.changed_properties.iter().any(|changed| changed == property)
    }

    pub fn old_column_name(&self) -> &Identifier {
        &self.old_column_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnType;

    #[test]
    fn test_empty_diffs() {
        assert!(SchemaDiff::default().is_empty());
        assert!(TableDiff::new("users").is_empty());
        assert!(!TableDiff::new("users").with_new_name("members").is_empty());
    }

    #[test]
    fn test_for_table_keeps_source() {
        let table = Table::new("public.users").unwrap();
        let diff = TableDiff::for_table(&table);
        assert_eq!(diff.name, "public.users");
        assert_eq!(diff.from_table.as_ref(), Some(&table));
    }

    #[test]
    fn test_column_diff_has_changed() {
        let diff = ColumnDiff::new(
            Identifier::parse("email"),
            Column::new("email", ColumnType::Text),
            vec!["type".to_string(), "length".to_string()],
            None,
        );

        assert!(diff.has_changed("type"));
        assert!(!diff.has_changed("notnull"));
        assert_eq!(diff.old_column_name().local_name(), "email");
    }

    #[test]
    fn test_serialization_skips_source_assets() {
        let table = Table::new("users").unwrap();
        let json = serde_json::to_value(TableDiff::for_table(&table)).unwrap();
        assert!(json.get("from_table").is_none());
        assert_eq!(json["name"], "users");
    }
}
