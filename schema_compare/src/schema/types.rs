//! Schema container
//!
//! A [`DatabaseSchema`] owns tables, sequences and namespaces. Lookups accept
//! unqualified names, which resolve against the schema's default namespace.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::config::SchemaConfig;
use crate::error::{Error, Result};
use crate::schema::identifier::Identifier;
use crate::schema::sequence::Sequence;
use crate::schema::table::Table;

/// Implemented by types that describe a table, usually through `#[derive(TableModel)]`
pub trait TableModel {
    /// Name of the table described by this type
    fn table_name() -> String;

    /// Build the table definition
    fn define_table() -> Result<Table>;
}

/// Represents a complete database schema
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSchema {
    name: String,
    /// Lower-cased namespace name to its original spelling
    namespaces: IndexMap<String, String>,
    tables: IndexMap<String, Table>,
    sequences: IndexMap<String, Sequence>,
    #[serde(skip)]
    config: SchemaConfig,
}

impl Default for DatabaseSchema {
    fn default() -> Self {
        Self::with_config(SchemaConfig::default())
    }
}

impl DatabaseSchema {
    /// Create a new empty database schema; the default namespace is `public`
    pub fn new(schema_name: Option<String>) -> Self {
        let mut config = SchemaConfig::default();
        if let Some(name) = schema_name {
            config.name = name;
        }
        Self::with_config(config)
    }

    pub fn with_config(config: SchemaConfig) -> Self {
        Self {
            name: config.name.clone(),
            namespaces: IndexMap::new(),
            tables: IndexMap::new(),
            sequences: IndexMap::new(),
            config,
        }
    }

    /// Default namespace
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    fn qualified_key(&self, name: &str) -> String {
        Identifier::parse(name).fully_qualified_name(&self.name)
    }

    // Namespaces

    pub fn create_namespace(&mut self, name: &str) -> Result<()> {
        let identifier = Identifier::parse(name);
        let key = identifier.normalized();
        if self.namespaces.contains_key(&key) {
            return Err(Error::NamespaceAlreadyExists(identifier.name()));
        }

        self.namespaces.insert(key, identifier.name());
        Ok(())
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces
            .contains_key(&Identifier::parse(name).normalized())
    }

    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    fn ensure_namespace(&mut self, identifier: &Identifier) {
        let Some(namespace) = identifier.namespace() else {
            return;
        };

        if identifier.is_in_default_namespace(&self.name) {
            return;
        }

        let key = namespace.to_lowercase();
        if !self.namespaces.contains_key(&key) {
            debug!(namespace = namespace, "Registering implicit namespace");
            self.namespaces.insert(key, namespace.to_string());
        }
    }

    // Tables

    /// Add a table; its namespace is created when it is not the default one
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        let key = table.name().fully_qualified_name(&self.name);
        if self.tables.contains_key(&key) {
            return Err(Error::TableAlreadyExists(table.name().name()));
        }

        self.ensure_namespace(table.name());
        self.tables.insert(key, table);
        Ok(())
    }

    /// Create an empty table configured from this schema's settings
    pub fn create_table(&mut self, name: &str) -> Result<&mut Table> {
        let mut table = Table::new(name)?;
        table.set_max_identifier_length(self.config.max_identifier_length);
        table.set_explicit_foreign_key_indexes(self.config.explicit_foreign_key_indexes);
        for (option, value) in &self.config.default_table_options {
            table.add_option(option, value.clone());
        }

        let key = table.name().fully_qualified_name(&self.name);
        self.add_table(table)?;

        self.tables
            .get_mut(&key)
            .ok_or_else(|| Error::TableDoesNotExist(name.to_string()))
    }

    /// Register the table described by a model type
    pub fn add_model<M: TableModel>(&mut self) -> Result<()> {
        let mut table = M::define_table()?;
        table.set_max_identifier_length(self.config.max_identifier_length);
        debug!(table = %M::table_name(), "Adding model table");
        self.add_table(table)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&self.qualified_key(name))
    }

    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&self.qualified_key(name))
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.find_table(name)
            .ok_or_else(|| Error::TableDoesNotExist(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        let key = self.qualified_key(name);
        self.tables
            .get_mut(&key)
            .ok_or_else(|| Error::TableDoesNotExist(name.to_string()))
    }

    pub fn tables(&self) -> &IndexMap<String, Table> {
        &self.tables
    }

    /// Fully qualified, lower-cased names of every table
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Rename a table, failing when the new name is taken
    pub fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let old_key = self.qualified_key(old_name);
        if !self.tables.contains_key(&old_key) {
            return Err(Error::TableDoesNotExist(old_name.to_string()));
        }

        let new_identifier = Identifier::parse(new_name);
        let new_key = new_identifier.fully_qualified_name(&self.name);
        if new_key != old_key && self.tables.contains_key(&new_key) {
            return Err(Error::TableAlreadyExists(new_name.to_string()));
        }

        let Some(mut table) = self.tables.shift_remove(&old_key) else {
            return Err(Error::TableDoesNotExist(old_name.to_string()));
        };

        debug!(from = old_name, to = new_name, "Renaming table");
        self.ensure_namespace(&new_identifier);
        table.set_name(new_identifier);
        self.tables.insert(new_key, table);
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<Table> {
        let key = self.qualified_key(name);
        self.tables
            .shift_remove(&key)
            .ok_or_else(|| Error::TableDoesNotExist(name.to_string()))
    }

    // Sequences

    pub fn create_sequence(
        &mut self,
        name: &str,
        allocation_size: i64,
        initial_value: i64,
    ) -> Result<&mut Sequence> {
        let sequence = Sequence::new(name)
            .allocation_size(allocation_size)
            .initial_value(initial_value);
        let key = sequence.name.fully_qualified_name(&self.name);
        self.add_sequence(sequence)?;

        self.sequences
            .get_mut(&key)
            .ok_or_else(|| Error::SequenceDoesNotExist(name.to_string()))
    }

    pub fn add_sequence(&mut self, sequence: Sequence) -> Result<()> {
        let key = sequence.name.fully_qualified_name(&self.name);
        if self.sequences.contains_key(&key) {
            return Err(Error::SequenceAlreadyExists(sequence.name.name()));
        }

        self.ensure_namespace(&sequence.name);
        self.sequences.insert(key, sequence);
        Ok(())
    }

    pub fn has_sequence(&self, name: &str) -> bool {
        self.sequences.contains_key(&self.qualified_key(name))
    }

    pub fn find_sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.get(&self.qualified_key(name))
    }

    pub fn sequence(&self, name: &str) -> Result<&Sequence> {
        self.find_sequence(name)
            .ok_or_else(|| Error::SequenceDoesNotExist(name.to_string()))
    }

    pub fn sequences(&self) -> &IndexMap<String, Sequence> {
        &self.sequences
    }

    pub fn drop_sequence(&mut self, name: &str) -> Result<Sequence> {
        let key = self.qualified_key(name);
        self.sequences
            .shift_remove(&key)
            .ok_or_else(|| Error::SequenceDoesNotExist(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::{Column, ColumnType};

    #[test]
    fn test_lookup_resolves_default_namespace() {
        let mut schema = DatabaseSchema::new(None);
        schema.add_table(Table::new("Users").unwrap()).unwrap();

        assert!(schema.has_table("users"));
        assert!(schema.has_table("public.users"));
        assert!(schema.has_table("\"USERS\""));
        assert!(!schema.has_table("other.users"));
        assert_eq!(schema.table_names(), vec!["public.users".to_string()]);
    }

    #[test]
    fn test_duplicate_table_is_rejected() {
        let mut schema = DatabaseSchema::new(None);
        schema.add_table(Table::new("users").unwrap()).unwrap();
        let err = schema.add_table(Table::new("public.users").unwrap()).unwrap_err();
        assert!(matches!(err, Error::TableAlreadyExists(_)));
    }

    #[test]
    fn test_non_default_namespace_is_created() {
        let mut schema = DatabaseSchema::new(None);
        schema.add_table(Table::new("audit.events").unwrap()).unwrap();
        schema.add_table(Table::new("public.users").unwrap()).unwrap();

        assert!(schema.has_namespace("AUDIT"));
        assert!(!schema.has_namespace("public"));
        assert!(matches!(
            schema.create_namespace("audit"),
            Err(Error::NamespaceAlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_table_applies_config() {
        let mut config = SchemaConfig::default();
        config.max_identifier_length = 12;
        config
            .default_table_options
            .insert("charset".to_string(), serde_json::json!("utf8"));
        let mut schema = DatabaseSchema::with_config(config);

        let table = schema.create_table("users").unwrap();
        table.add_column(Column::new("email", ColumnType::String)).unwrap();
        table.add_index(&["email"], None, &[], IndexMap::new()).unwrap();

        let table = schema.table("users").unwrap();
        assert_eq!(table.option("charset"), Some(&serde_json::json!("utf8")));
        assert_eq!(table.indexes().keys().next().unwrap().len(), 12);
    }

    #[test]
    fn test_rename_table() {
        let mut schema = DatabaseSchema::new(None);
        schema.add_table(Table::new("users").unwrap()).unwrap();
        schema.add_table(Table::new("accounts").unwrap()).unwrap();

        assert!(matches!(
            schema.rename_table("users", "accounts"),
            Err(Error::TableAlreadyExists(_))
        ));
        assert!(matches!(
            schema.rename_table("missing", "other"),
            Err(Error::TableDoesNotExist(_))
        ));

        schema.rename_table("users", "members").unwrap();
        assert!(!schema.has_table("users"));
        assert_eq!(schema.table("members").unwrap().name().name(), "members");
    }

    #[test]
    fn test_sequences() {
        let mut schema = DatabaseSchema::new(Some("app".to_string()));
        schema.create_sequence("users_id_seq", 1, 1).unwrap();

        assert!(schema.has_sequence("app.users_id_seq"));
        assert!(schema.create_sequence("USERS_ID_SEQ", 1, 1).is_err());
        schema.drop_sequence("users_id_seq").unwrap();
        assert!(schema.sequences().is_empty());
    }

    #[test]
    fn test_drop_table() {
        let mut schema = DatabaseSchema::new(None);
        schema.add_table(Table::new("users").unwrap()).unwrap();
        assert!(schema.drop_table("USERS").is_ok());
        assert!(schema.drop_table("users").is_err());
    }
}
