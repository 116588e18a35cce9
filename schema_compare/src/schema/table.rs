//! Table aggregate
//!
//! Columns, indexes, foreign keys and unique constraints are keyed by their
//! normalized (lower-cased, unquoted) names.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::schema::column::Column;
use crate::schema::constraint::{ForeignKeyConstraint, Index, UniqueConstraint};
use crate::schema::identifier::Identifier;
use crate::utils::naming::{generate_identifier_name, normalize_identifier, trim_quotes};

/// Index names may only contain ASCII letters, digits and underscores
static INVALID_INDEX_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9_]+").expect("index name pattern is valid")
});

const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 63;

const PRIMARY_KEY_NAME: &str = "primary";

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    name: Identifier,
    columns: IndexMap<String, Column>,
    indexes: IndexMap<String, Index>,
    foreign_keys: IndexMap<String, ForeignKeyConstraint>,
    unique_constraints: IndexMap<String, UniqueConstraint>,
    options: IndexMap<String, Value>,
    #[serde(skip)]
    primary_key_name: Option<String>,
    /// Indexes added on behalf of foreign keys; replaced by any explicit index fulfilling them
    #[serde(skip)]
    implicit_indexes: IndexMap<String, Index>,
    #[serde(skip)]
    max_identifier_length: usize,
    #[serde(skip)]
    explicit_foreign_key_indexes: bool,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Result<Self> {
        if trim_quotes(name).trim().is_empty() {
            return Err(Error::InvalidTableName(name.to_string()));
        }

        Ok(Self {
            name: Identifier::parse(name),
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            foreign_keys: IndexMap::new(),
            unique_constraints: IndexMap::new(),
            options: IndexMap::new(),
            primary_key_name: None,
            implicit_indexes: IndexMap::new(),
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
            explicit_foreign_key_indexes: false,
        })
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn namespace_name(&self) -> Option<&str> {
        self.name.namespace()
    }

    /// Lower-cased name relative to `default_namespace`
    pub fn shortest_name(&self, default_namespace: &str) -> String {
        self.name.shortest_name(default_namespace)
    }

    pub(crate) fn set_name(&mut self, name: Identifier) {
        for foreign_key in self.foreign_keys.values_mut() {
            foreign_key.set_local_table(&name);
        }
        self.name = name;
    }

    /// Limit applied to generated index and constraint names
    pub fn set_max_identifier_length(&mut self, length: usize) {
        self.max_identifier_length = length;
    }

    /// When set, foreign keys no longer get an implicit index on their local columns
    pub fn set_explicit_foreign_key_indexes(&mut self, explicit: bool) {
        self.explicit_foreign_key_indexes = explicit;
    }

    // Columns

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        let key = normalize_identifier(&column.name.name());
        if self.columns.contains_key(&key) {
            return Err(Error::ColumnAlreadyExists {
                table: self.name.name(),
                column: key,
            });
        }

        self.columns.insert(key, column);
        Ok(())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(&normalize_identifier(name))
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(&normalize_identifier(name))
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.find_column(name).ok_or_else(|| self.missing_column(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        let missing = self.missing_column(name);
        self.columns
            .get_mut(&normalize_identifier(name))
            .ok_or(missing)
    }

    pub fn columns(&self) -> &IndexMap<String, Column> {
        &self.columns
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        self.columns.shift_remove(&normalize_identifier(name))
    }

    /// Apply an option map to an existing column
    pub fn modify_column(&mut self, name: &str, options: &IndexMap<String, Value>) -> Result<()> {
        let key = normalize_identifier(name);
        let missing = self.missing_column(name);
        let column = self.columns.get_mut(&key).ok_or(missing)?;
        column.set_options(options)
    }

    fn missing_column(&self, name: &str) -> Error {
        Error::ColumnDoesNotExist {
            table: self.name.name(),
            column: name.to_string(),
        }
    }

    // Primary key and indexes

    /// Declare the primary key; its columns become NOT NULL
    pub fn set_primary_key(&mut self, columns: &[&str], name: Option<&str>) -> Result<()> {
        let index = self.create_index(
            columns,
            name.unwrap_or(PRIMARY_KEY_NAME),
            true,
            true,
            &[],
            IndexMap::new(),
        )?;
        self.add_index_internal(index)?;

        for column_name in columns {
            if let Some(column) = self.columns.get_mut(&normalize_identifier(column_name)) {
                column.not_null = true;
            }
        }

        Ok(())
    }

    pub fn drop_primary_key(&mut self) {
        if let Some(name) = self.primary_key_name.take() {
            self.indexes.shift_remove(&name);
        }
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key().is_some()
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.primary_key_name
            .as_ref()
            .and_then(|name| self.indexes.get(name))
    }

    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.primary_key()
            .map(|index| {
                index
                    .columns
                    .iter()
                    .filter_map(|name| self.find_column(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Add a plain index; a name is generated from the table and columns when none is given
    pub fn add_index(
        &mut self,
        columns: &[&str],
        name: Option<&str>,
        flags: &[&str],
        options: IndexMap<String, Value>,
    ) -> Result<()> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.generated_name(columns, "idx"),
        };
        let index = self.create_index(columns, &name, false, false, flags, options)?;
        self.add_index_internal(index)
    }

    pub fn add_unique_index(
        &mut self,
        columns: &[&str],
        name: Option<&str>,
        options: IndexMap<String, Value>,
    ) -> Result<()> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.generated_name(columns, "uniq"),
        };
        let index = self.create_index(columns, &name, true, false, &[], options)?;
        self.add_index_internal(index)
    }

    /// Add a fully built index, validating its name and columns
    pub fn insert_index(&mut self, index: Index) -> Result<()> {
        if index.primary {
            let columns: Vec<&str> = index.columns.iter().map(String::as_str).collect();
            return self.set_primary_key(&columns, Some(&index.name.name()));
        }

        if INVALID_INDEX_NAME.is_match(&normalize_identifier(&index.name.name())) {
            return Err(Error::IndexNameInvalid(index.name.name()));
        }

        for column in &index.columns {
            if !self.has_column(column) {
                return Err(self.missing_column(column));
            }
        }

        self.add_index_internal(index)
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(&normalize_identifier(name))
    }

    pub fn find_index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(&normalize_identifier(name))
    }

    pub fn index(&self, name: &str) -> Result<&Index> {
        self.find_index(name).ok_or_else(|| Error::IndexDoesNotExist {
            table: self.name.name(),
            index: name.to_string(),
        })
    }

    pub fn indexes(&self) -> &IndexMap<String, Index> {
        &self.indexes
    }

    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        let key = normalize_identifier(name);
        if self.indexes.shift_remove(&key).is_none() {
            return Err(Error::IndexDoesNotExist {
                table: self.name.name(),
                index: name.to_string(),
            });
        }

        self.implicit_indexes.shift_remove(&key);
        if self.primary_key_name.as_deref() == Some(key.as_str()) {
            self.primary_key_name = None;
        }

        Ok(())
    }

    /// Rename an index, keeping its definition; `None` generates a new name
    pub fn rename_index(&mut self, old_name: &str, new_name: Option<&str>) -> Result<()> {
        let old_key = normalize_identifier(old_name);
        let new_key = new_name.map(normalize_identifier);

        if new_key.as_deref() == Some(old_key.as_str()) {
            return Ok(());
        }

        let old_index = self.index(old_name)?.clone();

        if let Some(new_key) = &new_key {
            if self.indexes.contains_key(new_key) {
                return Err(Error::IndexAlreadyExists {
                    table: self.name.name(),
                    index: new_key.clone(),
                });
            }
        }

        let columns: Vec<&str> = old_index.columns.iter().map(String::as_str).collect();
        let flags: Vec<&str> = old_index.flags.iter().map(String::as_str).collect();
        let name = match new_name {
            Some(name) => name.to_string(),
            None if old_index.primary => PRIMARY_KEY_NAME.to_string(),
            None if old_index.unique => self.generated_name(&columns, "uniq"),
            None => self.generated_name(&columns, "idx"),
        };

        // Validated before the old index is removed
        let replacement = self.create_index(
            &columns,
            &name,
            old_index.unique,
            old_index.primary,
            &flags,
            old_index.options.clone(),
        )?;

        if old_index.primary {
            self.drop_primary_key();
        } else {
            self.indexes.shift_remove(&old_key);
            self.implicit_indexes.shift_remove(&old_key);
        }

        self.add_index_internal(replacement)
    }

    /// True when some index starts with exactly these columns
    pub fn columns_are_indexed(&self, columns: &[&str]) -> bool {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        self.indexes.values().any(|index| index.spans_columns(&columns))
    }

    fn create_index(
        &self,
        columns: &[&str],
        name: &str,
        unique: bool,
        primary: bool,
        flags: &[&str],
        options: IndexMap<String, Value>,
    ) -> Result<Index> {
        if INVALID_INDEX_NAME.is_match(&normalize_identifier(name)) {
            return Err(Error::IndexNameInvalid(name.to_string()));
        }

        for column in columns {
            if !self.has_column(column) {
                return Err(self.missing_column(column));
            }
        }

        let mut index = Index::new(name, columns, unique, primary).with_flags(flags);
        for (key, value) in options {
            index = index.with_option(&key, value);
        }

        Ok(index)
    }

    fn add_index_internal(&mut self, candidate: Index) -> Result<()> {
        let key = normalize_identifier(&candidate.name.name());

        let replaced: Vec<String> = self
            .implicit_indexes
            .iter()
            .filter(|(name, implicit)| {
                implicit.is_fulfilled_by(&candidate) && self.indexes.contains_key(*name)
            })
            .map(|(name, _)| name.clone())
            .collect();

        if candidate.primary && self.primary_key_name.is_some() {
            return Err(Error::PrimaryKeyAlreadyExists(self.name.name()));
        }

        if self.indexes.contains_key(&key) && !replaced.contains(&key) {
            return Err(Error::IndexAlreadyExists {
                table: self.name.name(),
                index: key,
            });
        }

        for name in &replaced {
            self.indexes.shift_remove(name);
            self.implicit_indexes.shift_remove(name);
        }

        if candidate.primary {
            self.primary_key_name = Some(key.clone());
        }

        self.indexes.insert(key, candidate);
        Ok(())
    }

    fn generated_name(&self, columns: &[&str], prefix: &str) -> String {
        let table_name = self.name.name();
        let mut parts = vec![table_name.as_str()];
        parts.extend_from_slice(columns);
        generate_identifier_name(&parts, prefix, self.max_identifier_length)
    }

    // Foreign keys

    /// Attach a foreign key to this table
    ///
    /// A missing name is generated. Unless the table uses explicit foreign key
    /// indexes, an index on the local columns is added when no existing index
    /// already fulfills that role.
    pub fn add_foreign_key(&mut self, mut foreign_key: ForeignKeyConstraint) -> Result<()> {
        for column in &foreign_key.local_columns {
            if !self.has_column(column) {
                return Err(self.missing_column(column));
            }
        }

        let local_columns: Vec<&str> = foreign_key.local_columns.iter().map(String::as_str).collect();

        if foreign_key.name.local_name().is_empty() {
            foreign_key.name = Identifier::parse(&self.generated_name(&local_columns, "fk"));
        }
        foreign_key.set_local_table(&self.name);

        let key = normalize_identifier(&foreign_key.name.name());
        let local_columns: Vec<String> = foreign_key.local_columns.clone();
        self.foreign_keys.insert(key, foreign_key);

        if self.explicit_foreign_key_indexes {
            return Ok(());
        }

        let columns: Vec<&str> = local_columns.iter().map(String::as_str).collect();
        let index_name = self.generated_name(&columns, "idx");
        let candidate = self.create_index(&columns, &index_name, false, false, &[], IndexMap::new())?;

        if self
            .indexes
            .values()
            .any(|existing| candidate.is_fulfilled_by(existing))
        {
            return Ok(());
        }

        self.add_index_internal(candidate.clone())?;
        self.implicit_indexes
            .insert(normalize_identifier(&index_name), candidate);

        Ok(())
    }

    pub fn has_foreign_key(&self, name: &str) -> bool {
        self.foreign_keys.contains_key(&normalize_identifier(name))
    }

    pub fn foreign_key(&self, name: &str) -> Result<&ForeignKeyConstraint> {
        self.foreign_keys
            .get(&normalize_identifier(name))
            .ok_or_else(|| Error::ForeignKeyDoesNotExist {
                table: self.name.name(),
                key: name.to_string(),
            })
    }

    pub fn foreign_keys(&self) -> &IndexMap<String, ForeignKeyConstraint> {
        &self.foreign_keys
    }

    pub fn remove_foreign_key(&mut self, name: &str) -> Result<ForeignKeyConstraint> {
        let table = self.name.name();
        self.foreign_keys
            .shift_remove(&normalize_identifier(name))
            .ok_or_else(|| Error::ForeignKeyDoesNotExist {
                table,
                key: name.to_string(),
            })
    }

    // Unique constraints

    pub fn add_unique_constraint(&mut self, mut constraint: UniqueConstraint) -> Result<()> {
        for column in &constraint.columns {
            if !self.has_column(column) {
                return Err(self.missing_column(column));
            }
        }

        if constraint.name.local_name().is_empty() {
            let columns: Vec<&str> = constraint.columns.iter().map(String::as_str).collect();
            constraint.name = Identifier::parse(&self.generated_name(&columns, "uniq"));
        }

        let key = normalize_identifier(&constraint.name.name());
        self.unique_constraints.insert(key, constraint);
        Ok(())
    }

    pub fn unique_constraints(&self) -> &IndexMap<String, UniqueConstraint> {
        &self.unique_constraints
    }

    // Options

    pub fn add_option(&mut self, name: &str, value: impl Into<Value>) {
        self.options.insert(name.to_string(), value.into());
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    pub fn options(&self) -> &IndexMap<String, Value> {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnType;

    fn users() -> Table {
        let mut table = Table::new("users").unwrap();
        table.add_column(Column::new("id", ColumnType::Integer)).unwrap();
        table
            .add_column(Column::new("email", ColumnType::String).not_null(false))
            .unwrap();
        table
            .add_column(Column::new("account_id", ColumnType::Integer))
            .unwrap();
        table
    }

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(matches!(Table::new(""), Err(Error::InvalidTableName(_))));
        assert!(matches!(Table::new("\"\""), Err(Error::InvalidTableName(_))));
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let mut table = users();
        assert!(table.has_column("EMAIL"));
        assert!(table.column("\"Id\"").is_ok());

        let err = table.add_column(Column::new("Email", ColumnType::Text)).unwrap_err();
        assert!(matches!(err, Error::ColumnAlreadyExists { .. }));
        assert!(matches!(table.column("missing"), Err(Error::ColumnDoesNotExist { .. })));
    }

    #[test]
    fn test_primary_key_forces_not_null() {
        let mut table = users();
        table.set_primary_key(&["email"], None).unwrap();

        assert!(table.has_primary_key());
        assert!(table.column("email").unwrap().not_null);
        assert_eq!(table.primary_key_columns().len(), 1);
        assert!(table.has_index("primary"));

        let err = table.set_primary_key(&["id"], Some("pk_other")).unwrap_err();
        assert!(matches!(err, Error::PrimaryKeyAlreadyExists(_)));
    }

    #[test]
    fn test_index_validation() {
        let mut table = users();
        let err = table
            .add_index(&["email"], Some("idx-email"), &[], IndexMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::IndexNameInvalid(_)));

        let err = table
            .add_index(&["nope"], Some("idx_nope"), &[], IndexMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::ColumnDoesNotExist { .. }));

        table.add_index(&["email"], Some("idx_email"), &[], IndexMap::new()).unwrap();
        let err = table
            .add_index(&["id"], Some("IDX_EMAIL"), &[], IndexMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::IndexAlreadyExists { .. }));
    }

    #[test]
    fn test_generated_index_name() {
        let mut table = users();
        table.set_max_identifier_length(20);
        table.add_index(&["email"], None, &[], IndexMap::new()).unwrap();

        let (name, _) = table.indexes().first().unwrap();
        assert!(name.starts_with("idx_"));
        assert_eq!(name.len(), 20);
        assert!(table.columns_are_indexed(&["email"]));
    }

    #[test]
    fn test_foreign_key_adds_implicit_index_that_explicit_index_replaces() {
        let mut table = users();
        let fk = ForeignKeyConstraint::new("fk_account", &["account_id"], "accounts", &["id"]).unwrap();
        table.add_foreign_key(fk).unwrap();

        assert_eq!(table.indexes().len(), 1);
        assert_eq!(
            table.foreign_key("FK_ACCOUNT").unwrap().local_table_name(),
            Some(&Identifier::parse("users"))
        );

        table
            .add_index(&["account_id"], Some("idx_account"), &[], IndexMap::new())
            .unwrap();
        assert_eq!(table.indexes().len(), 1);
        assert!(table.has_index("idx_account"));
    }

    #[test]
    fn test_foreign_key_reuses_existing_index() {
        let mut table = users();
        table.add_unique_index(&["account_id"], Some("uniq_account"), IndexMap::new()).unwrap();
        let fk = ForeignKeyConstraint::new("", &["account_id"], "accounts", &["id"]).unwrap();
        table.add_foreign_key(fk).unwrap();

        assert_eq!(table.indexes().len(), 1);
        let (name, _) = table.foreign_keys().first().unwrap();
        assert!(name.starts_with("fk_"));
    }

    #[test]
    fn test_explicit_foreign_key_indexes_skip_implicit_index() {
        let mut table = users();
        table.set_explicit_foreign_key_indexes(true);
        let fk = ForeignKeyConstraint::new("fk_account", &["account_id"], "accounts", &["id"]).unwrap();
        table.add_foreign_key(fk).unwrap();

        assert!(table.indexes().is_empty());
    }

    #[test]
    fn test_foreign_key_requires_local_columns() {
        let mut table = users();
        let fk = ForeignKeyConstraint::new("fk", &["missing"], "accounts", &["id"]).unwrap();
        assert!(matches!(
            table.add_foreign_key(fk),
            Err(Error::ColumnDoesNotExist { .. })
        ));
    }

    #[test]
    fn test_rename_index() {
        let mut table = users();
        table
            .add_index(&["email"], Some("idx_email"), &["fulltext"], IndexMap::new())
            .unwrap();
        table.rename_index("idx_email", Some("idx_mail")).unwrap();

        assert!(!table.has_index("idx_email"));
        assert!(table.index("idx_mail").unwrap().has_flag("FULLTEXT"));

        table.set_primary_key(&["id"], None).unwrap();
        table.rename_index("primary", Some("pk_users")).unwrap();
        assert!(table.primary_key().unwrap().primary);
        assert!(table.has_index("pk_users"));

        assert!(matches!(
            table.rename_index("missing", Some("other")),
            Err(Error::IndexDoesNotExist { .. })
        ));
    }

    #[test]
    fn test_failed_rename_keeps_index() {
        let mut table = users();
        table
            .add_index(&["email"], Some("idx_email"), &[], IndexMap::new())
            .unwrap();
        table.set_primary_key(&["id"], None).unwrap();
        let before = table.indexes().clone();

        assert!(matches!(
            table.rename_index("idx_email", Some("bad-name")),
            Err(Error::IndexNameInvalid(_))
        ));
        assert!(matches!(
            table.rename_index("primary", Some("pk-users")),
            Err(Error::IndexNameInvalid(_))
        ));

        assert_eq!(table.indexes(), &before);
        assert!(table.has_index("idx_email"));
        assert!(table.has_primary_key());
    }

    #[test]
    fn test_drop_index_and_primary_key() {
        let mut table = users();
        table.set_primary_key(&["id"], None).unwrap();
        table.drop_index("primary").unwrap();
        assert!(!table.has_primary_key());
        assert!(table.drop_index("primary").is_err());
    }

    #[test]
    fn test_modify_column() {
        let mut table = users();
        let mut options = IndexMap::new();
        options.insert("length".to_string(), serde_json::json!(320));
        table.modify_column("email", &options).unwrap();

        assert_eq!(table.column("email").unwrap().length, Some(320));
        assert!(table.modify_column("nope", &options).is_err());
    }

    #[test]
    fn test_unique_constraint_and_options() {
        let mut table = users();
        table
            .add_unique_constraint(UniqueConstraint::new("", &["email"]))
            .unwrap();
        table.add_option("engine", "InnoDB");

        assert_eq!(table.unique_constraints().len(), 1);
        assert!(table.has_option("engine"));
        assert_eq!(table.option("engine"), Some(&serde_json::json!("InnoDB")));
    }
}
