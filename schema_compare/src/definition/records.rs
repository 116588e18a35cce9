//! Declarative schema definition records
//!
//! These mirror the object model in a form that TOML, YAML and JSON files can
//! express directly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::column::ColumnType;
use crate::schema::constraint::ReferentialAction;

/// Top level content of a definition file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaDefinition {
    pub namespaces: Vec<String>,
    pub tables: Vec<TableDefinition>,
    pub sequences: Vec<SequenceDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub primary_key_name: Option<String>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default)]
    pub unique_constraints: Vec<UniqueConstraintDefinition>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    #[serde(default)]
    pub options: IndexMap<String, Value>,
}

/// A column; every key besides `name` and `type` is a column option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(flatten)]
    pub options: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub options: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraintDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub local_columns: Vec<String>,
    pub foreign_table: String,
    pub foreign_columns: Vec<String>,
    #[serde(default)]
    pub on_update: Option<ReferentialAction>,
    #[serde(default)]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default)]
    pub deferrable: bool,
    #[serde(default)]
    pub deferred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    pub name: String,
    #[serde(default = "default_one")]
    pub allocation_size: i64,
    #[serde(default = "default_one")]
    pub initial_value: i64,
    #[serde(default)]
    pub cache: Option<i64>,
}

fn default_one() -> i64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_options_are_flattened() {
        let yaml = r#"
tables:
  - name: users
    columns:
      - { name: id, type: integer, autoincrement: true }
      - { name: email, type: string, length: 180, nullable: true }
    primary_key: [id]
"#;
        let definition: SchemaDefinition = serde_yaml::from_str(yaml).unwrap();
        let table = &definition.tables[0];

        assert_eq!(table.columns[0].column_type, ColumnType::Integer);
        assert_eq!(table.columns[1].options["length"], serde_json::json!(180));
        assert_eq!(table.columns[1].options["nullable"], serde_json::json!(true));
        assert!(!table.columns[1].options.contains_key("type"));
        assert_eq!(table.primary_key, vec!["id".to_string()]);
    }

    #[test]
    fn test_sequence_defaults() {
        let definition: SchemaDefinition =
            serde_json::from_str(r#"{"sequences": [{"name": "users_id_seq"}]}"#).unwrap();
        assert_eq!(definition.sequences[0].allocation_size, 1);
        assert_eq!(definition.sequences[0].initial_value, 1);
    }

    #[test]
    fn test_foreign_key_actions_from_toml() {
        let toml_source = r#"
[[tables]]
name = "orders"

[[tables.foreign_keys]]
local_columns = ["customer_id"]
foreign_table = "customers"
foreign_columns = ["id"]
on_delete = "cascade"
on_update = "SET NULL"
"#;
        let definition: SchemaDefinition = toml::from_str(toml_source).unwrap();
        let key = &definition.tables[0].foreign_keys[0];
        assert_eq!(key.on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(key.on_update, Some(ReferentialAction::SetNull));
        assert_eq!(key.name, None);
    }
}
