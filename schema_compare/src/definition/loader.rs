//! Definition loader for SchemaCompare
//!
//! This module discovers definition files and builds a `DatabaseSchema` from them.

use std::fmt;
use std::fs;
use std::path::Path;

use glob::Pattern;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{Config, DefinitionsConfig, SchemaConfig};
use crate::definition::records::{
    ColumnDefinition, IndexDefinition, SchemaDefinition, SequenceDefinition, TableDefinition,
};
use crate::error::{Error, Result};
use crate::schema::column::Column;
use crate::schema::constraint::{ForeignKeyConstraint, Index, UniqueConstraint};
use crate::schema::sequence::Sequence;
use crate::schema::types::DatabaseSchema;

/// What a hook wants done with a definition
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome<T> {
    /// Build the asset from the definition as usual
    Default,
    /// Use this asset instead
    Replace(T),
    /// Leave the asset out of the schema
    Skip,
}

/// Intercepts every column definition before it becomes a [`Column`]
pub trait ColumnDefinitionHook: Send + Sync {
    fn on_column_definition(
        &self,
        table: &str,
        definition: &ColumnDefinition,
    ) -> Result<HookOutcome<Column>>;
}

/// Intercepts every index definition before it becomes an [`Index`]
pub trait IndexDefinitionHook: Send + Sync {
    fn on_index_definition(
        &self,
        table: &str,
        definition: &IndexDefinition,
    ) -> Result<HookOutcome<Index>>;
}

/// Serialization format of a definition file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Toml,
    Yaml,
    Json,
}

impl DefinitionFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "toml" => Some(DefinitionFormat::Toml),
            "yaml" | "yml" => Some(DefinitionFormat::Yaml),
            "json" => Some(DefinitionFormat::Json),
            _ => None,
        }
    }

    /// Parse definition file content
    pub fn parse(&self, content: &str) -> Result<SchemaDefinition> {
        let definition = match self {
            DefinitionFormat::Toml => toml::from_str(content)
                .map_err(|e| Error::DefinitionError(format!("Invalid TOML definition: {}", e)))?,
            DefinitionFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| Error::DefinitionError(format!("Invalid YAML definition: {}", e)))?,
            DefinitionFormat::Json => serde_json::from_str(content)
                .map_err(|e| Error::DefinitionError(format!("Invalid JSON definition: {}", e)))?,
        };

        Ok(definition)
    }
}

/// Builds schemas from definition files
pub struct DefinitionLoader {
    config: DefinitionsConfig,
    schema_config: SchemaConfig,
    exclude_patterns: Vec<Pattern>,
    column_hook: Option<Box<dyn ColumnDefinitionHook>>,
    index_hook: Option<Box<dyn IndexDefinitionHook>>,
}

impl fmt::Debug for DefinitionLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionLoader")
            .field("config", &self.config)
            .field("schema_config", &self.schema_config)
            .field("column_hook", &self.column_hook.is_some())
            .field("index_hook", &self.index_hook.is_some())
            .finish()
    }
}

impl DefinitionLoader {
    /// Create a loader; fails when an exclude pattern is not a valid glob
    pub fn new(config: &Config) -> Result<Self> {
        let exclude_patterns = config
            .definitions
            .exclude_paths
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| {
                    Error::ConfigError(format!("Invalid exclude pattern {}: {}", pattern, e))
                })
            })
            .collect::<Result<Vec<Pattern>>>()?;

        Ok(Self {
            config: config.definitions.clone(),
            schema_config: config.schema.clone(),
            exclude_patterns,
            column_hook: None,
            index_hook: None,
        })
    }

    pub fn with_column_hook(mut self, hook: impl ColumnDefinitionHook + 'static) -> Self {
        self.column_hook = Some(Box::new(hook));
        self
    }

    pub fn with_index_hook(mut self, hook: impl IndexDefinitionHook + 'static) -> Self {
        self.index_hook = Some(Box::new(hook));
        self
    }

    /// Load a single definition file or every definition file under a directory
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<DatabaseSchema> {
        let base_path = path.as_ref();

        if !base_path.exists() {
            return Err(Error::DefinitionError(format!(
                "Path does not exist: {}",
                base_path.display()
            )));
        }

        let mut schema = DatabaseSchema::with_config(self.schema_config.clone());

        if base_path.is_file() {
            let definition = self.parse_file(base_path)?;
            self.apply(&mut schema, definition)?;
            return Ok(schema);
        }

        let max_depth = if self.config.recursive_scan { usize::MAX } else { 1 };
        let mut files = 0usize;

        for entry in WalkDir::new(base_path)
            .follow_links(true)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() || self.is_excluded(base_path, path) || !self.has_known_extension(path) {
                continue;
            }

            let definition = self.parse_file(path)?;
            self.apply(&mut schema, definition)?;
            files += 1;
        }

        info!(
            path = %base_path.display(),
            files = files,
            tables = schema.tables().len(),
            "Loaded schema definitions"
        );

        Ok(schema)
    }

    /// Build a schema from definition content held in memory
    pub fn load_str(&self, content: &str, format: DefinitionFormat) -> Result<DatabaseSchema> {
        let mut schema = DatabaseSchema::with_config(self.schema_config.clone());
        self.apply(&mut schema, format.parse(content)?)?;
        Ok(schema)
    }

    /// Read and parse one definition file, picking the format from its extension
    pub fn parse_file(&self, path: &Path) -> Result<SchemaDefinition> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DefinitionFormat::from_extension)
            .ok_or_else(|| {
                Error::DefinitionError(format!("Unsupported definition file: {}", path.display()))
            })?;

        debug!(path = %path.display(), ?format, "Parsing definition file");
        let content = fs::read_to_string(path)?;

        format.parse(&content).map_err(|e| match e {
            Error::DefinitionError(message) => {
                Error::DefinitionError(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    fn is_excluded(&self, base_path: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(base_path).unwrap_or(path);
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path) || pattern.matches_path(relative))
    }

    fn has_known_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    /// Add every namespace, table and sequence of `definition` to `schema`
    pub fn apply(&self, schema: &mut DatabaseSchema, definition: SchemaDefinition) -> Result<()> {
        for namespace in &definition.namespaces {
            if !schema.has_namespace(namespace) {
                schema.create_namespace(namespace)?;
            }
        }

        for table in definition.tables {
            self.build_table(schema, table)?;
        }

        for sequence in definition.sequences {
            schema.add_sequence(build_sequence(sequence))?;
        }

        Ok(())
    }

    fn build_table(&self, schema: &mut DatabaseSchema, definition: TableDefinition) -> Result<()> {
        let table_name = definition.name.clone();
        let table = schema.create_table(&table_name)?;

        for column in &definition.columns {
            let outcome = match &self.column_hook {
                Some(hook) => hook.on_column_definition(&table_name, column)?,
                None => HookOutcome::Default,
            };

            match outcome {
                HookOutcome::Default => table.add_column(Column::with_options(
                    &column.name,
                    column.column_type.clone(),
                    &column.options,
                )?)?,
                HookOutcome::Replace(replacement) => table.add_column(replacement)?,
                HookOutcome::Skip => debug!(table = %table_name, column = %column.name, "Column skipped by hook"),
            }
        }

        if !definition.primary_key.is_empty() {
            let columns: Vec<&str> = definition.primary_key.iter().map(String::as_str).collect();
            table.set_primary_key(&columns, definition.primary_key_name.as_deref())?;
        }

        for index in &definition.indexes {
            let outcome = match &self.index_hook {
                Some(hook) => hook.on_index_definition(&table_name, index)?,
                None => HookOutcome::Default,
            };

            let columns: Vec<&str> = index.columns.iter().map(String::as_str).collect();
            match outcome {
                HookOutcome::Default if index.unique => {
                    table.add_unique_index(&columns, index.name.as_deref(), index.options.clone())?
                }
                HookOutcome::Default => {
                    let flags: Vec<&str> = index.flags.iter().map(String::as_str).collect();
                    table.add_index(&columns, index.name.as_deref(), &flags, index.options.clone())?
                }
                HookOutcome::Replace(replacement) => table.insert_index(replacement)?,
                HookOutcome::Skip => debug!(table = %table_name, columns = ?index.columns, "Index skipped by hook"),
            }
        }

        for constraint in &definition.unique_constraints {
            let columns: Vec<&str> = constraint.columns.iter().map(String::as_str).collect();
            let flags: Vec<&str> = constraint.flags.iter().map(String::as_str).collect();
            let name = constraint.name.as_deref().unwrap_or_default();
            table.add_unique_constraint(UniqueConstraint::new(name, &columns).with_flags(&flags))?;
        }

        for key in &definition.foreign_keys {
            let local: Vec<&str> = key.local_columns.iter().map(String::as_str).collect();
            let foreign: Vec<&str> = key.foreign_columns.iter().map(String::as_str).collect();
            let name = key.name.as_deref().unwrap_or_default();

            let mut constraint = ForeignKeyConstraint::new(name, &local, &key.foreign_table, &foreign)?
                .deferrable(key.deferrable)
                .deferred(key.deferred);
            if let Some(action) = key.on_update {
                constraint = constraint.update_action(action);
            }
            if let Some(action) = key.on_delete {
                constraint = constraint.delete_action(action);
            }

            table.add_foreign_key(constraint)?;
        }

        for (option, value) in definition.options {
            table.add_option(&option, value);
        }

        debug!(table = %table_name, columns = definition.columns.len(), "Built table from definition");
        Ok(())
    }
}

fn build_sequence(definition: SequenceDefinition) -> Sequence {
    let sequence = Sequence::new(&definition.name)
        .allocation_size(definition.allocation_size)
        .initial_value(definition.initial_value);

    match definition.cache {
        Some(cache) => sequence.cache(cache),
        None => sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnType;
    use std::io::Write;
    use tempfile::TempDir;

    const USERS_YAML: &str = r#"
tables:
  - name: users
    columns:
      - { name: id, type: integer, autoincrement: true }
      - { name: email, type: string, length: 180 }
    primary_key: [id]
    indexes:
      - { name: uniq_email, columns: [email], unique: true }
sequences:
  - { name: users_id_seq }
"#;

    const ORDERS_TOML: &str = r#"
[[tables]]
name = "orders"
primary_key = ["id"]

[[tables.columns]]
name = "id"
type = "integer"

[[tables.columns]]
name = "user_id"
type = "integer"

[[tables.foreign_keys]]
name = "fk_orders_user"
local_columns = ["user_id"]
foreign_table = "users"
foreign_columns = ["id"]
on_delete = "cascade"
"#;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    struct UppercaseComments;

    impl ColumnDefinitionHook for UppercaseComments {
        fn on_column_definition(
            &self,
            _table: &str,
            definition: &ColumnDefinition,
        ) -> Result<HookOutcome<Column>> {
            if definition.name == "email" {
                return Ok(HookOutcome::Replace(
                    Column::new("email", ColumnType::Text).comment("REPLACED"),
                ));
            }
            if definition.name == "legacy" {
                return Ok(HookOutcome::Skip);
            }
            Ok(HookOutcome::Default)
        }
    }

    #[test]
    fn test_load_single_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users.yaml", USERS_YAML);

        let loader = DefinitionLoader::new(&Config::default()).unwrap();
        let schema = loader.load_path(dir.path().join("users.yaml")).unwrap();

        let users = schema.table("users").unwrap();
        assert!(users.has_primary_key());
        assert_eq!(users.column("email").unwrap().length, Some(180));
        assert!(users.index("uniq_email").unwrap().unique);
        assert!(schema.has_sequence("users_id_seq"));
    }

    #[test]
    fn test_load_directory_merges_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users.yaml", USERS_YAML);
        write(dir.path(), "nested/orders.toml", ORDERS_TOML);
        write(dir.path(), "README.md", "not a definition");

        let loader = DefinitionLoader::new(&Config::default()).unwrap();
        let schema = loader.load_path(dir.path()).unwrap();

        assert_eq!(schema.tables().len(), 2);
        let orders = schema.table("orders").unwrap();
        assert!(orders.has_foreign_key("fk_orders_user"));
        // The foreign key brings its own index on user_id
        assert!(orders.columns_are_indexed(&["user_id"]));
    }

    #[test]
    fn test_non_recursive_scan_and_excludes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users.yaml", USERS_YAML);
        write(dir.path(), "nested/orders.toml", ORDERS_TOML);
        write(dir.path(), "drafts/broken.json", "{ not json");

        let mut config = Config::default();
        config.definitions.exclude_paths = vec!["drafts/*".to_string()];
        let schema = DefinitionLoader::new(&config).unwrap().load_path(dir.path()).unwrap();
        assert_eq!(schema.tables().len(), 2);

        config.definitions.recursive_scan = false;
        let schema = DefinitionLoader::new(&config).unwrap().load_path(dir.path()).unwrap();
        assert_eq!(schema.table_names(), vec!["public.users".to_string()]);
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.json", "{ not json");

        let loader = DefinitionLoader::new(&Config::default()).unwrap();
        let err = loader.load_path(dir.path()).unwrap_err();
        assert!(matches!(err, Error::DefinitionError(message) if message.contains("broken.json")));
    }

    #[test]
    fn test_missing_path_and_bad_pattern() {
        let loader = DefinitionLoader::new(&Config::default()).unwrap();
        assert!(matches!(
            loader.load_path("/definitely/not/here"),
            Err(Error::DefinitionError(_))
        ));

        let mut config = Config::default();
        config.definitions.exclude_paths = vec!["[".to_string()];
        assert!(matches!(DefinitionLoader::new(&config), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_column_hook() {
        let yaml = r#"
tables:
  - name: users
    columns:
      - { name: id, type: integer }
      - { name: email, type: string }
      - { name: legacy, type: string }
"#;
        let loader = DefinitionLoader::new(&Config::default())
            .unwrap()
            .with_column_hook(UppercaseComments);
        let schema = loader.load_str(yaml, DefinitionFormat::Yaml).unwrap();
        let users = schema.table("users").unwrap();

        assert_eq!(users.columns().len(), 2);
        assert_eq!(users.column("email").unwrap().column_type, ColumnType::Text);
        assert!(!users.has_column("legacy"));
    }

    #[test]
    fn test_unknown_column_option_fails() {
        let json = r#"{"tables": [{"name": "t", "columns": [{"name": "c", "type": "string", "colour": "red"}]}]}"#;
        let loader = DefinitionLoader::new(&Config::default()).unwrap();
        assert!(matches!(
            loader.load_str(json, DefinitionFormat::Json),
            Err(Error::UnknownColumnOption(option)) if option == "colour"
        ));
    }
}
