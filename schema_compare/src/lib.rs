//! SchemaCompare: structural comparison of relational database schemas
//!
//! SchemaCompare models tables, columns, indexes, foreign keys and sequences
//! portably and computes the difference between two schemas as plain data,
//! ready for a migration generator or for review.

// Lets `#[derive(TableModel)]` expand to `::schema_compare` paths inside this crate
extern crate self as schema_compare;

pub mod config;
pub mod definition;
pub mod error;
pub mod report;
pub mod schema;
pub mod utils;

use std::path::Path;

// Re-export main types for easier access
pub use config::Config;
pub use definition::{DefinitionFormat, DefinitionLoader};
pub use error::{Error, Result};
pub use report::DiffReport;
pub use schema::{
    Column, ColumnDiff, ColumnType, Comparator, DatabaseSchema, DefaultValue,
    ForeignKeyConstraint, Identifier, Index, ReferentialAction, SchemaDiff, Sequence, Table,
    TableDiff, TableModel, UniqueConstraint,
};
pub use schema_compare_macros::TableModel;

/// Initialize SchemaCompare with the specified configuration file
pub fn init(config_path: &str) -> Result<SchemaCompareClient> {
    let config = config::load_from_file(config_path)?;
    SchemaCompareClient::new(config)
}

/// The main client for interacting with SchemaCompare
#[derive(Debug)]
pub struct SchemaCompareClient {
    config: Config,
    loader: DefinitionLoader,
    comparator: Comparator,
}

impl SchemaCompareClient {
    /// Create a new SchemaCompare client from configuration
    pub fn new(config: Config) -> Result<Self> {
        let loader = DefinitionLoader::new(&config)?;
        let comparator = Comparator::with_config(config.comparator);

        Ok(Self {
            config,
            loader,
            comparator,
        })
    }

    /// Replace the definition loader, for instance to install hooks
    pub fn with_loader(mut self, loader: DefinitionLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a schema from a definition file or directory
    pub fn load_schema(&self, path: impl AsRef<Path>) -> Result<DatabaseSchema> {
        self.loader.load_path(path)
    }

    /// Compare two in-memory schemas
    pub fn compare(&self, from_schema: &DatabaseSchema, to_schema: &DatabaseSchema) -> SchemaDiff {
        self.comparator.compare(from_schema, to_schema)
    }

    /// Load both definition sets and compare them
    pub fn diff_paths(&self, from_path: impl AsRef<Path>, to_path: impl AsRef<Path>) -> Result<SchemaDiff> {
        let from_schema = self.load_schema(from_path)?;
        let to_schema = self.load_schema(to_path)?;

        Ok(self.compare(&from_schema, &to_schema))
    }

    /// Wrap a diff in a report configured by the `[output]` section
    pub fn report(&self, diff: SchemaDiff) -> DiffReport {
        DiffReport::new(diff, self.config.output.include_timestamp)
    }

    /// Render a diff using the configured output settings
    pub fn render(&self, diff: SchemaDiff) -> Result<String> {
        self.report(diff).render_with(&self.config.output)
    }
}
