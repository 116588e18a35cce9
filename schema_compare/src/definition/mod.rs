//! Definitions module for SchemaCompare
//!
//! This module reads declarative schema definitions from TOML, YAML or JSON files.

pub mod loader;
pub mod records;

// Re-export key types
pub use loader::{
    ColumnDefinitionHook, DefinitionFormat, DefinitionLoader, HookOutcome, IndexDefinitionHook,
};
pub use records::{
    ColumnDefinition, ForeignKeyDefinition, IndexDefinition, SchemaDefinition,
    SequenceDefinition, TableDefinition, UniqueConstraintDefinition,
};
