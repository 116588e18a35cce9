//! Diff reports
//!
//! Renders a [`SchemaDiff`] for people (text) or tools (JSON, YAML).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::schema::diff::{SchemaDiff, TableDiff};

/// Number of entries per diff category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub new_namespaces: usize,
    pub removed_namespaces: usize,
    pub new_tables: usize,
    pub changed_tables: usize,
    pub removed_tables: usize,
    pub new_sequences: usize,
    pub changed_sequences: usize,
    pub removed_sequences: usize,
    pub orphaned_foreign_keys: usize,
}

impl DiffSummary {
    pub fn from_diff(diff: &SchemaDiff) -> Self {
        Self {
            new_namespaces: diff.new_namespaces.len(),
            removed_namespaces: diff.removed_namespaces.len(),
            new_tables: diff.new_tables.len(),
            changed_tables: diff.changed_tables.len(),
            removed_tables: diff.removed_tables.len(),
            new_sequences: diff.new_sequences.len(),
            changed_sequences: diff.changed_sequences.len(),
            removed_sequences: diff.removed_sequences.len(),
            orphaned_foreign_keys: diff.orphaned_foreign_keys.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.new_namespaces
            + self.removed_namespaces
            + self.new_tables
            + self.changed_tables
            + self.removed_tables
            + self.new_sequences
            + self.changed_sequences
            + self.removed_sequences
            + self.orphaned_foreign_keys
    }
}

/// A schema diff ready to be printed
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub summary: DiffSummary,
    pub diff: SchemaDiff,
}

impl DiffReport {
    pub fn new(diff: SchemaDiff, include_timestamp: bool) -> Self {
        Self {
            generated_at: include_timestamp.then(Utc::now),
            summary: DiffSummary::from_diff(&diff),
            diff,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.diff.is_empty()
    }

    /// Render the report in the given format
    pub fn render(&self, format: OutputFormat, pretty: bool) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.to_string()),
            OutputFormat::Json if pretty => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Json => Ok(serde_json::to_string(self)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }

    pub fn render_with(&self, output: &OutputConfig) -> Result<String> {
        self.render(output.format, output.pretty)
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(generated_at) = &self.generated_at {
            writeln!(f, "Schema diff generated at {}", generated_at.to_rfc3339())?;
        }

        if self.diff.is_empty() {
            return writeln!(f, "No differences found");
        }

        let diff = &self.diff;

        for namespace in &diff.new_namespaces {
            writeln!(f, "+ namespace {}", namespace)?;
        }
        for namespace in &diff.removed_namespaces {
            writeln!(f, "- namespace {}", namespace)?;
        }

        for (name, table) in &diff.new_tables {
            writeln!(f, "+ table {} ({} columns)", name, table.columns().len())?;
        }
        for name in diff.removed_tables.keys() {
            writeln!(f, "- table {}", name)?;
        }
        for (name, table_diff) in &diff.changed_tables {
            writeln!(f, "~ table {}", name)?;
            write_table_diff(f, table_diff)?;
        }

        for sequence in &diff.new_sequences {
            writeln!(f, "+ sequence {}", sequence.name)?;
        }
        for sequence in &diff.changed_sequences {
            writeln!(
                f,
                "~ sequence {} (allocation size {}, initial value {})",
                sequence.name, sequence.allocation_size, sequence.initial_value
            )?;
        }
        for sequence in &diff.removed_sequences {
            writeln!(f, "- sequence {}", sequence.name)?;
        }

        for key in &diff.orphaned_foreign_keys {
            let table = key
                .local_table_name()
                .map(|table| table.to_string())
                .unwrap_or_default();
            writeln!(
                f,
                "! orphaned foreign key {} on {} -> {}",
                key.name, table, key.foreign_table
            )?;
        }

        writeln!(f, "{} change(s)", self.summary.total())
    }
}

fn write_table_diff(f: &mut fmt::Formatter<'_>, diff: &TableDiff) -> fmt::Result {
    for column in diff.added_columns.values() {
        writeln!(f, "    + column {} {}", column.name, column.column_type)?;
    }
    for name in diff.removed_columns.keys() {
        writeln!(f, "    - column {}", name)?;
    }
    for (name, column_diff) in &diff.changed_columns {
        writeln!(
            f,
            "    ~ column {} ({})",
            name,
            column_diff.changed_properties.join(", ")
        )?;
    }
    for (old_name, column) in &diff.renamed_columns {
        writeln!(f, "    > column {} -> {}", old_name, column.name)?;
    }

    for name in diff.added_indexes.keys() {
        writeln!(f, "    + index {}", name)?;
    }
    for name in diff.removed_indexes.keys() {
        writeln!(f, "    - index {}", name)?;
    }
    for name in diff.changed_indexes.keys() {
        writeln!(f, "    ~ index {}", name)?;
    }
    for (old_name, index) in &diff.renamed_indexes {
        writeln!(f, "    > index {} -> {}", old_name, index.name)?;
    }

    for key in &diff.added_foreign_keys {
        writeln!(f, "    + foreign key {} -> {}", key.name, key.foreign_table)?;
    }
    for key in &diff.removed_foreign_keys {
        writeln!(f, "    - foreign key {}", key.name)?;
    }
    for key in &diff.changed_foreign_keys {
        writeln!(f, "    ~ foreign key {} -> {}", key.name, key.foreign_table)?;
    }

    Ok(())
}
