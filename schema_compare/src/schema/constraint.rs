//! Structural constraints: indexes, foreign keys and unique constraints

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::schema::identifier::Identifier;
use crate::utils::naming::normalize_identifier;

/// True when `columns` lists exactly `other` in the same order, ignoring case and quotes
fn same_column_sequence(columns: &[String], other: &[String]) -> bool {
    columns.len() <= other.len()
        && columns
            .iter()
            .zip(other)
            .all(|(a, b)| normalize_identifier(a) == normalize_identifier(b))
}

fn normalized_flags(flags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = flags.iter().map(|flag| flag.to_lowercase()).collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Represents an index, including the primary key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Index {
    pub name: Identifier,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
    /// Platform flags such as `fulltext`, `spatial` or `clustered`, lower-cased
    pub flags: Vec<String>,
    /// Includes the partial index predicate (`where`) and prefix `lengths`
    pub options: IndexMap<String, Value>,
}

impl Index {
    /// Create an index; a primary index is always unique
    pub fn new(name: &str, columns: &[&str], unique: bool, primary: bool) -> Self {
        Self {
            name: Identifier::parse(name),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: unique || primary,
            primary,
            flags: Vec::new(),
            options: IndexMap::new(),
        }
    }

    pub fn with_flags(mut self, flags: &[&str]) -> Self {
        for flag in flags {
            self.add_flag(flag);
        }
        self
    }

    pub fn with_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.options.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn is_simple_index(&self) -> bool {
        !self.primary && !self.unique
    }

    pub fn add_flag(&mut self, flag: &str) {
        let flag = flag.to_lowercase();
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    pub fn remove_flag(&mut self, flag: &str) {
        let flag = flag.to_lowercase();
        self.flags.retain(|existing| *existing != flag);
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(&flag.to_lowercase())
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.option(name).is_some()
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        let name = name.to_lowercase();
        self.options
            .iter()
            .find(|(key, _)| key.to_lowercase() == name)
            .map(|(_, value)| value)
    }

    /// True when the index covers `column_names` starting at its first column, in order
    pub fn spans_columns(&self, column_names: &[String]) -> bool {
        same_column_sequence(&self.columns, column_names)
    }

    /// True when `other` enforces everything this index enforces
    ///
    /// The name is not taken into account.
    pub fn is_fulfilled_by(&self, other: &Index) -> bool {
        // Only an equally wide index qualifies, PRIMARY KEY(a, b) does not make (a) unique
        if other.columns.len() != self.columns.len() {
            return false;
        }

        if !self.spans_columns(&other.columns) {
            return false;
        }

        if !self.same_partial_index(other)
            || !self.same_column_lengths(other)
            || normalized_flags(&self.flags) != normalized_flags(&other.flags)
        {
            return false;
        }

        // Any unique or primary index has the effect of a plain index on the same columns
        if self.is_simple_index() {
            return true;
        }

        other.primary == self.primary && other.unique == self.unique
    }

    /// True when this index makes `other` redundant
    pub fn overrules(&self, other: &Index) -> bool {
        if other.primary {
            return false;
        }

        if self.is_simple_index() && other.unique {
            return false;
        }

        self.spans_columns(&other.columns)
            && (self.primary || self.unique)
            && self.same_partial_index(other)
    }

    fn same_partial_index(&self, other: &Index) -> bool {
        match (self.option("where"), other.option("where")) {
            (Some(a), Some(b)) => a == b,
            (None, None) => true,
            _ => false,
        }
    }

    fn same_column_lengths(&self, other: &Index) -> bool {
        self.column_lengths() == other.column_lengths()
    }

    fn column_lengths(&self) -> Vec<(usize, Value)> {
        match self.option("lengths") {
            Some(Value::Array(lengths)) => lengths
                .iter()
                .enumerate()
                .filter(|(_, length)| !length.is_null())
                .map(|(position, length)| (position, length.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Referential action of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    NoAction,
    Restrict,
}

impl ReferentialAction {
    /// `NO ACTION` and `RESTRICT` behave as no action at all
    pub fn normalized(self) -> Option<ReferentialAction> {
        match self {
            ReferentialAction::NoAction | ReferentialAction::Restrict => None,
            action => Some(action),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
        }
    }
}

impl FromStr for ReferentialAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace(&['_', '-'][..], " ");
        match normalized.as_str() {
            "CASCADE" => Ok(ReferentialAction::Cascade),
            "SET NULL" => Ok(ReferentialAction::SetNull),
            "SET DEFAULT" => Ok(ReferentialAction::SetDefault),
            "NO ACTION" => Ok(ReferentialAction::NoAction),
            "RESTRICT" => Ok(ReferentialAction::Restrict),
            _ => Err(Error::ValidationError(format!(
                "Unknown referential action: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl Serialize for ReferentialAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_sql())
    }
}

impl<'de> Deserialize<'de> for ReferentialAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Represents a foreign key constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyConstraint {
    /// Empty until the owning table assigns a generated name
    pub name: Identifier,
    pub local_columns: Vec<String>,
    pub foreign_table: Identifier,
    pub foreign_columns: Vec<String>,
    pub update_action: Option<ReferentialAction>,
    pub delete_action: Option<ReferentialAction>,
    pub deferrable: bool,
    pub deferred: bool,
    local_table: Option<Identifier>,
}

impl ForeignKeyConstraint {
    /// Create a foreign key; local and foreign column lists must have the same length
    pub fn new(
        name: &str,
        local_columns: &[&str],
        foreign_table: &str,
        foreign_columns: &[&str],
    ) -> Result<Self> {
        if local_columns.len() != foreign_columns.len() {
            return Err(Error::ForeignKeyColumnMismatch {
                name: name.to_string(),
                local: local_columns.len(),
                foreign: foreign_columns.len(),
            });
        }

        Ok(Self {
            name: Identifier::parse(name),
            local_columns: local_columns.iter().map(|c| c.to_string()).collect(),
            foreign_table: Identifier::parse(foreign_table),
            foreign_columns: foreign_columns.iter().map(|c| c.to_string()).collect(),
            update_action: None,
            delete_action: None,
            deferrable: false,
            deferred: false,
            local_table: None,
        })
    }

    pub fn update_action(mut self, action: ReferentialAction) -> Self {
        self.update_action = Some(action);
        self
    }

    pub fn delete_action(mut self, action: ReferentialAction) -> Self {
        self.delete_action = Some(action);
        self
    }

    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = deferrable;
        self
    }

    pub fn deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    /// Normalized update action, `None` for no action
    pub fn on_update(&self) -> Option<ReferentialAction> {
        self.update_action.and_then(ReferentialAction::normalized)
    }

    /// Normalized delete action, `None` for no action
    pub fn on_delete(&self) -> Option<ReferentialAction> {
        self.delete_action.and_then(ReferentialAction::normalized)
    }

    /// Lower-cased referenced table name without its namespace
    pub fn unqualified_foreign_table_name(&self) -> String {
        self.foreign_table.local_name().to_lowercase()
    }

    /// Name of the owning table, once the key has been added to one
    pub fn local_table_name(&self) -> Option<&Identifier> {
        self.local_table.as_ref()
    }

    pub(crate) fn set_local_table(&mut self, table: &Identifier) {
        self.local_table = Some(table.clone());
    }

    /// True when any local column is also a column of `index`
    pub fn intersects_index_columns(&self, index: &Index) -> bool {
        index.columns.iter().any(|index_column| {
            self.local_columns
                .iter()
                .any(|local| normalize_identifier(local) == normalize_identifier(index_column))
        })
    }
}

/// Represents a unique constraint declared apart from an index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueConstraint {
    pub name: Identifier,
    pub columns: Vec<String>,
    pub flags: Vec<String>,
    pub options: IndexMap<String, Value>,
}

impl UniqueConstraint {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: Identifier::parse(name),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            flags: Vec::new(),
            options: IndexMap::new(),
        }
    }

    pub fn with_flags(mut self, flags: &[&str]) -> Self {
        for flag in flags {
            let flag = flag.to_lowercase();
            if !self.flags.contains(&flag) {
                self.flags.push(flag);
            }
        }
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(&flag.to_lowercase())
    }

    pub fn spans_columns(&self, column_names: &[String]) -> bool {
        same_column_sequence(&self.columns, column_names)
    }
}
