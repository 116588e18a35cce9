//! Column model
//!
//! A [`Column`] is a value object owned by exactly one table. The comparator
//! compares columns attribute by attribute, never by identity.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::identifier::Identifier;

/// Length assumed for string and binary columns without an explicit length
pub const DEFAULT_LENGTH: u32 = 255;

/// Precision assumed for decimal columns without an explicit precision
pub const DEFAULT_PRECISION: u32 = 10;

/// Logical column type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    BigInt,
    Binary,
    Blob,
    Boolean,
    Date,
    DateTime,
    DateTimeTz,
    Time,
    Decimal,
    Float,
    Guid,
    Integer,
    Json,
    SmallInt,
    String,
    AsciiString,
    Text,
    SimpleArray,
    /// Any vendor or application specific type, stored lower-cased
    Custom(String),
}

impl ColumnType {
    /// Resolve a type tag by name, case-insensitively
    ///
    /// Unrecognised names become [`ColumnType::Custom`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "bigint" => ColumnType::BigInt,
            "binary" | "varbinary" => ColumnType::Binary,
            "blob" => ColumnType::Blob,
            "boolean" | "bool" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "datetime" => ColumnType::DateTime,
            "datetimetz" => ColumnType::DateTimeTz,
            "time" => ColumnType::Time,
            "decimal" | "numeric" => ColumnType::Decimal,
            "float" | "double" => ColumnType::Float,
            "guid" | "uuid" => ColumnType::Guid,
            "integer" | "int" => ColumnType::Integer,
            "json" => ColumnType::Json,
            "smallint" => ColumnType::SmallInt,
            "string" | "varchar" => ColumnType::String,
            "ascii_string" => ColumnType::AsciiString,
            "text" => ColumnType::Text,
            "simple_array" => ColumnType::SimpleArray,
            other => ColumnType::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ColumnType::BigInt => "bigint",
            ColumnType::Binary => "binary",
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::DateTimeTz => "datetimetz",
            ColumnType::Time => "time",
            ColumnType::Decimal => "decimal",
            ColumnType::Float => "float",
            ColumnType::Guid => "guid",
            ColumnType::Integer => "integer",
            ColumnType::Json => "json",
            ColumnType::SmallInt => "smallint",
            ColumnType::String => "string",
            ColumnType::AsciiString => "ascii_string",
            ColumnType::Text => "text",
            ColumnType::SimpleArray => "simple_array",
            ColumnType::Custom(name) => name,
        }
    }

    /// String family types; a GUID is stored as a string too
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::AsciiString | ColumnType::Guid
        )
    }

    pub fn is_guid(&self) -> bool {
        matches!(self, ColumnType::Guid)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ColumnType::Binary)
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self, ColumnType::Decimal)
    }

    /// Types whose `length` and `fixed` attributes take part in comparison
    pub fn has_length(&self) -> bool {
        (self.is_string_like() && !self.is_guid()) || self.is_binary()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ColumnType::from_name(&name))
    }
}

/// A column default as it appears in a definition or in introspected metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl DefaultValue {
    /// Weak equality between two defaults
    ///
    /// The same default reaches the model as `"0"` through one path and `0`
    /// through another, so numeric strings compare numerically, booleans
    /// compare by truthiness and everything else compares as text.
    pub fn loosely_equals(&self, other: &DefaultValue) -> bool {
        use DefaultValue::*;

        match (self, other) {
            (Boolean(a), b) | (b, Boolean(a)) => *a == b.is_truthy(),
            (String(a), String(b)) => match (numeric_value(a), numeric_value(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            (String(s), number) | (number, String(s)) => match numeric_value(s) {
                Some(x) => Some(x) == number.as_f64(),
                None => *s == number.to_string(),
            },
            (Integer(a), Integer(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            DefaultValue::Boolean(b) => *b,
            DefaultValue::Integer(i) => *i != 0,
            DefaultValue::Float(f) => *f != 0.0,
            DefaultValue::String(s) => !(s.is_empty() || s == "0"),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            DefaultValue::Integer(i) => Some(*i as f64),
            DefaultValue::Float(f) => Some(*f),
            DefaultValue::String(s) => numeric_value(s),
            DefaultValue::Boolean(_) => None,
        }
    }

    fn from_json(option: &str, value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(DefaultValue::Boolean(*b))),
            Value::String(s) => Ok(Some(DefaultValue::String(s.clone()))),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Some(DefaultValue::Integer(i))),
                None => n
                    .as_f64()
                    .map(|f| Some(DefaultValue::Float(f)))
                    .ok_or_else(|| invalid_option(option, "number out of range")),
            },
            _ => Err(invalid_option(option, "expected a scalar value")),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Boolean(b) => write!(f, "{}", b),
            DefaultValue::Integer(i) => write!(f, "{}", i),
            DefaultValue::Float(x) => write!(f, "{}", x),
            DefaultValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        DefaultValue::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        DefaultValue::String(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        DefaultValue::Integer(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        DefaultValue::Integer(value.into())
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        DefaultValue::Float(value)
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        DefaultValue::Boolean(value)
    }
}

fn numeric_value(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn invalid_option(option: &str, reason: &str) -> Error {
    Error::InvalidColumnOption {
        option: option.to_string(),
        reason: reason.to_string(),
    }
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: Identifier,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: u32,
    pub unsigned: bool,
    pub fixed: bool,
    pub not_null: bool,
    pub default: Option<DefaultValue>,
    pub autoincrement: bool,
    pub comment: Option<String>,
    pub column_definition: Option<String>,
    pub platform_options: IndexMap<String, Value>,
    pub custom_schema_options: IndexMap<String, Value>,
}

impl Column {
    /// Create a new NOT NULL column with the given name and type
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: Identifier::parse(name),
            column_type,
            length: None,
            precision: None,
            scale: 0,
            unsigned: false,
            fixed: false,
            not_null: true,
            default: None,
            autoincrement: false,
            comment: None,
            column_definition: None,
            platform_options: IndexMap::new(),
            custom_schema_options: IndexMap::new(),
        }
    }

    /// Create a column and apply an option map to it
    pub fn with_options(
        name: &str,
        column_type: ColumnType,
        options: &IndexMap<String, Value>,
    ) -> Result<Self> {
        let mut column = Column::new(name, column_type);
        column.set_options(options)?;
        Ok(column)
    }

    /// Apply named options; keys are accepted in snake_case or camelCase
    pub fn set_options(&mut self, options: &IndexMap<String, Value>) -> Result<()> {
        for (key, value) in options {
            match key.as_str() {
                "type" => {
                    self.column_type = ColumnType::from_name(&expect_str(key, value)?);
                }
                "length" => self.length = expect_optional_u32(key, value)?,
                "precision" => self.precision = expect_optional_u32(key, value)?,
                "scale" => self.scale = expect_optional_u32(key, value)?.unwrap_or(0),
                "unsigned" => self.unsigned = expect_bool(key, value)?,
                "fixed" => self.fixed = expect_bool(key, value)?,
                "notnull" | "not_null" => self.not_null = expect_bool(key, value)?,
                "nullable" => self.not_null = !expect_bool(key, value)?,
                "default" => self.default = DefaultValue::from_json(key, value)?,
                "autoincrement" => self.autoincrement = expect_bool(key, value)?,
                "comment" => self.comment = expect_optional_str(key, value)?,
                "columnDefinition" | "column_definition" => {
                    self.column_definition = expect_optional_str(key, value)?;
                }
                "platformOptions" | "platform_options" => {
                    self.platform_options = expect_object(key, value)?;
                }
                "customSchemaOptions" | "custom_schema_options" => {
                    self.custom_schema_options = expect_object(key, value)?;
                }
                other => return Err(Error::UnknownColumnOption(other.to_string())),
            }
        }

        Ok(())
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = unsigned;
        self
    }

    pub fn fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Set a default value for the column
    pub fn default_value(mut self, default: impl Into<DefaultValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn autoincrement(mut self, autoincrement: bool) -> Self {
        self.autoincrement = autoincrement;
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn column_definition(mut self, definition: &str) -> Self {
        self.column_definition = Some(definition.to_string());
        self
    }

    pub fn platform_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.platform_options.insert(name.to_string(), value.into());
        self
    }

    pub fn custom_schema_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.custom_schema_options.insert(name.to_string(), value.into());
        self
    }

    /// Precision with the decimal default applied
    pub fn effective_precision(&self) -> u32 {
        self.precision.unwrap_or(DEFAULT_PRECISION)
    }

    /// Length with the string default applied
    pub fn effective_length(&self) -> u32 {
        self.length.unwrap_or(DEFAULT_LENGTH)
    }

    /// Every attribute as a flat record, platform and custom options merged in
    pub fn to_comparable_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("name".to_string(), Value::String(self.name.name()));
        record.insert(
            "type".to_string(),
            Value::String(self.column_type.name().to_string()),
        );
        record.insert(
            "default".to_string(),
            self.default
                .as_ref()
                .map_or(Value::Null, |default| json_default(default)),
        );
        record.insert("notnull".to_string(), Value::Bool(self.not_null));
        record.insert("length".to_string(), self.length.map_or(Value::Null, Value::from));
        record.insert(
            "precision".to_string(),
            Value::from(self.effective_precision()),
        );
        record.insert("scale".to_string(), Value::from(self.scale));
        record.insert("fixed".to_string(), Value::Bool(self.fixed));
        record.insert("unsigned".to_string(), Value::Bool(self.unsigned));
        record.insert("autoincrement".to_string(), Value::Bool(self.autoincrement));
        record.insert(
            "columnDefinition".to_string(),
            self.column_definition.clone().map_or(Value::Null, Value::String),
        );
        record.insert(
            "comment".to_string(),
            self.comment.clone().map_or(Value::Null, Value::String),
        );

        for (key, value) in self.platform_options.iter().chain(&self.custom_schema_options) {
            record.insert(key.clone(), value.clone());
        }

        record
    }
}

fn json_default(default: &DefaultValue) -> Value {
    match default {
        DefaultValue::Boolean(b) => Value::Bool(*b),
        DefaultValue::Integer(i) => Value::from(*i),
        DefaultValue::Float(f) => Value::from(*f),
        DefaultValue::String(s) => Value::String(s.clone()),
    }
}

fn expect_bool(option: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| invalid_option(option, "expected a boolean"))
}

fn expect_str(option: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_option(option, "expected a string"))
}

fn expect_optional_str(option: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        _ => expect_str(option, value).map(Some),
    }
}

fn expect_optional_u32(option: &str, value: &Value) -> Result<Option<u32>> {
    match value {
        Value::Null => Ok(None),
        _ => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid_option(option, "expected a non-negative integer")),
    }
}

fn expect_object(option: &str, value: &Value) -> Result<IndexMap<String, Value>> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
        _ => Err(invalid_option(option, "expected a table of options")),
    }
}
