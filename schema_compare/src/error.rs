//! Error types for SchemaCompare

use thiserror::Error;

/// Result type for SchemaCompare operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for SchemaCompare
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Definition error: {0}")]
    DefinitionError(String),

    #[error("Invalid table name \"{0}\"")]
    InvalidTableName(String),

    #[error("The table with name \"{0}\" already exists")]
    TableAlreadyExists(String),

    #[error("There is no table with name \"{0}\" in the schema")]
    TableDoesNotExist(String),

    #[error("The column \"{column}\" on table \"{table}\" already exists")]
    ColumnAlreadyExists { table: String, column: String },

    #[error("There is no column with name \"{column}\" on table \"{table}\"")]
    ColumnDoesNotExist { table: String, column: String },

    #[error("An index with name \"{index}\" was already defined on table \"{table}\"")]
    IndexAlreadyExists { table: String, index: String },

    #[error("Index \"{index}\" does not exist on table \"{table}\"")]
    IndexDoesNotExist { table: String, index: String },

    #[error("Invalid index name \"{0}\" given, has to be [a-zA-Z0-9_]")]
    IndexNameInvalid(String),

    #[error("Table \"{0}\" already has a primary key")]
    PrimaryKeyAlreadyExists(String),

    #[error("There exists no foreign key with the name \"{key}\" on table \"{table}\"")]
    ForeignKeyDoesNotExist { table: String, key: String },

    #[error(
        "Foreign key \"{name}\" maps {local} local column(s) to {foreign} foreign column(s)"
    )]
    ForeignKeyColumnMismatch {
        name: String,
        local: usize,
        foreign: usize,
    },

    #[error("The sequence \"{0}\" already exists")]
    SequenceAlreadyExists(String),

    #[error("There exists no sequence with the name \"{0}\"")]
    SequenceDoesNotExist(String),

    #[error("The namespace with name \"{0}\" already exists")]
    NamespaceAlreadyExists(String),

    #[error("The \"{0}\" column option is not supported")]
    UnknownColumnOption(String),

    #[error("Invalid value for column option \"{option}\": {reason}")]
    InvalidColumnOption { option: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Convert Serde JSON errors to SchemaCompare errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert Serde YAML errors to SchemaCompare errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to SchemaCompare errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
