//! Error types for the schema registry

use thiserror::Error;

use crate::diagnostics::Violations;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Result type for instance store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Schema registry errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Entity already registered: {name}")]
    DuplicateEntity { name: String },

    #[error("Dangling reference from {from}: entity '{target}' is not defined{}", did_you_mean(.suggestion))]
    DanglingReference {
        from: String,
        target: String,
        suggestion: Option<String>,
    },

    #[error("Invalid composite key on {entity}: {reason}")]
    InvalidCompositeKey { entity: String, reason: String },

    #[error("Schema inconsistency: {} violation(s)\n{}", .0.error_count(), .0)]
    SchemaInconsistency(Violations),

    #[error("Registry '{registry}' is finalized: cannot {operation}")]
    RegistrySealed {
        registry: String,
        operation: &'static str,
    },

    #[error("Registry '{registry}' is not finalized: cannot {operation}")]
    NotFinalized {
        registry: String,
        operation: &'static str,
    },

    #[error("Field '{field}' declared twice on {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("Relationship attribute '{attribute}' declared twice on {entity}")]
    DuplicateRelationship { entity: String, attribute: String },

    #[error("Invalid {kind} name: '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("Invalid primary key on {entity}: {reason}")]
    InvalidPrimaryKey { entity: String, reason: String },

    #[error("Invalid realization for {entity}.{attribute}: {reason}")]
    InvalidVia {
        entity: String,
        attribute: String,
        reason: String,
    },

    #[error("Join table {entity} carries non-key fields: {}", .fields.join(", "))]
    JoinTableHasAttributes { entity: String, fields: Vec<String> },

    #[error("Unsupported diagram output: {0}")]
    UnsupportedFormat(String),

    #[error("Diagram rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

/// Instance store errors (row-level referential integrity)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("Required field '{field}' missing on {entity}")]
    MissingField { entity: String, field: String },

    #[error("Field '{field}' on {entity} expects {expected}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
    },

    #[error("Composite key component '{column}' of {entity} is null")]
    NullKeyComponent { entity: String, column: String },

    #[error("Duplicate key {key} in {entity}")]
    DuplicateKey { entity: String, key: String },

    #[error("Unique field '{field}' on {entity} already holds {value}")]
    UniqueViolation {
        entity: String,
        field: String,
        value: String,
    },

    #[error("{entity}.{column} = {value} references a missing {target} row")]
    ForeignKeyViolation {
        entity: String,
        column: String,
        target: String,
        value: i64,
    },

    #[error("No {entity} keys left to assign")]
    KeySpaceExhausted { entity: String },

    #[error("No {entity} row with key {key}")]
    RowNotFound { entity: String, key: String },
}
