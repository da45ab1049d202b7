//! Entity definitions: scalar fields, keys and foreign keys

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::naming::to_snake_case;

/// Name of the auto-assigned integer key column
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// Scalar column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ScalarType {
    Integer,
    /// Bounded string; `None` means unbounded VARCHAR
    String { max_length: Option<u32> },
    Text,
    Boolean,
    Float,
    /// RFC 3339 timestamp
    Timestamp,
}

impl ScalarType {
    /// SQL column type used for table creation
    pub fn sql_type(&self) -> String {
        match self {
            ScalarType::Integer => "INTEGER".to_string(),
            ScalarType::String { max_length: Some(n) } => format!("VARCHAR({})", n),
            ScalarType::String { max_length: None } => "VARCHAR".to_string(),
            ScalarType::Text => "TEXT".to_string(),
            ScalarType::Boolean => "BOOLEAN".to_string(),
            ScalarType::Float => "FLOAT".to_string(),
            ScalarType::Timestamp => "TIMESTAMP".to_string(),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Integer => write!(f, "Integer"),
            ScalarType::String { max_length: Some(n) } => write!(f, "String({})", n),
            ScalarType::String { max_length: None } => write!(f, "String"),
            ScalarType::Text => write!(f, "Text"),
            ScalarType::Boolean => write!(f, "Boolean"),
            ScalarType::Float => write!(f, "Float"),
            ScalarType::Timestamp => write!(f, "Timestamp"),
        }
    }
}

/// Target of a foreign key column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Target entity name (not its table name)
    pub entity: String,
    /// Target column; defaults to the target's single key column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// A single column of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: ScalarType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
}

impl FieldDef {
    /// Create a required, non-unique field
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            unique: false,
            references: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Integer)
    }

    /// Bounded string column, `String(n)`
    pub fn string(name: impl Into<String>, max_length: u32) -> Self {
        Self::new(name, ScalarType::String { max_length: Some(max_length) })
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Text)
    }

    /// Integer column referencing `entity`'s key
    pub fn foreign_key(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::integer(name).references(entity)
    }

    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, entity: impl Into<String>) -> Self {
        self.references = Some(ForeignKeyRef {
            entity: entity.into(),
            column: None,
        });
        self
    }

    /// Reference a specific key column of `entity`
    pub fn references_column(mut self, entity: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKeyRef {
            entity: entity.into(),
            column: Some(column.into()),
        });
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }

    /// True if this column references `entity`
    pub fn targets(&self, entity: &str) -> bool {
        self.references.as_ref().is_some_and(|r| r.entity == entity)
    }
}

/// Primary key specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PrimaryKey {
    /// Single auto-assigned integer key
    Auto { column: String },
    /// Concatenation of named foreign-key fields
    Composite { columns: Vec<String> },
}

impl PrimaryKey {
    /// Auto-assigned integer key named `id`
    pub fn auto() -> Self {
        PrimaryKey::Auto {
            column: DEFAULT_KEY_COLUMN.to_string(),
        }
    }

    pub fn composite<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PrimaryKey::Composite {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Auto { column } => vec![column.as_str()],
            PrimaryKey::Composite { columns } => columns.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, PrimaryKey::Composite { .. })
    }

    /// The key column if the key is a single auto-assigned integer
    pub fn auto_column(&self) -> Option<&str> {
        match self {
            PrimaryKey::Auto { column } => Some(column),
            PrimaryKey::Composite { .. } => None,
        }
    }
}

/// How an entity takes part in the relationship topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Row-kind with its own identity
    Regular,
    /// Composite-key relation of foreign keys only, realizing a plain many-to-many
    JoinTable,
    /// Composite-key entity carrying attributes about the link itself
    Association,
}

/// A registered row-kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name, unique within a registry
    pub name: String,
    /// Storage relation name
    pub table_name: String,
    pub primary_key: PrimaryKey,
    /// Scalar and foreign-key columns (the auto key column is implicit)
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// New entity; the table name defaults to the snake_case entity name
    pub fn new(name: impl Into<String>, primary_key: PrimaryKey) -> Self {
        let name = name.into();
        Self {
            table_name: to_snake_case(&name),
            name,
            primary_key,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All column names, key column first for auto keys
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.primary_key.auto_column().into_iter().collect();
        names.extend(self.fields.iter().map(|f| f.name.as_str()));
        names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.primary_key.auto_column() == Some(name) || self.get_field(name).is_some()
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key.columns().contains(&name)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_foreign_key())
    }

    /// Foreign-key columns referencing `entity`
    pub fn foreign_keys_to(&self, entity: &str) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| f.targets(entity)).collect()
    }

    /// Non-key fields: what an association entity says about the link
    pub fn attribute_fields(&self) -> Vec<&FieldDef> {
        self.fields
            .iter()
            .filter(|f| !self.is_key_column(&f.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_defaults_to_snake_case() {
        let entity = EntityDef::new("AssociationClass", PrimaryKey::auto());
        assert_eq!(entity.table_name, "association_class");

        let entity = EntityDef::new("User", PrimaryKey::auto()).table("user_account");
        assert_eq!(entity.table_name, "user_account");
    }

    #[test]
    fn test_columns_and_keys() {
        let address = EntityDef::new("Address", PrimaryKey::auto())
            .field(FieldDef::text("email_address"))
            .field(FieldDef::foreign_key("user_id", "User"));

        assert_eq!(address.column_names(), vec!["id", "email_address", "user_id"]);
        assert!(address.is_key_column("id"));
        assert!(address.has_column("user_id"));
        assert_eq!(address.foreign_keys_to("User").len(), 1);
        assert_eq!(address.attribute_fields().len(), 2);
    }

    #[test]
    fn test_composite_attributes_exclude_key() {
        let assoc = EntityDef::new("AssociationClass", PrimaryKey::composite(["planet_id", "people_id"]))
            .field(FieldDef::foreign_key("planet_id", "Planets"))
            .field(FieldDef::foreign_key("people_id", "People"))
            .field(FieldDef::string("notas", 250).optional());

        let attrs: Vec<_> = assoc.attribute_fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(attrs, vec!["notas"]);
        assert_eq!(assoc.column_names(), vec!["planet_id", "people_id", "notas"]);
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(ScalarType::String { max_length: Some(120) }.sql_type(), "VARCHAR(120)");
        assert_eq!(ScalarType::Integer.to_string(), "Integer");
    }
}
