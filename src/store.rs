//! In-memory instance store
//!
//! Holds rows for the entities of a finalized [`Schema`] and enforces the
//! row-level lifecycle rules the schema declares: auto-assigned keys,
//! required fields, referential integrity on insert, cascade on delete and
//! join-table cleanup. Rows are plain JSON objects keyed by column name.

use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::schema::{EntityDef, EntityKind, FieldDef, ScalarType};
use crate::snapshot::Schema;

/// A row: column name to value
pub type Row = serde_json::Map<String, Value>;

/// Primary key value, one component per key column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowKey(pub Vec<i64>);

impl RowKey {
    pub fn single(id: i64) -> Self {
        RowKey(vec![id])
    }

    /// The key when it has exactly one component
    pub fn as_single(&self) -> Option<i64> {
        match self.0.as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }
}

impl From<i64> for RowKey {
    fn from(id: i64) -> Self {
        RowKey::single(id)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_single() {
            Some(id) => write!(f, "{}", id),
            None => {
                let parts: Vec<String> = self.0.iter().map(i64::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// Rows removed by one delete, in removal order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub removed: Vec<(String, RowKey)>,
}

impl DeleteReport {
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    pub fn removed_from(&self, entity: &str) -> usize {
        self.removed.iter().filter(|(e, _)| e == entity).count()
    }

    pub fn contains(&self, entity: &str, key: &RowKey) -> bool {
        self.removed.iter().any(|(e, k)| e == entity && k == key)
    }
}

/// A foreign-key value whose target row no longer exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingRow {
    pub entity: String,
    pub key: RowKey,
    pub column: String,
    pub target: String,
    pub value: i64,
}

/// Rows for every entity of one schema
#[derive(Debug)]
pub struct InstanceStore<'a> {
    schema: &'a Schema,
    tables: HashMap<String, BTreeMap<RowKey, Row>>,
    next_id: HashMap<String, i64>,
}

impl<'a> InstanceStore<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            tables: HashMap::new(),
            next_id: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Insert a row, returning its key
    ///
    /// Auto keys are assigned when the row leaves them out. Every foreign-key
    /// value must name an existing row.
    pub fn insert(&mut self, entity: &str, mut row: Row) -> StoreResult<RowKey> {
        let def = self.entity_def(entity)?;

        if let Some(unknown) = row.keys().find(|c| !def.has_column(c)) {
            return Err(StoreError::UnknownField {
                entity: entity.to_string(),
                field: unknown.clone(),
            });
        }

        for field in &def.fields {
            match row.get(&field.name) {
                None | Some(Value::Null) => {
                    if def.primary_key.is_composite() && def.is_key_column(&field.name) {
                        return Err(StoreError::NullKeyComponent {
                            entity: entity.to_string(),
                            column: field.name.clone(),
                        });
                    }
                    if !field.nullable {
                        return Err(StoreError::MissingField {
                            entity: entity.to_string(),
                            field: field.name.clone(),
                        });
                    }
                    row.insert(field.name.clone(), Value::Null);
                }
                Some(value) => check_type(entity, field, value)?,
            }
        }

        let key = match def.primary_key.auto_column() {
            Some(column) => {
                let id = match row.get(column) {
                    None | Some(Value::Null) => self.next_id.get(entity).copied().unwrap_or(1),
                    Some(value) => value.as_i64().ok_or_else(|| StoreError::TypeMismatch {
                        entity: entity.to_string(),
                        field: column.to_string(),
                        expected: ScalarType::Integer.to_string(),
                    })?,
                };
                row.insert(column.to_string(), Value::from(id));
                RowKey::single(id)
            }
            None => RowKey(
                def.primary_key
                    .columns()
                    .into_iter()
                    .filter_map(|c| row.get(c).and_then(Value::as_i64))
                    .collect(),
            ),
        };

        let table = self.tables.get(entity);
        if table.is_some_and(|t| t.contains_key(&key)) {
            return Err(StoreError::DuplicateKey {
                entity: entity.to_string(),
                key: key.to_string(),
            });
        }

        for field in def.fields.iter().filter(|f| f.unique) {
            let value = &row[&field.name];
            if value.is_null() {
                continue;
            }
            if table.is_some_and(|t| t.values().any(|r| r.get(&field.name) == Some(value))) {
                return Err(StoreError::UniqueViolation {
                    entity: entity.to_string(),
                    field: field.name.clone(),
                    value: value.to_string(),
                });
            }
        }

        for field in def.foreign_keys() {
            let Some(value) = row.get(&field.name).and_then(Value::as_i64) else {
                continue;
            };
            let Some(target) = &field.references else {
                continue;
            };
            if !self.exists(&target.entity, &RowKey::single(value)) {
                return Err(StoreError::ForeignKeyViolation {
                    entity: entity.to_string(),
                    column: field.name.clone(),
                    target: target.entity.clone(),
                    value,
                });
            }
        }

        if let Some(id) = key.as_single().filter(|_| def.primary_key.auto_column().is_some()) {
            let following = id.checked_add(1).ok_or_else(|| StoreError::KeySpaceExhausted {
                entity: entity.to_string(),
            })?;
            let next = self.next_id.entry(entity.to_string()).or_insert(1);
            *next = (*next).max(following);
        }

        debug!(entity, key = %key, "Inserted row");
        self.tables.entry(entity.to_string()).or_default().insert(key.clone(), row);
        Ok(key)
    }

    pub fn get(&self, entity: &str, key: &RowKey) -> Option<&Row> {
        self.tables.get(entity)?.get(key)
    }

    pub fn exists(&self, entity: &str, key: &RowKey) -> bool {
        self.get(entity, key).is_some()
    }

    /// Rows of `entity` in key order
    pub fn rows(&self, entity: &str) -> impl Iterator<Item = (&RowKey, &Row)> {
        self.tables.get(entity).into_iter().flat_map(|t| t.iter())
    }

    pub fn count(&self, entity: &str) -> usize {
        self.tables.get(entity).map_or(0, BTreeMap::len)
    }

    /// Delete a row and everything that goes with it
    ///
    /// Children of cascading relationships are deleted recursively and
    /// join-table rows naming a deleted row are dropped. Rows referencing it
    /// through non-cascading foreign keys are left in place.
    pub fn delete(&mut self, entity: &str, key: &RowKey) -> StoreResult<DeleteReport> {
        self.entity_def(entity)?;
        if !self.exists(entity, key) {
            return Err(StoreError::RowNotFound {
                entity: entity.to_string(),
                key: key.to_string(),
            });
        }

        let mut report = DeleteReport::default();
        let mut visited: HashSet<(String, RowKey)> = HashSet::new();
        let mut pending = vec![(entity.to_string(), key.clone())];

        while let Some((current, current_key)) = pending.pop() {
            if !visited.insert((current.clone(), current_key.clone())) {
                continue;
            }
            let removed = self.tables.get_mut(&current).and_then(|t| t.remove(&current_key));
            if removed.is_none() {
                continue;
            }
            report.removed.push((current.clone(), current_key.clone()));

            let Some(id) = current_key.as_single() else {
                continue;
            };

            for rel in self.schema.cascade_children(&current) {
                if let Some(column) = rel.foreign_key.as_deref() {
                    pending.extend(self.referencing(&rel.child, column, id));
                }
            }

            for join in self.schema.entities_of_kind(EntityKind::JoinTable) {
                for field in join.foreign_keys_to(&current) {
                    pending.extend(self.referencing(&join.name, &field.name, id));
                }
            }
        }

        debug!(entity, key = %key, removed = report.len(), "Deleted rows");
        Ok(report)
    }

    /// Every foreign-key value pointing at a missing row
    pub fn dangling_references(&self) -> Vec<DanglingRow> {
        let mut dangling = Vec::new();
        for def in self.schema.entities() {
            for (key, row) in self.rows(&def.name) {
                for field in def.foreign_keys() {
                    let (Some(value), Some(target)) =
                        (row.get(&field.name).and_then(Value::as_i64), field.references.as_ref())
                    else {
                        continue;
                    };
                    if !self.exists(&target.entity, &RowKey::single(value)) {
                        dangling.push(DanglingRow {
                            entity: def.name.clone(),
                            key: key.clone(),
                            column: field.name.clone(),
                            target: target.entity.clone(),
                            value,
                        });
                    }
                }
            }
        }
        dangling
    }

    fn entity_def(&self, entity: &str) -> StoreResult<&'a EntityDef> {
        self.schema
            .entity(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    }

    fn referencing(&self, entity: &str, column: &str, id: i64) -> Vec<(String, RowKey)> {
        self.rows(entity)
            .filter(|(_, row)| row.get(column).and_then(Value::as_i64) == Some(id))
            .map(|(key, _)| (entity.to_string(), key.clone()))
            .collect()
    }
}

fn check_type(entity: &str, field: &FieldDef, value: &Value) -> StoreResult<()> {
    let ok = match field.ty {
        ScalarType::Integer => value.as_i64().is_some(),
        ScalarType::String { max_length } => value
            .as_str()
            .is_some_and(|s| max_length.map_or(true, |n| s.chars().count() <= n as usize)),
        ScalarType::Text => value.is_string(),
        ScalarType::Boolean => value.is_boolean(),
        ScalarType::Float => value.is_number(),
        ScalarType::Timestamp => value
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::TypeMismatch {
            entity: entity.to_string(),
            field: field.name.clone(),
            expected: field.ty.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use crate::relationship::{RelationshipSpec, Via};
    use crate::schema::PrimaryKey;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    fn schema() -> Schema {
        let mut registry = SchemaRegistry::new("forum");
        registry
            .define_entity(
                EntityDef::new("Users", PrimaryKey::auto())
                    .field(FieldDef::string("email", 20).unique())
                    .field(FieldDef::new("joined", ScalarType::Timestamp).optional()),
            )
            .unwrap();
        registry
            .define_entity(
                EntityDef::new("Posts", PrimaryKey::auto())
                    .field(FieldDef::foreign_key("user_id", "Users"))
                    .field(FieldDef::text("body")),
            )
            .unwrap();
        registry
            .define_entity(
                EntityDef::new("Comments", PrimaryKey::auto())
                    .field(FieldDef::foreign_key("post_id", "Posts"))
                    .field(FieldDef::foreign_key("author_id", "Users").optional()),
            )
            .unwrap();
        registry
            .define_entity(EntityDef::new("Tags", PrimaryKey::auto()).field(FieldDef::text("label")))
            .unwrap();
        registry
            .define_entity(
                EntityDef::new("PostTags", PrimaryKey::composite(["post_id", "tag_id"]))
                    .field(FieldDef::foreign_key("post_id", "Posts"))
                    .field(FieldDef::foreign_key("tag_id", "Tags")),
            )
            .unwrap();
        registry
            .define_bidirectional(RelationshipSpec::one_to_many("Users", "Posts").back_populates("user").cascade_delete())
            .unwrap();
        registry
            .define_bidirectional(RelationshipSpec::one_to_many("Posts", "Comments").back_populates("post").cascade_delete())
            .unwrap();
        registry
            .define_bidirectional(
                RelationshipSpec::one_to_many("Users", "Comments")
                    .attribute("authored")
                    .back_populates("author")
                    .foreign_key("author_id"),
            )
            .unwrap();
        registry
            .define_bidirectional(
                RelationshipSpec::many_to_many("Posts", "Tags", Via::JoinTable("PostTags".into()))
                    .attribute("tags")
                    .back_populates("posts"),
            )
            .unwrap();
        registry.finalize().unwrap()
    }

    #[test]
    fn test_insert_assigns_keys() {
        let schema = schema();
        let mut store = InstanceStore::new(&schema);
        let a = store.insert("Users", row(json!({"email": "a@x.io"}))).unwrap();
        let b = store.insert("Users", row(json!({"email": "b@x.io"}))).unwrap();
        assert_eq!(a, RowKey::single(1));
        assert_eq!(b, RowKey::single(2));
        assert_eq!(store.get("Users", &a).unwrap()["joined"], Value::Null);

        let explicit = store.insert("Users", row(json!({"id": 10, "email": "c@x.io"}))).unwrap();
        assert_eq!(explicit, RowKey::single(10));
        assert_eq!(store.insert("Users", row(json!({"email": "d@x.io"}))).unwrap(), RowKey::single(11));
    }

    #[test]
    fn test_insert_rejections() {
        let schema = schema();
        let mut store = InstanceStore::new(&schema);
        store.insert("Users", row(json!({"email": "a@x.io"}))).unwrap();

        assert!(matches!(
            store.insert("Users", row(json!({}))),
            Err(StoreError::MissingField { field, .. }) if field == "email"
        ));
        assert!(matches!(
            store.insert("Users", row(json!({"email": "a@x.io"}))),
            Err(StoreError::UniqueViolation { .. })
        ));
        assert!(matches!(
            store.insert("Users", row(json!({"email": "a-very-long-address@example.com"}))),
            Err(StoreError::TypeMismatch { expected, .. }) if expected == "String(20)"
        ));
        assert!(matches!(
            store.insert("Users", row(json!({"email": "z@x.io", "joined": "yesterday"}))),
            Err(StoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.insert("Users", row(json!({"email": "z@x.io", "nickname": "z"}))),
            Err(StoreError::UnknownField { .. })
        ));
        assert!(matches!(
            store.insert("Posts", row(json!({"user_id": 99, "body": "hi"}))),
            Err(StoreError::ForeignKeyViolation { value: 99, .. })
        ));
        assert!(matches!(
            store.insert("Ghosts", row(json!({}))),
            Err(StoreError::UnknownEntity(_))
        ));
        assert!(store
            .insert("Users", row(json!({"email": "t@x.io", "joined": "2024-05-01T12:00:00Z"})))
            .is_ok());
    }

    #[test]
    fn test_composite_keys() {
        let schema = schema();
        let mut store = InstanceStore::new(&schema);
        store.insert("Users", row(json!({"email": "a@x.io"}))).unwrap();
        store.insert("Posts", row(json!({"user_id": 1, "body": "hi"}))).unwrap();
        store.insert("Tags", row(json!({"label": "rust"}))).unwrap();

        let key = store.insert("PostTags", row(json!({"post_id": 1, "tag_id": 1}))).unwrap();
        assert_eq!(key, RowKey(vec![1, 1]));
        assert_eq!(key.to_string(), "(1, 1)");
        assert!(matches!(
            store.insert("PostTags", row(json!({"post_id": 1, "tag_id": 1}))),
            Err(StoreError::DuplicateKey { .. })
        ));
        assert!(matches!(
            store.insert("PostTags", row(json!({"post_id": 1, "tag_id": null}))),
            Err(StoreError::NullKeyComponent { column, .. }) if column == "tag_id"
        ));
    }

    #[test]
    fn test_cascade_delete_is_recursive() {
        let schema = schema();
        let mut store = InstanceStore::new(&schema);
        let user = store.insert("Users", row(json!({"email": "a@x.io"}))).unwrap();
        let other = store.insert("Users", row(json!({"email": "b@x.io"}))).unwrap();
        store.insert("Posts", row(json!({"user_id": 1, "body": "one"}))).unwrap();
        store.insert("Posts", row(json!({"user_id": 1, "body": "two"}))).unwrap();
        store.insert("Posts", row(json!({"user_id": 2, "body": "three"}))).unwrap();
        store.insert("Comments", row(json!({"post_id": 1, "author_id": 2}))).unwrap();
        store.insert("Comments", row(json!({"post_id": 3, "author_id": 1}))).unwrap();
        store.insert("Tags", row(json!({"label": "rust"}))).unwrap();
        store.insert("PostTags", row(json!({"post_id": 2, "tag_id": 1}))).unwrap();
        store.insert("PostTags", row(json!({"post_id": 3, "tag_id": 1}))).unwrap();

        let report = store.delete("Users", &user).unwrap();
        assert_eq!(report.removed_from("Users"), 1);
        assert_eq!(report.removed_from("Posts"), 2);
        assert_eq!(report.removed_from("Comments"), 1);
        assert_eq!(report.removed_from("PostTags"), 1);
        assert!(report.contains("Posts", &RowKey::single(2)));

        assert_eq!(store.count("Posts"), 1);
        assert_eq!(store.count("PostTags"), 1);
        assert_eq!(store.count("Tags"), 1);
        assert!(store.exists("Users", &other));

        // authored comments do not cascade
        let dangling = store.dangling_references();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].column, "author_id");
        assert_eq!(dangling[0].value, 1);
    }

    #[test]
    fn test_largest_explicit_key_is_rejected() {
        let schema = schema();
        let mut store = InstanceStore::new(&schema);

        let err = store
            .insert("Users", row(json!({"id": i64::MAX, "email": "max@x.io"})))
            .unwrap_err();
        assert_eq!(err, StoreError::KeySpaceExhausted { entity: "Users".into() });
        assert_eq!(store.count("Users"), 0);

        let last = store.insert("Users", row(json!({"id": i64::MAX - 1, "email": "max@x.io"}))).unwrap();
        assert_eq!(last, RowKey::single(i64::MAX - 1));
        assert!(matches!(
            store.insert("Users", row(json!({"email": "next@x.io"}))),
            Err(StoreError::KeySpaceExhausted { .. })
        ));
        assert_eq!(store.count("Users"), 1);
    }

    #[test]
    fn test_delete_missing_row() {
        let schema = schema();
        let mut store = InstanceStore::new(&schema);
        assert!(matches!(
            store.delete("Users", &RowKey::single(1)),
            Err(StoreError::RowNotFound { .. })
        ));
    }
}
