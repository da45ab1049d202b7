//! Table creation statements for a finalized schema
//!
//! Tables come out in foreign-key creation order so that every referenced
//! table exists before the tables pointing at it.

use crate::schema::{EntityDef, EntityKind, FieldDef};
use crate::snapshot::Schema;

/// One `CREATE TABLE` statement per entity, referenced tables first
pub fn create_table_statements(schema: &Schema) -> Vec<String> {
    schema
        .creation_order()
        .iter()
        .filter_map(|name| schema.entity(name))
        .map(|entity| create_table(schema, entity))
        .collect()
}

/// All statements joined into a single script
pub fn create_tables_script(schema: &Schema) -> String {
    let mut script = format!("-- schema {} ({})\n\n", schema.name(), schema.checksum().short());
    for statement in create_table_statements(schema) {
        script.push_str(&statement);
        script.push_str("\n\n");
    }
    script
}

fn create_table(schema: &Schema, entity: &EntityDef) -> String {
    let mut lines = Vec::new();

    if let Some(column) = entity.primary_key.auto_column() {
        lines.push(format!("    {} INTEGER PRIMARY KEY", column));
    }
    for field in &entity.fields {
        lines.push(format!("    {}", column_definition(schema, entity, field)));
    }
    if entity.primary_key.is_composite() {
        lines.push(format!("    PRIMARY KEY ({})", entity.primary_key.columns().join(", ")));
    }

    format!("CREATE TABLE {} (\n{}\n);", entity.table_name, lines.join(",\n"))
}

fn column_definition(schema: &Schema, entity: &EntityDef, field: &FieldDef) -> String {
    let mut def = format!("{} {}", field.name, field.ty.sql_type());
    if !field.nullable {
        def.push_str(" NOT NULL");
    }
    if field.unique {
        def.push_str(" UNIQUE");
    }

    if let Some(target) = field.references.as_ref().and_then(|r| {
        let table = schema.entity(&r.entity)?;
        let column = r
            .column
            .as_deref()
            .or_else(|| table.primary_key.auto_column())?;
        Some((table.table_name.as_str(), column))
    }) {
        def.push_str(&format!(" REFERENCES {}({})", target.0, target.1));
        if cascades(schema, entity, field) {
            def.push_str(" ON DELETE CASCADE");
        }
    }
    def
}

/// Join-table membership always follows its endpoints; other foreign keys
/// cascade only when their relationship says so
fn cascades(schema: &Schema, entity: &EntityDef, field: &FieldDef) -> bool {
    if schema.entity_kind(&entity.name) == Some(EntityKind::JoinTable) {
        return true;
    }
    schema
        .relationships()
        .iter()
        .any(|r| r.child == entity.name && r.foreign_key.as_deref() == Some(field.name.as_str()) && r.cascade_delete)
}
