//! Schema Registry
//!
//! Collects entity and relationship declarations for one schema namespace and
//! seals them into an immutable [`Schema`] snapshot.
//!
//! ```text
//! Open ──define_entity / define_relationship──▶ Open
//! Open ──finalize (ok)──▶ Finalized   (terminal, read-only)
//! Open ──finalize (violations)──▶ Open
//! ```

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::ValidationConfig;
use crate::error::{Result, SchemaError};
use crate::naming::{is_valid_identifier, suggest};
use crate::relationship::{Multiplicity, RelationshipSpec};
use crate::render::{self, DiagramRenderer};
use crate::schema::EntityDef;
use crate::snapshot::Schema;
use crate::validate::{check_entity, check_via, validate_namespace};

/// Lifecycle state of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Accepting declarations
    Open,
    /// Validated and sealed
    Finalized,
}

/// Builder for one schema namespace
///
/// Not meant to be shared while open; the finalized [`Schema`] is.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    name: String,
    entities: Vec<EntityDef>,
    index: HashMap<String, usize>,
    sides: Vec<RelationshipSpec>,
    validation: ValidationConfig,
    snapshot: Option<Schema>,
}

impl SchemaRegistry {
    /// Create an empty registry with default validation settings
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_validation(name, ValidationConfig::default())
    }

    pub fn with_validation(name: impl Into<String>, validation: ValidationConfig) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            index: HashMap::new(),
            sides: Vec::new(),
            validation,
            snapshot: None,
        }
    }

    /// Settings used by the next finalize
    pub fn set_validation(&mut self, validation: ValidationConfig) {
        self.validation = validation;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RegistryState {
        if self.snapshot.is_some() {
            RegistryState::Finalized
        } else {
            RegistryState::Open
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state() == RegistryState::Finalized
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    /// Relationship sides declared so far
    pub fn relationship_sides(&self) -> &[RelationshipSpec] {
        &self.sides
    }

    /// The sealed snapshot, once finalized
    pub fn snapshot(&self) -> Option<&Schema> {
        self.snapshot.as_ref()
    }

    /// Register a new entity kind
    pub fn define_entity(&mut self, entity: EntityDef) -> Result<()> {
        self.ensure_open("define an entity")?;

        if self.index.contains_key(&entity.name) {
            return Err(SchemaError::DuplicateEntity { name: entity.name });
        }
        check_entity(&entity)?;

        debug!(
            registry = %self.name,
            entity = %entity.name,
            table = %entity.table_name,
            fields = entity.fields.len(),
            composite = entity.primary_key.is_composite(),
            "defined entity"
        );
        self.index.insert(entity.name.clone(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    /// Register one side of a relationship
    ///
    /// Both endpoints and any `via` entity must already be defined.
    pub fn define_relationship(&mut self, spec: RelationshipSpec) -> Result<()> {
        self.ensure_open("define a relationship")?;

        let origin = spec.qualified_name();
        for endpoint in [&spec.from, &spec.to] {
            self.require_entity(&origin, endpoint)?;
        }
        if !is_valid_identifier(&spec.attribute) {
            return Err(SchemaError::InvalidIdentifier {
                kind: "attribute",
                name: spec.attribute.clone(),
            });
        }

        if self
            .sides
            .iter()
            .any(|s| s.from == spec.from && s.attribute == spec.attribute)
        {
            return Err(SchemaError::DuplicateRelationship {
                entity: spec.from.clone(),
                attribute: spec.attribute.clone(),
            });
        }

        match (&spec.via, spec.multiplicity) {
            (Some(via), Multiplicity::ManyToMany) => {
                let via_def = self.require_entity(&origin, via.entity())?;
                check_via(&spec, via, via_def)?;
            }
            (None, Multiplicity::ManyToMany) => {
                return Err(SchemaError::InvalidVia {
                    entity: spec.from.clone(),
                    attribute: spec.attribute.clone(),
                    reason: "many-to-many needs a join table or association entity".to_string(),
                });
            }
            (Some(via), other) => {
                return Err(SchemaError::InvalidVia {
                    entity: spec.from.clone(),
                    attribute: spec.attribute.clone(),
                    reason: format!("{} is {}, only many-to-many goes through {}", origin, other, via),
                });
            }
            (None, _) => {}
        }

        debug!(
            registry = %self.name,
            side = %origin,
            to = %spec.to,
            multiplicity = %spec.multiplicity,
            cascade = spec.cascade_delete,
            "defined relationship"
        );
        self.sides.push(spec);
        Ok(())
    }

    /// Register a side and its inverse in one call (requires `back_populates`)
    pub fn define_bidirectional(&mut self, spec: RelationshipSpec) -> Result<()> {
        let inverse = spec.inverse().ok_or_else(|| SchemaError::InvalidVia {
            entity: spec.from.clone(),
            attribute: spec.attribute.clone(),
            reason: "bidirectional declaration needs a back_populates name".to_string(),
        })?;
        self.define_relationship(spec)?;
        self.define_relationship(inverse)
    }

    /// Validate the namespace and seal it
    ///
    /// Collects every violation. On failure the registry stays open so the
    /// declarations can be fixed; on success later calls return the same
    /// snapshot.
    pub fn finalize(&mut self) -> Result<Schema> {
        if let Some(schema) = &self.snapshot {
            return Ok(schema.clone());
        }

        let validated = validate_namespace(&self.entities, &self.sides, &self.validation);
        let (errors, notices) = validated.violations.partition();
        if !errors.is_empty() {
            warn!(
                registry = %self.name,
                errors = errors.len(),
                "schema finalize rejected"
            );
            return Err(SchemaError::SchemaInconsistency(errors));
        }

        for notice in &notices {
            debug!(registry = %self.name, "{}", notice);
        }

        let schema = Schema::new(
            self.name.clone(),
            self.entities.clone(),
            validated.relationships,
            validated.creation_order,
            notices,
        );
        let checksum = schema.checksum();
        info!(
            registry = %self.name,
            entities = schema.entity_count(),
            relationships = schema.relationships().len(),
            checksum = %checksum.short(),
            "schema finalized"
        );
        self.snapshot = Some(schema.clone());
        Ok(schema)
    }

    /// Render the finalized schema, picking the renderer from the path extension
    pub fn export_diagram(&self, output: impl AsRef<Path>) -> Result<()> {
        let schema = self.require_snapshot("export a diagram")?;
        render::export_diagram(schema, output.as_ref())
    }

    /// Render the finalized schema with a specific renderer
    pub fn export_diagram_with(&self, renderer: &dyn DiagramRenderer, output: impl AsRef<Path>) -> Result<()> {
        let schema = self.require_snapshot("export a diagram")?;
        renderer.render(schema, output.as_ref())
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.is_finalized() {
            return Err(SchemaError::RegistrySealed {
                registry: self.name.clone(),
                operation,
            });
        }
        Ok(())
    }

    fn require_snapshot(&self, operation: &'static str) -> Result<&Schema> {
        self.snapshot.as_ref().ok_or_else(|| SchemaError::NotFinalized {
            registry: self.name.clone(),
            operation,
        })
    }

    fn require_entity(&self, origin: &str, name: &str) -> Result<&EntityDef> {
        self.entity(name).ok_or_else(|| SchemaError::DanglingReference {
            from: origin.to_string(),
            target: name.to_string(),
            suggestion: suggest(name, self.entities.iter().map(|e| e.name.as_str())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ViolationCode;
    use crate::relationship::Via;
    use crate::schema::{FieldDef, PrimaryKey};

    fn users() -> EntityDef {
        EntityDef::new("Users", PrimaryKey::auto())
            .field(FieldDef::string("email", 120))
            .field(FieldDef::string("password", 250))
    }

    fn planets() -> EntityDef {
        EntityDef::new("Planets", PrimaryKey::auto()).field(FieldDef::string("name", 120))
    }

    #[test]
    fn test_new_registry_is_open() {
        let registry = SchemaRegistry::new("empty");
        assert_eq!(registry.state(), RegistryState::Open);
        assert!(registry.snapshot().is_none());
    }

    #[test]
    fn test_duplicate_entity() {
        let mut registry = SchemaRegistry::new("favorites");
        registry.define_entity(users()).unwrap();

        let err = registry.define_entity(users()).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEntity { ref name } if name == "Users"));
        assert_eq!(registry.entities().len(), 1);
    }

    #[test]
    fn test_dangling_reference_names_target() {
        let mut registry = SchemaRegistry::new("favorites");
        registry.define_entity(users()).unwrap();

        let err = registry
            .define_relationship(RelationshipSpec::one_to_many("Users", "Ghosts"))
            .unwrap_err();
        match err {
            SchemaError::DanglingReference { target, suggestion, .. } => {
                assert_eq!(target, "Ghosts");
                assert_eq!(suggestion, None);
            }
            other => panic!("expected DanglingReference, got {:?}", other),
        }
        assert!(registry.relationship_sides().is_empty());
    }

    #[test]
    fn test_many_to_many_requires_via() {
        let mut registry = SchemaRegistry::new("favorites");
        registry.define_entity(users()).unwrap();
        registry.define_entity(planets()).unwrap();

        let err = registry
            .define_relationship(RelationshipSpec::new("Users", "Planets", Multiplicity::ManyToMany))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidVia { .. }));

        let err = registry
            .define_relationship(
                RelationshipSpec::one_to_many("Users", "Planets").via(Via::JoinTable("Users".into())),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidVia { .. }));
    }

    #[test]
    fn test_duplicate_attribute() {
        let mut registry = SchemaRegistry::new("favorites");
        registry.define_entity(users()).unwrap();
        registry
            .define_entity(EntityDef::new("Posts", PrimaryKey::auto()).field(FieldDef::foreign_key("user_id", "Users")))
            .unwrap();

        registry
            .define_relationship(RelationshipSpec::one_to_many("Users", "Posts").attribute("posts"))
            .unwrap();
        let err = registry
            .define_relationship(RelationshipSpec::one_to_many("Users", "Posts").attribute("posts"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateRelationship { .. }));
    }

    #[test]
    fn test_sealed_after_finalize() {
        let mut registry = SchemaRegistry::new("favorites");
        registry.define_entity(users()).unwrap();
        registry.finalize().unwrap();

        assert!(registry.is_finalized());
        let err = registry.define_entity(planets()).unwrap_err();
        assert!(matches!(err, SchemaError::RegistrySealed { .. }));
        let err = registry
            .define_relationship(RelationshipSpec::one_to_one("Users", "Users"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::RegistrySealed { .. }));
    }

    #[test]
    fn test_failed_finalize_stays_open() {
        let mut registry = SchemaRegistry::new("favorites");
        registry.define_entity(users()).unwrap();
        registry
            .define_entity(EntityDef::new("Posts", PrimaryKey::auto()).field(FieldDef::foreign_key("user_id", "Users")))
            .unwrap();
        registry
            .define_relationship(RelationshipSpec::one_to_many("Users", "Posts").back_populates("user"))
            .unwrap();

        let err = registry.finalize().unwrap_err();
        match err {
            SchemaError::SchemaInconsistency(violations) => {
                assert!(violations.contains(ViolationCode::MissingBackReference));
            }
            other => panic!("expected SchemaInconsistency, got {:?}", other),
        }
        assert_eq!(registry.state(), RegistryState::Open);

        registry
            .define_relationship(RelationshipSpec::many_to_one("Posts", "Users").attribute("user").back_populates("posts"))
            .unwrap();
        assert!(registry.finalize().is_ok());
    }

    #[test]
    fn test_export_requires_finalize() {
        let mut registry = SchemaRegistry::new("favorites");
        registry.define_entity(users()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let err = registry.export_diagram(dir.path().join("users.dot")).unwrap_err();
        assert!(matches!(err, SchemaError::NotFinalized { .. }));

        registry.finalize().unwrap();
        registry.export_diagram(dir.path().join("users.dot")).unwrap();
        assert!(dir.path().join("users.dot").exists());
    }
}
