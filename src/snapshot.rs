//! Finalized schema snapshot
//!
//! The only thing consumers (diagram renderers, table creation, the instance
//! store) ever see. Immutable once built; clone freely or share across threads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::checksum::Checksum;
use crate::diagnostics::Violations;
use crate::relationship::{Multiplicity, Relationship, Via};
use crate::schema::{EntityDef, EntityKind};

/// A validated, sealed schema namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    /// Declaration order
    entities: Vec<EntityDef>,
    relationships: Vec<Relationship>,
    kinds: BTreeMap<String, EntityKind>,
    creation_order: Vec<String>,
    /// Non-fatal findings from finalize
    #[serde(default)]
    warnings: Violations,
}

/// An association entity and the entities its key links
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationInfo<'a> {
    pub entity: &'a str,
    /// Number of foreign-key columns in the composite key
    pub arity: usize,
    pub participants: Vec<&'a str>,
    /// Non-key columns describing the link
    pub attributes: Vec<&'a str>,
}

impl Schema {
    pub(crate) fn new(
        name: String,
        entities: Vec<EntityDef>,
        relationships: Vec<Relationship>,
        creation_order: Vec<String>,
        warnings: Violations,
    ) -> Self {
        let kinds = entities
            .iter()
            .map(|e| (e.name.clone(), classify(e, &relationships)))
            .collect();
        Self {
            name,
            entities,
            relationships,
            kinds,
            creation_order,
            warnings,
        }
    }

    /// Registry name this snapshot came from
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        self.kinds.get(name).copied()
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Every relationship edge `entity` takes part in, from either end
    pub fn relationships_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| r.involves(entity))
    }

    /// Edges directly connecting `a` and `b`, in either direction
    pub fn relationships_between<'a>(&'a self, a: &'a str, b: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships
            .iter()
            .filter(move |r| (r.parent == a && r.child == b) || (r.parent == b && r.child == a))
    }

    /// The relationship reached through `entity.attribute`
    pub fn relationship_by_attribute(&self, entity: &str, attribute: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.attribute_on(entity) == Some(attribute))
    }

    /// Relationships whose children are deleted with a row of `parent`
    pub fn cascade_children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| {
            r.parent == parent && r.cascade_delete && r.multiplicity != Multiplicity::ManyToMany
        })
    }

    pub fn association_entities(&self) -> Vec<AssociationInfo<'_>> {
        self.entities_of_kind(EntityKind::Association)
            .map(|e| {
                let participants: Vec<&str> = e
                    .primary_key
                    .columns()
                    .into_iter()
                    .filter_map(|c| e.get_field(c))
                    .filter_map(|f| f.references.as_ref().map(|r| r.entity.as_str()))
                    .collect();
                AssociationInfo {
                    entity: &e.name,
                    arity: participants.len(),
                    participants,
                    attributes: e.attribute_fields().into_iter().map(|f| f.name.as_str()).collect(),
                }
            })
            .collect()
    }

    pub fn association(&self, name: &str) -> Option<AssociationInfo<'_>> {
        self.association_entities().into_iter().find(|a| a.entity == name)
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityDef> + '_ {
        self.entities
            .iter()
            .filter(move |e| self.kinds.get(&e.name) == Some(&kind))
    }

    /// Referenced entities first; declaration order when foreign keys are cyclic
    pub fn creation_order(&self) -> &[String] {
        &self.creation_order
    }

    /// Warnings and notices found during finalize
    pub fn warnings(&self) -> &Violations {
        &self.warnings
    }

    /// SHA-256 of the canonical JSON form; equal snapshots hash equal
    pub fn checksum(&self) -> Checksum {
        // plain data with string keys only
        Checksum::of(self).unwrap_or_else(|_| Checksum::from_bytes(b""))
    }
}

fn classify(entity: &EntityDef, relationships: &[Relationship]) -> EntityKind {
    if !entity.primary_key.is_composite() {
        return EntityKind::Regular;
    }
    let mut via_kinds = relationships
        .iter()
        .filter_map(|r| r.via.as_ref())
        .filter(|v| v.entity() == entity.name);

    match via_kinds.next() {
        Some(Via::AssociationEntity(_)) => EntityKind::Association,
        Some(Via::JoinTable(_)) => EntityKind::JoinTable,
        None if entity.attribute_fields().is_empty() => EntityKind::JoinTable,
        None => EntityKind::Association,
    }
}
