//! Relationship declarations and finalized relationship edges
//!
//! A relationship is declared once per participating entity (a *side*): the
//! attribute on `from` that dereferences `to`, plus the name of the attribute
//! on `to` that points back. At finalize the two sides are checked against
//! each other and merged into a single [`Relationship`] owned by the schema.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::naming::to_snake_case;

/// Cardinality seen from the declaring entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Multiplicity {
    /// Cardinality seen from the other end
    pub fn inverse(&self) -> Self {
        match self {
            Multiplicity::OneToOne => Multiplicity::OneToOne,
            Multiplicity::OneToMany => Multiplicity::ManyToOne,
            Multiplicity::ManyToOne => Multiplicity::OneToMany,
            Multiplicity::ManyToMany => Multiplicity::ManyToMany,
        }
    }

    /// True if the declaring side dereferences to a collection
    pub fn is_collection(&self) -> bool {
        matches!(self, Multiplicity::OneToMany | Multiplicity::ManyToMany)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Multiplicity::OneToOne => "1:1",
            Multiplicity::OneToMany => "1:N",
            Multiplicity::ManyToOne => "N:1",
            Multiplicity::ManyToMany => "N:M",
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Multiplicity::OneToOne => write!(f, "one-to-one"),
            Multiplicity::OneToMany => write!(f, "one-to-many"),
            Multiplicity::ManyToOne => write!(f, "many-to-one"),
            Multiplicity::ManyToMany => write!(f, "many-to-many"),
        }
    }
}

/// Realization strategy of a many-to-many relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "entity")]
pub enum Via {
    /// Relation of foreign keys only; membership is a pure existence fact
    JoinTable(String),
    /// First-class entity keyed by the linked foreign keys, with attributes
    AssociationEntity(String),
}

impl Via {
    pub fn entity(&self) -> &str {
        match self {
            Via::JoinTable(name) | Via::AssociationEntity(name) => name,
        }
    }

    pub fn is_join_table(&self) -> bool {
        matches!(self, Via::JoinTable(_))
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Via::JoinTable(name) => write!(f, "join table {}", name),
            Via::AssociationEntity(name) => write!(f, "association {}", name),
        }
    }
}

/// One entity's declaration of a relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub from: String,
    pub to: String,
    /// Attribute on `from` that dereferences `to`
    pub attribute: String,
    pub multiplicity: Multiplicity,
    /// Delete dependent `to` rows together with their `from` row
    #[serde(default)]
    pub cascade_delete: bool,
    /// Required for many-to-many, forbidden otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<Via>,
    /// Attribute on `to` that points back at `from`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_populates: Option<String>,
    /// Foreign-key column on the child realizing the relationship
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
}

impl RelationshipSpec {
    /// New side; the attribute defaults to the snake_case target name
    pub fn new(from: impl Into<String>, to: impl Into<String>, multiplicity: Multiplicity) -> Self {
        let to = to.into();
        Self {
            from: from.into(),
            attribute: to_snake_case(&to),
            to,
            multiplicity,
            cascade_delete: false,
            via: None,
            back_populates: None,
            foreign_key: None,
        }
    }

    pub fn one_to_one(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, Multiplicity::OneToOne)
    }

    pub fn one_to_many(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, Multiplicity::OneToMany)
    }

    pub fn many_to_one(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, Multiplicity::ManyToOne)
    }

    pub fn many_to_many(from: impl Into<String>, to: impl Into<String>, via: Via) -> Self {
        Self::new(from, to, Multiplicity::ManyToMany).via(via)
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = name.into();
        self
    }

    pub fn back_populates(mut self, name: impl Into<String>) -> Self {
        self.back_populates = Some(name.into());
        self
    }

    pub fn cascade_delete(mut self) -> Self {
        self.cascade_delete = true;
        self
    }

    pub fn via(mut self, via: Via) -> Self {
        self.via = Some(via);
        self
    }

    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    /// The matching side on `to`, if a back-reference name was given
    pub fn inverse(&self) -> Option<RelationshipSpec> {
        let back = self.back_populates.clone()?;
        Some(RelationshipSpec {
            from: self.to.clone(),
            to: self.from.clone(),
            attribute: back,
            multiplicity: self.multiplicity.inverse(),
            cascade_delete: false,
            via: self.via.clone(),
            back_populates: Some(self.attribute.clone()),
            foreign_key: self.foreign_key.clone(),
        })
    }

    /// `Entity.attribute`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.from, self.attribute)
    }
}

/// A finalized relationship edge, consulted from either entity
///
/// Always normalized so that `parent` is the "one" side: one-to-many edges
/// never appear as many-to-one. For many-to-many the first declared side is
/// the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub parent: String,
    pub child: String,
    /// One of OneToOne, OneToMany, ManyToMany
    pub multiplicity: Multiplicity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<Via>,
    /// Column on `child` holding the parent's key (not set for many-to-many)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    pub cascade_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_attribute: Option<String>,
}

impl Relationship {
    pub fn involves(&self, entity: &str) -> bool {
        self.parent == entity || self.child == entity
    }

    /// The entity at the opposite end from `entity`
    pub fn other_end(&self, entity: &str) -> Option<&str> {
        if self.parent == entity {
            Some(&self.child)
        } else if self.child == entity {
            Some(&self.parent)
        } else {
            None
        }
    }

    /// Attribute through which `entity` dereferences the other end
    pub fn attribute_on(&self, entity: &str) -> Option<&str> {
        if self.parent == entity {
            self.parent_attribute.as_deref()
        } else if self.child == entity {
            self.child_attribute.as_deref()
        } else {
            None
        }
    }

    /// Cardinality seen from `entity`
    pub fn multiplicity_from(&self, entity: &str) -> Option<Multiplicity> {
        if self.parent == entity {
            Some(self.multiplicity)
        } else if self.child == entity {
            Some(self.multiplicity.inverse())
        } else {
            None
        }
    }

    /// True if both sides were declared
    pub fn is_bidirectional(&self) -> bool {
        self.parent_attribute.is_some() && self.child_attribute.is_some()
    }

    /// Short edge label: "1:N", "N:M via association_table", ...
    pub fn label(&self) -> String {
        match &self.via {
            Some(via) => format!("{} via {}", self.multiplicity.label(), via.entity()),
            None => self.multiplicity.label().to_string(),
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} <-> {}.{} ({})",
            self.parent,
            self.parent_attribute.as_deref().unwrap_or("-"),
            self.child,
            self.child_attribute.as_deref().unwrap_or("-"),
            self.multiplicity
        )?;
        if let Some(via) = &self.via {
            write!(f, " through {}", via)?;
        }
        if self.cascade_delete {
            write!(f, " [cascade]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_side() {
        let side = RelationshipSpec::one_to_many("User", "Address")
            .attribute("addresses")
            .back_populates("user")
            .cascade_delete();

        let inverse = side.inverse().unwrap();
        assert_eq!(inverse.from, "Address");
        assert_eq!(inverse.to, "User");
        assert_eq!(inverse.attribute, "user");
        assert_eq!(inverse.back_populates.as_deref(), Some("addresses"));
        assert_eq!(inverse.multiplicity, Multiplicity::ManyToOne);
        assert!(!inverse.cascade_delete);
    }

    #[test]
    fn test_inverse_requires_back_reference() {
        let side = RelationshipSpec::one_to_many("Users", "Posts");
        assert_eq!(side.attribute, "posts");
        assert!(side.inverse().is_none());
    }

    #[test]
    fn test_edge_lookup_from_either_end() {
        let edge = Relationship {
            parent: "Users".into(),
            child: "Posts".into(),
            multiplicity: Multiplicity::OneToMany,
            via: None,
            foreign_key: Some("user_id".into()),
            cascade_delete: true,
            parent_attribute: Some("posts".into()),
            child_attribute: Some("user".into()),
        };

        assert_eq!(edge.other_end("Posts"), Some("Users"));
        assert_eq!(edge.attribute_on("Users"), Some("posts"));
        assert_eq!(edge.multiplicity_from("Posts"), Some(Multiplicity::ManyToOne));
        assert_eq!(edge.multiplicity_from("Planets"), None);
        assert_eq!(edge.label(), "1:N");
        assert!(edge.to_string().ends_with("[cascade]"));
    }
}
