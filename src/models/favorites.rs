//! `favorites`: users with a profile, posts and favourite planets, people
//! and movies
//!
//! Favourites are kept in `association_table`, a plain join table keyed by
//! all four ids. Planets, people and movies are also linked to each other
//! through `AssociationClass`, a three-way association entity that carries
//! free-text notes about the link.

use crate::error::Result;
use crate::registry::SchemaRegistry;
use crate::relationship::{RelationshipSpec, Via};
use crate::schema::{EntityDef, FieldDef, PrimaryKey};

pub const NAME: &str = "favorites";

const JOIN_TABLE: &str = "association_table";
const ASSOCIATION: &str = "AssociationClass";

pub fn registry() -> Result<SchemaRegistry> {
    let mut registry = SchemaRegistry::new(NAME);

    registry.define_entity(
        EntityDef::new("Users", PrimaryKey::auto())
            .field(FieldDef::string("email", 120))
            .field(FieldDef::string("password", 250)),
    )?;

    registry.define_entity(
        EntityDef::new("Profiles", PrimaryKey::auto())
            .field(FieldDef::string("fullname", 120))
            .field(FieldDef::foreign_key("user_id", "Users").unique()),
    )?;

    registry.define_entity(
        EntityDef::new("Posts", PrimaryKey::auto())
            .field(FieldDef::string("text", 120))
            .field(FieldDef::string("image_url", 120))
            .field(FieldDef::foreign_key("user_id", "Users")),
    )?;

    for catalog in ["Planets", "People", "Movies"] {
        registry.define_entity(EntityDef::new(catalog, PrimaryKey::auto()).field(FieldDef::string("name", 120)))?;
    }

    registry.define_entity(
        EntityDef::new(JOIN_TABLE, PrimaryKey::composite(["user_id", "planet_id", "movies_id", "people_id"]))
            .field(FieldDef::foreign_key("user_id", "Users"))
            .field(FieldDef::foreign_key("planet_id", "Planets"))
            .field(FieldDef::foreign_key("movies_id", "Movies"))
            .field(FieldDef::foreign_key("people_id", "People")),
    )?;

    registry.define_entity(
        EntityDef::new(ASSOCIATION, PrimaryKey::composite(["planet_id", "people_id", "movies_id"]))
            .field(FieldDef::foreign_key("planet_id", "Planets"))
            .field(FieldDef::foreign_key("people_id", "People"))
            .field(FieldDef::foreign_key("movies_id", "Movies"))
            .field(FieldDef::string("notas", 250).optional()),
    )?;

    registry.define_bidirectional(RelationshipSpec::one_to_one("Users", "Profiles").attribute("profile").back_populates("user"))?;

    registry.define_bidirectional(
        RelationshipSpec::one_to_many("Users", "Posts")
            .attribute("posts")
            .back_populates("user")
            .cascade_delete(),
    )?;

    for (attribute, catalog) in [("fav_planets", "Planets"), ("fav_people", "People"), ("fav_movies", "Movies")] {
        registry.define_bidirectional(
            RelationshipSpec::many_to_many("Users", catalog, Via::JoinTable(JOIN_TABLE.to_string()))
                .attribute(attribute)
                .back_populates("users"),
        )?;
    }

    for (from, to, attribute, back) in [
        ("Planets", "People", "people", "planets"),
        ("Planets", "Movies", "movies", "planets"),
        ("People", "Movies", "movies", "people"),
    ] {
        registry.define_bidirectional(
            RelationshipSpec::many_to_many(from, to, Via::AssociationEntity(ASSOCIATION.to_string()))
                .attribute(attribute)
                .back_populates(back),
        )?;
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::Multiplicity;
    use crate::schema::EntityKind;

    #[test]
    fn test_entity_kinds() {
        let schema = registry().unwrap().finalize().unwrap();
        assert_eq!(schema.entity_count(), 8);
        assert_eq!(schema.entity_kind("Users"), Some(EntityKind::Regular));
        assert_eq!(schema.entity_kind(JOIN_TABLE), Some(EntityKind::JoinTable));
        assert_eq!(schema.entity_kind(ASSOCIATION), Some(EntityKind::Association));
    }

    #[test]
    fn test_profile_is_one_to_one() {
        let schema = registry().unwrap().finalize().unwrap();
        let rel = schema.relationship_by_attribute("Users", "profile").unwrap();
        assert_eq!(rel.multiplicity, Multiplicity::OneToOne);
        assert_eq!(rel.child, "Profiles");
        assert_eq!(rel.foreign_key.as_deref(), Some("user_id"));
        assert!(!rel.cascade_delete);
        assert_eq!(rel.attribute_on("Profiles"), Some("user"));
    }

    #[test]
    fn test_favourites_share_one_join_table() {
        let schema = registry().unwrap().finalize().unwrap();
        let via_join: Vec<_> = schema
            .relationships()
            .iter()
            .filter(|r| r.via.as_ref().is_some_and(|v| v.entity() == JOIN_TABLE))
            .collect();
        assert_eq!(via_join.len(), 3);
        assert!(via_join.iter().all(|r| r.parent == "Users"));
        assert_eq!(schema.relationship_by_attribute("Planets", "users").unwrap().child, "Planets");
    }
}
