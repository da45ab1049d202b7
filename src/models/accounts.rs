//! `accounts`: a user owns a list of addresses that are deleted with it

use crate::error::Result;
use crate::registry::SchemaRegistry;
use crate::relationship::RelationshipSpec;
use crate::schema::{EntityDef, FieldDef, PrimaryKey, ScalarType};

pub const NAME: &str = "accounts";

pub fn registry() -> Result<SchemaRegistry> {
    let mut registry = SchemaRegistry::new(NAME);

    registry.define_entity(
        EntityDef::new("User", PrimaryKey::auto())
            .table("user_account")
            .field(FieldDef::string("name", 30))
            .field(FieldDef::new("fullname", ScalarType::String { max_length: None }).optional()),
    )?;

    registry.define_entity(
        EntityDef::new("Address", PrimaryKey::auto())
            .field(FieldDef::new("email_address", ScalarType::String { max_length: None }))
            .field(FieldDef::foreign_key("user_id", "User")),
    )?;

    registry.define_bidirectional(
        RelationshipSpec::one_to_many("User", "Address")
            .attribute("addresses")
            .back_populates("user")
            .cascade_delete(),
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::Multiplicity;

    #[test]
    fn test_accounts_schema() {
        let schema = registry().unwrap().finalize().unwrap();
        assert_eq!(schema.entity("User").unwrap().table_name, "user_account");
        assert_eq!(schema.entity("Address").unwrap().table_name, "address");

        let rel = schema.relationship_by_attribute("Address", "user").unwrap();
        assert_eq!(rel.parent, "User");
        assert_eq!(rel.multiplicity, Multiplicity::OneToMany);
        assert_eq!(rel.foreign_key.as_deref(), Some("user_id"));
        assert!(rel.cascade_delete);
        assert_eq!(schema.creation_order(), ["User", "Address"]);
    }
}
