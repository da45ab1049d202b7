//! Row lifecycle against the built-in models

use erd_registry::store::Row;
use erd_registry::{models, InstanceStore, RowKey, Schema, StoreError};
use serde_json::{json, Value};

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => panic!("row must be an object"),
    }
}

fn favorites() -> Schema {
    models::favorites::registry().unwrap().finalize().unwrap()
}

#[test]
fn cascade_leaves_no_dangling_children() {
    let schema = models::accounts::registry().unwrap().finalize().unwrap();
    let mut store = InstanceStore::new(&schema);

    let ann = store.insert("User", row(json!({"name": "ann"}))).unwrap();
    let bob = store.insert("User", row(json!({"name": "bob", "fullname": "Bob Ross"}))).unwrap();
    for (email, owner) in [("a@x.io", 1), ("a2@x.io", 1), ("b@x.io", 2)] {
        store
            .insert("Address", row(json!({"email_address": email, "user_id": owner})))
            .unwrap();
    }

    let report = store.delete("User", &ann).unwrap();
    assert_eq!(report.removed_from("Address"), 2);
    assert_eq!(store.count("Address"), 1);
    assert!(store
        .rows("Address")
        .all(|(_, r)| r["user_id"] == json!(bob.as_single().unwrap())));
    assert!(store.dangling_references().is_empty());
}

#[test]
fn children_need_an_existing_parent() {
    let schema = models::accounts::registry().unwrap().finalize().unwrap();
    let mut store = InstanceStore::new(&schema);

    let err = store
        .insert("Address", row(json!({"email_address": "x@y.z", "user_id": 7})))
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::ForeignKeyViolation {
            entity: "Address".into(),
            column: "user_id".into(),
            target: "User".into(),
            value: 7,
        }
    );
}

#[test]
fn favourites_follow_their_endpoints() {
    let schema = favorites();
    let mut store = InstanceStore::new(&schema);

    store.insert("Users", row(json!({"email": "luke@rebels.org", "password": "x"}))).unwrap();
    store.insert("Planets", row(json!({"name": "Tatooine"}))).unwrap();
    store.insert("Planets", row(json!({"name": "Hoth"}))).unwrap();
    store.insert("People", row(json!({"name": "Leia"}))).unwrap();
    store.insert("Movies", row(json!({"name": "A New Hope"}))).unwrap();

    for planet in [1, 2] {
        store
            .insert(
                "association_table",
                row(json!({"user_id": 1, "planet_id": planet, "movies_id": 1, "people_id": 1})),
            )
            .unwrap();
    }
    store
        .insert(
            "AssociationClass",
            row(json!({"planet_id": 1, "people_id": 1, "movies_id": 1, "notas": "homeworld"})),
        )
        .unwrap();

    let report = store.delete("Planets", &RowKey::single(1)).unwrap();
    assert_eq!(report.removed_from("association_table"), 1);
    assert_eq!(store.count("association_table"), 1);

    // association entities carry their own data and are not dropped
    assert_eq!(store.count("AssociationClass"), 1);
    let dangling = store.dangling_references();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].entity, "AssociationClass");
    assert_eq!(dangling[0].target, "Planets");
}

#[test]
fn deleting_a_user_keeps_the_profile() {
    let schema = favorites();
    let mut store = InstanceStore::new(&schema);

    let user = store.insert("Users", row(json!({"email": "han@falcon.io", "password": "x"}))).unwrap();
    store.insert("Profiles", row(json!({"fullname": "Han Solo", "user_id": 1}))).unwrap();
    store
        .insert("Posts", row(json!({"text": "kessel run", "image_url": "k.png", "user_id": 1})))
        .unwrap();

    let err = store
        .insert("Profiles", row(json!({"fullname": "Han Again", "user_id": 1})))
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { field, .. } if field == "user_id"));

    let report = store.delete("Users", &user).unwrap();
    assert_eq!(report.removed_from("Posts"), 1);
    assert_eq!(store.count("Profiles"), 1);
    assert_eq!(store.dangling_references().len(), 1);
}

#[test]
fn association_rows_need_every_key_component() {
    let schema = favorites();
    let mut store = InstanceStore::new(&schema);
    store.insert("Planets", row(json!({"name": "Endor"}))).unwrap();
    store.insert("People", row(json!({"name": "Wicket"}))).unwrap();

    let err = store
        .insert("AssociationClass", row(json!({"planet_id": 1, "people_id": 1})))
        .unwrap_err();
    assert!(matches!(err, StoreError::NullKeyComponent { column, .. } if column == "movies_id"));
}
