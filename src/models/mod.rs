//! Built-in schemas
//!
//! Each model builds a fresh, still open registry so callers can extend it
//! before finalizing.

pub mod accounts;
pub mod favorites;

use crate::error::Result;
use crate::registry::SchemaRegistry;

/// A named registry builder
#[derive(Debug, Clone, Copy)]
pub struct Model {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Result<SchemaRegistry>,
}

impl Model {
    /// Build an open registry holding this model's declarations
    pub fn registry(&self) -> Result<SchemaRegistry> {
        (self.build)()
    }
}

const MODELS: &[Model] = &[
    Model {
        name: accounts::NAME,
        description: "User accounts owning a cascading list of addresses",
        build: accounts::registry,
    },
    Model {
        name: favorites::NAME,
        description: "Users, profiles, posts and favourite planets, people and movies",
        build: favorites::registry,
    },
];

pub fn all() -> &'static [Model] {
    MODELS
}

pub fn find(name: &str) -> Option<&'static Model> {
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}
