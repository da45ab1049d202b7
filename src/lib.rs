//! ERD Schema Registry
//!
//! Declares the entities of a relational schema and the relationships between
//! them, validates referential integrity as a whole, and freezes the result
//! into an immutable [`Schema`] snapshot that diagram renderers, table
//! creation and the in-memory [`InstanceStore`] consume.
//!
//! ## Features
//!
//! - **Independent registries**: every [`SchemaRegistry`] is its own namespace
//! - **One edge per relationship**: both entities declare a side, finalize
//!   merges them into a single [`Relationship`] consulted from either end
//! - **Whole-namespace validation**: finalize collects every violation before
//!   refusing, and reports cycles and uncascaded dependents as notices
//! - **Diagram export**: GraphViz DOT, or PNG/SVG/PDF through the `dot` binary
//!
//! ## Lifecycle
//!
//! ```text
//! define_entity / define_relationship      (Open)
//!              │
//!              ▼
//!          finalize ──── violations ───▶ SchemaInconsistency (still Open)
//!              │
//!              ▼
//!   Schema snapshot (Finalized) ──▶ export_diagram, ddl, InstanceStore
//! ```

pub mod checksum;
pub mod config;
pub mod ddl;
pub mod dependency;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod models;
pub mod naming;
pub mod registry;
pub mod relationship;
pub mod render;
pub mod schema;
pub mod snapshot;
pub mod store;
mod validate;

pub use checksum::Checksum;
pub use config::ErdConfig;
pub use diagnostics::{Severity, Violation, ViolationCode, Violations};
pub use error::{Result, SchemaError, StoreError, StoreResult};
pub use export::ExportManifest;
pub use registry::{RegistryState, SchemaRegistry};
pub use relationship::{Multiplicity, Relationship, RelationshipSpec, Via};
pub use render::{DiagramFormat, DiagramRenderer, DotRenderer, GraphvizRenderer};
pub use schema::{EntityDef, EntityKind, FieldDef, PrimaryKey, ScalarType};
pub use snapshot::{AssociationInfo, Schema};
pub use store::{InstanceStore, Row, RowKey};
