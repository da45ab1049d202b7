//! JSON export of a finalized schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use tracing::info;

use crate::checksum::Checksum;
use crate::config::OutputFormat;
use crate::error::Result;
use crate::relationship::Multiplicity;
use crate::schema::EntityKind;
use crate::snapshot::Schema;

/// A schema snapshot together with when and what was exported
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub generated_at: DateTime<Utc>,
    /// Checksum of `schema`, stable across exports of the same snapshot
    pub checksum: Checksum,
    pub stats: ManifestStats,
    pub schema: Schema,
}

/// Counts shown alongside an export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub entities: usize,
    pub join_tables: usize,
    pub association_entities: usize,
    pub relationships: usize,
    pub one_to_one: usize,
    pub one_to_many: usize,
    pub many_to_many: usize,
    pub cascading: usize,
}

impl ManifestStats {
    pub fn of(schema: &Schema) -> Self {
        let rels = schema.relationships();
        let count = |m: Multiplicity| rels.iter().filter(|r| r.multiplicity == m).count();
        Self {
            entities: schema.entity_count(),
            join_tables: schema.entities_of_kind(EntityKind::JoinTable).count(),
            association_entities: schema.entities_of_kind(EntityKind::Association).count(),
            relationships: rels.len(),
            one_to_one: count(Multiplicity::OneToOne),
            one_to_many: count(Multiplicity::OneToMany),
            many_to_many: count(Multiplicity::ManyToMany),
            cascading: rels.iter().filter(|r| r.cascade_delete).count(),
        }
    }
}

impl ExportManifest {
    pub fn new(schema: Schema) -> Self {
        Self {
            generated_at: Utc::now(),
            checksum: schema.checksum(),
            stats: ManifestStats::of(&schema),
            schema,
        }
    }

    pub fn to_json(&self, format: OutputFormat) -> Result<String> {
        let json = match format {
            OutputFormat::Pretty => serde_json::to_string_pretty(self)?,
            OutputFormat::Compact => serde_json::to_string(self)?,
        };
        Ok(json)
    }

    pub fn write(&self, path: &Path, format: OutputFormat) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json(format)?)?;
        info!(
            registry = self.schema.name(),
            checksum = self.checksum.short(),
            output = %path.display(),
            "Exported schema manifest"
        );
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// True if the embedded schema still hashes to the recorded checksum
    pub fn verify(&self) -> bool {
        self.schema.checksum() == self.checksum
    }
}
