//! GraphViz DOT output
//!
//! Entities become record boxes listing their columns; each relationship edge
//! is drawn once with crow's-foot arrowheads. Plain join tables are folded
//! into a dashed many-to-many edge unless `show_join_tables` is set.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use super::DiagramRenderer;
use crate::config::DiagramConfig;
use crate::error::Result;
use crate::relationship::{Multiplicity, Relationship, Via};
use crate::schema::{EntityDef, EntityKind};
use crate::snapshot::Schema;

const JOIN_TABLE_COLOR: &str = "#607D8B";

/// Writes a schema as DOT source
#[derive(Debug, Clone, Default)]
pub struct DotRenderer {
    config: DiagramConfig,
}

impl DotRenderer {
    pub fn new(config: DiagramConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiagramConfig {
        &self.config
    }

    /// Render the whole schema as a DOT digraph
    pub fn to_dot(&self, schema: &Schema) -> String {
        let mut output = String::new();

        // Header with styling
        let _ = writeln!(output, "digraph \"{}\" {{", escape_quoted(schema.name()));
        let _ = writeln!(output, "  rankdir={};", self.config.rankdir);
        output.push_str("  bgcolor=\"#1e1e1e\";\n");
        output.push_str("  node [shape=record, style=\"filled\", fontname=\"Helvetica\", fontsize=10, fontcolor=\"white\", color=\"#404040\"];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8, fontcolor=\"#808080\", color=\"#808080\"];\n");
        output.push('\n');

        // Nodes
        for entity in schema.entities() {
            let kind = schema.entity_kind(&entity.name).unwrap_or(EntityKind::Regular);
            if kind == EntityKind::JoinTable && !self.config.show_join_tables {
                continue;
            }
            let color = match kind {
                EntityKind::Regular => self.config.entity_color.as_str(),
                EntityKind::Association => self.config.association_color.as_str(),
                EntityKind::JoinTable => JOIN_TABLE_COLOR,
            };
            let _ = writeln!(
                output,
                "  \"{}\" [label=\"{}\", fillcolor=\"{}\"];",
                escape_quoted(&entity.name),
                self.node_label(entity),
                color
            );
        }

        output.push('\n');

        // Edges
        for rel in schema.relationships() {
            output.push_str(&self.edge(rel));
        }

        output.push_str("}\n");
        output
    }

    fn node_label(&self, entity: &EntityDef) -> String {
        let title = escape_record(&entity.name);
        if !self.config.show_fields {
            return title;
        }

        let mut rows = String::new();
        for column in entity.column_names() {
            let mut row = column.to_string();
            if let Some(field) = entity.get_field(column) {
                let _ = write!(row, " : {}", field.ty);
                if let Some(target) = &field.references {
                    let _ = write!(row, " -> {}", target.entity);
                }
            } else {
                row.push_str(" : Integer");
            }
            let mut tags = Vec::new();
            if entity.is_key_column(column) {
                tags.push("PK");
            }
            if entity.get_field(column).is_some_and(|f| f.is_foreign_key()) {
                tags.push("FK");
            }
            if entity.get_field(column).is_some_and(|f| f.nullable) {
                tags.push("null");
            }
            if !tags.is_empty() {
                let _ = write!(row, " [{}]", tags.join(", "));
            }
            rows.push_str(&escape_record(&row));
            rows.push_str("\\l");
        }

        format!("{{{}|{}}}", title, rows)
    }

    fn edge(&self, rel: &Relationship) -> String {
        let (arrowtail, arrowhead) = match rel.multiplicity {
            Multiplicity::OneToOne => ("tee", "tee"),
            Multiplicity::ManyToMany => ("crow", "crow"),
            // ManyToOne never survives finalize
            Multiplicity::OneToMany | Multiplicity::ManyToOne => ("tee", "crow"),
        };

        let mut attrs = vec![
            "dir=both".to_string(),
            format!("arrowtail={}", arrowtail),
            format!("arrowhead={}", arrowhead),
        ];

        let mut label = rel.label();
        match &rel.via {
            Some(Via::JoinTable(_)) => attrs.push("style=dashed".to_string()),
            Some(Via::AssociationEntity(_)) => {
                attrs.push("style=dotted".to_string());
                attrs.push(format!("color=\"{}\"", self.config.association_color));
            }
            None => {}
        }
        if rel.cascade_delete {
            label.push_str(" (cascade)");
            attrs.push("penwidth=2".to_string());
        }
        attrs.push(format!("label=\"{}\"", escape_quoted(&label)));

        format!(
            "  \"{}\" -> \"{}\" [{}];\n",
            escape_quoted(&rel.parent),
            escape_quoted(&rel.child),
            attrs.join(", ")
        )
    }
}

impl DiagramRenderer for DotRenderer {
    fn render(&self, schema: &Schema, output: &Path) -> Result<()> {
        let dot = self.to_dot(schema);
        std::fs::write(output, dot)?;
        info!(
            registry = schema.name(),
            output = %output.display(),
            "Exported DOT diagram"
        );
        Ok(())
    }
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_record(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '{' | '}' | '|' | '<' | '>' | '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
