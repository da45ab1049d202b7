//! Image output through the GraphViz `dot` binary

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use super::{DiagramFormat, DiagramRenderer, DotRenderer};
use crate::config::DiagramConfig;
use crate::error::{Result, SchemaError};
use crate::snapshot::Schema;

/// Renders PNG, SVG or PDF by piping DOT source into GraphViz
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    format: DiagramFormat,
    dot: DotRenderer,
}

impl GraphvizRenderer {
    pub fn new(format: DiagramFormat, config: DiagramConfig) -> Self {
        Self {
            format,
            dot: DotRenderer::new(config),
        }
    }

    pub fn format(&self) -> DiagramFormat {
        self.format
    }
}

impl DiagramRenderer for GraphvizRenderer {
    fn render(&self, schema: &Schema, output: &Path) -> Result<()> {
        let Some(ty) = self.format.graphviz_type() else {
            return self.dot.render(schema, output);
        };

        let binary = &self.dot.config().graphviz_bin;
        let source = self.dot.to_dot(schema);
        debug!(binary = %binary.display(), format = ty, "Invoking GraphViz");

        let mut child = Command::new(binary)
            .arg(format!("-T{}", ty))
            .arg("-o")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SchemaError::Render(format!(
                    "GraphViz binary '{}' not found; install graphviz or set diagram.graphviz_bin",
                    binary.display()
                )),
                _ => SchemaError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(source.as_bytes()) {
                // dot exited early; its stderr explains why
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("GraphViz closed stdin before reading all input");
                }
                other => other?,
            }
        }

        let result = child.wait_with_output()?;
        if !result.status.success() {
            return Err(SchemaError::Render(format!(
                "GraphViz exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        info!(
            registry = schema.name(),
            output = %output.display(),
            format = ty,
            "Exported diagram"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use crate::schema::{EntityDef, FieldDef, PrimaryKey};

    #[test]
    fn test_missing_binary_is_a_render_error() {
        let mut registry = SchemaRegistry::new("solo");
        registry.define_entity(EntityDef::new("Users", PrimaryKey::auto())).unwrap();
        let schema = registry.finalize().unwrap();

        let config = DiagramConfig {
            graphviz_bin: "/nonexistent/graphviz/dot".into(),
            ..DiagramConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let renderer = GraphvizRenderer::new(DiagramFormat::Png, config);
        let err = renderer.render(&schema, &dir.path().join("solo.png")).unwrap_err();
        assert!(matches!(err, SchemaError::Render(msg) if msg.contains("not found")));
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_reports_stderr() {
        // enough DOT to overflow the pipe buffer before `sh` rejects -T
        let mut registry = SchemaRegistry::new("crowded");
        for i in 0..2000 {
            registry
                .define_entity(
                    EntityDef::new(format!("Entity{}", i), PrimaryKey::auto())
                        .field(FieldDef::string("a_rather_long_descriptive_column_name", 250)),
                )
                .unwrap();
        }
        let schema = registry.finalize().unwrap();

        let config = DiagramConfig {
            graphviz_bin: "sh".into(),
            ..DiagramConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let renderer = GraphvizRenderer::new(DiagramFormat::Svg, config);
        let err = renderer.render(&schema, &dir.path().join("crowded.svg")).unwrap_err();
        assert!(matches!(err, SchemaError::Render(msg) if msg.contains("exited with")));
    }
}
