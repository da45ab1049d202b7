//! Diagram rendering
//!
//! Renderers are collaborators handed a finalized [`Schema`] and an output
//! path. `DotRenderer` writes GraphViz source; `GraphvizRenderer` pipes that
//! source through the `dot` binary to produce an image.

pub mod dot;
pub mod graphviz;

pub use dot::DotRenderer;
pub use graphviz::GraphvizRenderer;

use std::path::Path;

use crate::config::DiagramConfig;
use crate::error::{Result, SchemaError};
use crate::snapshot::Schema;

/// Something that can draw a schema to a file
pub trait DiagramRenderer {
    fn render(&self, schema: &Schema, output: &Path) -> Result<()>;
}

/// Output format, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramFormat {
    Dot,
    Png,
    Svg,
    Pdf,
}

impl DiagramFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| SchemaError::UnsupportedFormat(format!("{} has no extension", path.display())))?;
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext {
            "dot" | "gv" => Ok(DiagramFormat::Dot),
            "png" => Ok(DiagramFormat::Png),
            "svg" => Ok(DiagramFormat::Svg),
            "pdf" => Ok(DiagramFormat::Pdf),
            other => Err(SchemaError::UnsupportedFormat(format!(
                "'{}' (use dot, gv, png, svg or pdf)",
                other
            ))),
        }
    }

    /// GraphViz `-T` argument, `None` for plain DOT source
    pub fn graphviz_type(&self) -> Option<&'static str> {
        match self {
            DiagramFormat::Dot => None,
            DiagramFormat::Png => Some("png"),
            DiagramFormat::Svg => Some("svg"),
            DiagramFormat::Pdf => Some("pdf"),
        }
    }
}

/// Renderer for `format` using the given settings
pub fn renderer_for(format: DiagramFormat, config: &DiagramConfig) -> Box<dyn DiagramRenderer> {
    match format.graphviz_type() {
        None => Box::new(DotRenderer::new(config.clone())),
        Some(_) => Box::new(GraphvizRenderer::new(format, config.clone())),
    }
}

/// Render `schema` to `output` with default settings
pub fn export_diagram(schema: &Schema, output: &Path) -> Result<()> {
    export_diagram_with_config(schema, output, &DiagramConfig::default())
}

pub fn export_diagram_with_config(schema: &Schema, output: &Path, config: &DiagramConfig) -> Result<()> {
    let format = DiagramFormat::from_path(output)?;
    renderer_for(format, config).render(schema, output)
}
