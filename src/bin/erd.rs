//! ERD Registry CLI
//!
//! Validates the built-in schemas and exports them as diagrams, table
//! creation scripts or JSON manifests.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use erd_registry::config::OutputFormat;
use erd_registry::naming::suggest;
use erd_registry::render::{self, DiagramFormat, DiagramRenderer};
use erd_registry::{ddl, models, ErdConfig, ExportManifest, SchemaError, SchemaRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "erd-registry")]
#[command(about = "Validate relational schemas and export ER diagrams")]
struct Cli {
    /// Config file layered over erd.toml and ERD__* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in models
    List,

    /// Finalize a model and report violations and notices
    Validate {
        model: String,
        /// Also print info-level notices
        #[arg(short, long)]
        verbose: bool,
    },

    /// Render a model as an ER diagram (.dot, .gv, .png, .svg, .pdf)
    Diagram {
        model: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format when it should not follow the file extension
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Print or write CREATE TABLE statements
    Ddl {
        model: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the finalized schema as a JSON manifest
    Export {
        model: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write it to this file instead of printing
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let config = ErdConfig::load_from(config_path.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::List => {
            println!("📚 Built-in models:");
            for model in models::all() {
                println!("  {:<12} {}", model.name, model.description);
            }
        }

        Commands::Validate { model, verbose } => {
            let schema = match registry_for(&model, &config)?.finalize() {
                Ok(schema) => schema,
                Err(SchemaError::SchemaInconsistency(violations)) => {
                    println!("❌ {} - {} violation(s)", model, violations.error_count());
                    println!();
                    print!("{}", violations.format_all());
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };

            println!(
                "✅ {} - {} entities, {} relationships (checksum {})",
                schema.name(),
                schema.entity_count(),
                schema.relationships().len(),
                schema.checksum().short()
            );
            for rel in schema.relationships() {
                println!("  {}", rel);
            }

            let warnings = schema.warnings();
            if !warnings.is_empty() {
                println!();
                if verbose {
                    print!("{}", warnings.format_all());
                } else {
                    println!("  {} notice(s); run with --verbose to list them", warnings.len());
                }
            }
        }

        Commands::Diagram { model, output, format } => {
            let schema = registry_for(&model, &config)?.finalize()?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.dot", schema.name())));
            let format = match format {
                Some(ext) => DiagramFormat::from_extension(&ext.to_ascii_lowercase())?,
                None => DiagramFormat::from_path(&output)?,
            };
            render::renderer_for(format, &config.diagram).render(&schema, &output)?;
            println!("✅ Exported diagram to: {}", output.display());
        }

        Commands::Ddl { model, output } => {
            let schema = registry_for(&model, &config)?.finalize()?;
            let script = ddl::create_tables_script(&schema);
            match output {
                Some(path) => {
                    std::fs::write(&path, script).with_context(|| format!("writing {}", path.display()))?;
                    println!("✅ Wrote table creation script to: {}", path.display());
                }
                None => print!("{}", script),
            }
        }

        Commands::Export { model, output, compact } => {
            let schema = registry_for(&model, &config)?.finalize()?;
            let format = if compact {
                OutputFormat::Compact
            } else {
                config.export.output_format
            };
            let manifest = ExportManifest::new(schema);
            match output {
                Some(path) => {
                    manifest.write(&path, format)?;
                    println!("✅ Exported {} to: {}", model, path.display());
                }
                None => println!("{}", manifest.to_json(format)?),
            }
        }

        Commands::Config { save } => match save {
            Some(path) => {
                let path = path.to_string_lossy();
                config.save(&path).with_context(|| format!("writing {}", path))?;
                println!("✅ Saved configuration to: {}", path);
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

/// Open registry for a built-in model, validating with the configured settings
fn registry_for(name: &str, config: &ErdConfig) -> Result<SchemaRegistry> {
    let model = models::find(name).ok_or_else(|| {
        let hint = suggest(name, models::all().iter().map(|m| m.name))
            .map(|s| format!(" (did you mean '{}'?)", s))
            .unwrap_or_default();
        anyhow!("unknown model '{}'{}; run `erd-registry list`", name, hint)
    })?;
    let mut registry = model.registry()?;
    registry.set_validation(config.validation.clone());
    Ok(registry)
}
