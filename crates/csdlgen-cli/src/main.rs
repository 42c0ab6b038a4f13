//! csdlgen CLI
//!
//! Reads a directory of CSDL/EDM documents and generates:
//! - proto3 messages and enums, one file per declaration
//! - `entry.proto`, a service with one RPC per route from the root entity
//! - Rust handlers converting Redfish JSON into the prost messages
//! - build manifests for the proto tree

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use tracing::Level;

mod config;
mod driver;
mod fetch;
mod protoc;

use config::RunConfig;

#[derive(Parser)]
#[command(name = "csdlgen")]
#[command(
    author,
    version,
    about = "Generate proto3 schemas and conversion handlers from CSDL"
)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate protos, handlers and manifests from a schema directory.
    Generate(GenerateArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// JSON run configuration; the flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory of CSDL documents.
    #[arg(long)]
    schema_dir: Option<PathBuf>,
    /// Root of the generated proto tree (wiped first).
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Descriptor set output directory (wiped first).
    #[arg(long)]
    proto_out: Option<PathBuf>,
    /// Generated Rust handlers file.
    #[arg(long)]
    handlers: Option<PathBuf>,
    /// Entity every route starts from.
    #[arg(long)]
    root_entity: Option<String>,
    #[arg(long)]
    root_url: Option<String>,
    /// Rust path of the prost output used by the handlers.
    #[arg(long)]
    proto_module: Option<String>,
    /// Ingestion workers.
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Proto compiler binary.
    #[arg(long)]
    protoc: Option<PathBuf>,
    /// Write sources only; do not run the proto compiler.
    #[arg(long)]
    skip_compile: bool,
    /// Never fetch; a reference missing from the schema directory is fatal.
    #[arg(long)]
    offline: bool,
    /// Keep members normally dropped to break reference cycles.
    #[arg(long)]
    no_denylist: bool,
}

impl GenerateArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.schema_dir {
            config.schema_dir = v;
        }
        if let Some(v) = self.out {
            config.out_dir = v;
        }
        if let Some(v) = self.proto_out {
            config.proto_out_dir = v;
        }
        if let Some(v) = self.handlers {
            config.handlers_path = v;
        }
        if let Some(v) = self.root_entity {
            config.root_entity = v;
        }
        if let Some(v) = self.root_url {
            config.root_url = v;
        }
        if let Some(v) = self.proto_module {
            config.proto_module = v;
        }
        if let Some(v) = self.jobs {
            config.jobs = Some(v);
        }
        if let Some(v) = self.protoc {
            config.protoc = v;
        }
        config.skip_compile |= self.skip_compile;
        config.offline |= self.offline;
        if self.no_denylist {
            config.cycle_denylist.clear();
        }
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate(args) => cmd_generate(args.into_config()?),
    }
}

fn cmd_generate(config: RunConfig) -> Result<()> {
    println!(
        "{} {}",
        "Generating from".cyan().bold(),
        config.schema_dir.display()
    );

    let summary = driver::run(&config)?;

    println!(
        "  {} {} documents, {} declarations",
        "✓".green(),
        summary.documents,
        summary.declarations
    );
    println!(
        "  {} {} ({} proto files)",
        "→".cyan(),
        config.out_dir.display(),
        summary.proto_files.len()
    );
    println!(
        "  {} {} ({} handlers)",
        "→".cyan(),
        config.handlers_path.display(),
        summary.handlers
    );
    if summary.descriptors > 0 {
        println!(
            "  {} {} ({} descriptor sets)",
            "→".cyan(),
            config.proto_out_dir.display(),
            summary.descriptors
        );
    }

    if !summary.diagnostics.is_empty() {
        println!(
            "\n{} {} resolution diagnostics",
            "⚠".yellow(),
            summary.diagnostics.len()
        );
        for diagnostic in &summary.diagnostics {
            println!("  {} {diagnostic}", "-".yellow());
        }
    }
    if !summary.placeholders.is_empty() {
        println!(
            "\n{} {} conversions left unimplemented",
            "⚠".yellow(),
            summary.placeholders.len()
        );
        for placeholder in &summary.placeholders {
            println!("  {} {placeholder}", "-".yellow());
        }
    }

    Ok(())
}
