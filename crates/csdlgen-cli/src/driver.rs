//! One generation run, end to end.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use csdlgen_convert::Placeholder;
use csdlgen_edm::{ingest_document, link, Diagnostic, DocumentStore, TypeGraph};
use csdlgen_proto::ProtoFile;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::RunConfig;
use crate::fetch::HttpFetcher;
use crate::protoc::Protoc;

#[derive(Debug, Default)]
pub struct Summary {
    pub documents: usize,
    pub declarations: usize,
    pub proto_files: Vec<PathBuf>,
    pub handlers: usize,
    pub descriptors: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub placeholders: Vec<Placeholder>,
}

/// Input documents: every `.xml` file under `schema_dir` whose name does not
/// start with an excluded prefix, in path order.
pub fn collect_inputs(config: &RunConfig) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(&config.schema_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", config.schema_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("xml") {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if config.is_excluded(&name) {
            tracing::debug!(path = %path.display(), "excluded by prefix");
            continue;
        }
        inputs.push(path.to_path_buf());
    }
    inputs.sort();
    Ok(inputs)
}

/// Ingest every input in parallel and link the results.
///
/// `par_iter` over sorted paths keeps input order at the join, so "last
/// wins" dedup means last in path order.
pub fn build_graph(config: &RunConfig, inputs: &[PathBuf]) -> Result<TypeGraph> {
    let mut store = DocumentStore::new(&config.schema_dir);
    if !config.offline {
        store = store.with_fetcher(Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?));
    }
    let options = config.build_options();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs())
        .build()
        .map_err(|e| anyhow!("failed to start ingestion pool: {e}"))?;
    tracing::info!(documents = inputs.len(), jobs = config.jobs(), "ingesting schemas");

    let parts = pool.install(|| {
        inputs
            .par_iter()
            .map(|path| {
                ingest_document(&store, &options, path)
                    .with_context(|| format!("failed to ingest {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()
    })?;
    tracing::debug!(cached = store.cached(), "ingestion finished");

    Ok(link(parts, &config.root_entity))
}

pub fn run(config: &RunConfig) -> Result<Summary> {
    guard_outputs(config)?;

    let inputs = collect_inputs(config)?;
    if inputs.is_empty() {
        bail!("no schema documents found under {}", config.schema_dir.display());
    }
    let graph = build_graph(config, &inputs)?;

    let protos = csdlgen_proto::generate(&graph, &config.proto_options())?;
    let handlers = csdlgen_convert::generate(&graph, &config.convert_options())?;

    clear_dir(&config.out_dir)?;
    clear_dir(&config.proto_out_dir)?;

    let mut summary = Summary {
        documents: inputs.len(),
        declarations: graph.top_level().len(),
        handlers: handlers.handlers,
        diagnostics: graph.diagnostics().to_vec(),
        placeholders: handlers.placeholders,
        ..Summary::default()
    };

    for file in &protos.files {
        summary.proto_files.push(write_file(&config.out_dir, file)?);
    }
    for file in &protos.manifest.render()? {
        write_file(&config.out_dir, file)?;
    }

    if let Some(parent) = config.handlers_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(&config.handlers_path, &handlers.contents)
        .with_context(|| format!("failed to write {}", config.handlers_path.display()))?;

    if config.skip_compile {
        tracing::info!("skipping proto compilation");
    } else {
        let protoc = Protoc::new(&config.protoc, &config.out_dir, &config.proto_out_dir);
        let mut relative: Vec<&str> = protos.files.iter().map(|f| f.path.as_str()).collect();
        relative.sort_unstable();
        for path in relative {
            protoc.compile(path)?;
            summary.descriptors += 1;
        }
    }

    summary.diagnostics.sort();
    summary.diagnostics.dedup();
    Ok(summary)
}

fn write_file(root: &Path, file: &ProtoFile) -> Result<PathBuf> {
    let path = root.join(&file.path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, &file.contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Empty `dir` (creating it if missing) without removing the directory itself.
fn clear_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()));
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Output directories are wiped on every run; refuse any that would take the
/// schemas with them.
fn guard_outputs(config: &RunConfig) -> Result<()> {
    let schemas = absolute(&config.schema_dir);
    for out in [&config.out_dir, &config.proto_out_dir] {
        let out_abs = absolute(out);
        if schemas.starts_with(&out_abs) {
            bail!(
                "output directory {} contains the schema directory {}",
                out.display(),
                config.schema_dir.display()
            );
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> RunConfig {
        RunConfig {
            schema_dir: dir.join("csdl"),
            out_dir: dir.join("proto"),
            proto_out_dir: dir.join("proto_out"),
            handlers_path: dir.join("src/handlers.rs"),
            offline: true,
            skip_compile: true,
            ..RunConfig::default()
        }
    }

    #[test]
    fn inputs_are_sorted_xml_without_excluded_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(config.schema_dir.join("nested")).unwrap();
        for name in ["b_v1.xml", "a_v1.xml", "OemAccountService_v1.xml", "notes.txt", "nested/c_v1.xml"] {
            fs::write(config.schema_dir.join(name), "<Edmx/>").unwrap();
        }

        let inputs = collect_inputs(&config).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.strip_prefix(&config.schema_dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a_v1.xml", "b_v1.xml", "nested/c_v1.xml"]);
    }

    #[test]
    fn clear_dir_keeps_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("proto");
        fs::create_dir_all(out.join("Old_v1")).unwrap();
        fs::write(out.join("Old_v1/Old.proto"), "").unwrap();
        fs::write(out.join("entry.proto"), "").unwrap();

        clear_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn refuses_to_wipe_the_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        fs::create_dir_all(&config.schema_dir).unwrap();
        config.out_dir = dir.path().to_path_buf();
        assert!(run(&config).is_err());
        assert!(config.schema_dir.is_dir());
    }
}
