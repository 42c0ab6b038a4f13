//! proto3 back-end.
//!
//! Emits, for a linked [`TypeGraph`]:
//! - `<documentStem>/<TypeName>.proto` for every top-level entity, enum and
//!   complex type,
//! - the fixed `NavigationReference.proto` wrapper at the root,
//! - `entry.proto`, one service with an RPC per route from the root entity,
//!
//! plus a [`Manifest`] of everything written. Nothing touches the
//! filesystem here; the driver writes [`ProtoFile`]s where it likes.

pub mod manifest;
pub mod message;
pub mod render;
pub mod service;

use csdlgen_edm::{discover_routes, find_root, EdmError, TypeGraph};
use thiserror::Error;

pub use manifest::{DirectoryManifest, Manifest, RootManifest, MANIFEST_FILE};
pub use message::{entity_layers, Field, Layer};
pub use render::{Catalog, NAVIGATION_REFERENCE_FILE};
pub use service::ENTRY_FILE;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error(transparent)]
    Edm(#[from] EdmError),

    #[error("failed to render manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtoError>;

#[derive(Debug, Clone)]
pub struct ProtoOptions {
    /// Name of the entity every route starts from.
    pub root_entity: String,
    pub root_url: String,
    pub service_package: String,
    pub service_name: String,
}

impl Default for ProtoOptions {
    fn default() -> Self {
        Self {
            root_entity: "ServiceRoot".to_string(),
            root_url: "/redfish/v1".to_string(),
            service_package: "redfish_v1".to_string(),
            service_name: "Redfish_v1".to_string(),
        }
    }
}

/// A generated file, with a `/`-separated path relative to the proto root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoFile {
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProtoOutput {
    /// Proto sources in write order; compile in this order too.
    pub files: Vec<ProtoFile>,
    pub manifest: Manifest,
}

impl ProtoOutput {
    pub fn file(&self, path: &str) -> Option<&ProtoFile> {
        self.files.iter().find(|f| f.path == path)
    }

    fn push(&mut self, file: ProtoFile) {
        self.manifest.record(&file.path);
        self.files.push(file);
    }
}

pub fn generate(graph: &TypeGraph, options: &ProtoOptions) -> Result<ProtoOutput> {
    let root = find_root(graph, &options.root_entity)?;
    let catalog = Catalog::new(graph);

    let mut output = ProtoOutput::default();
    output.push(message::navigation_reference_file());

    for &id in graph.top_level() {
        let Some(canonical) = catalog.canonical(graph, id) else {
            continue;
        };
        if canonical != id {
            continue;
        }
        if let Some(file) = message::declaration_file(graph, &catalog, id) {
            output.push(file);
        }
    }

    let routes = discover_routes(graph, root, &options.root_url);
    output.push(service::entry_file(graph, &catalog, &routes, options));

    tracing::info!(
        files = output.files.len(),
        routes = routes.len(),
        "generated proto sources"
    );
    Ok(output)
}
