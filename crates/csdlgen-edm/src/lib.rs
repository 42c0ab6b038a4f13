//! CSDL/EDM schema front end.
//!
//! ```text
//! DocumentStore (parse + cache + fetch)
//!   ↓
//! GraphBuilder + resolve()     one TypeGraph per input document
//!   ↓
//! link(): merge → dedup → order → resolve_abstract
//!   ↓
//! find_root / discover_routes  shared by the proto and conversion back-ends
//! ```
//!
//! Resolution problems that do not stop a run are collected as
//! [`Diagnostic`]s on the graph; only IO, XML, fetch and root-selection
//! failures are [`EdmError`]s.

pub mod abstract_types;
pub mod builder;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod graph;
pub mod model;
pub mod resolve;
pub mod routes;
pub mod xml;

use std::path::Path;

pub use builder::{BuildOptions, GraphBuilder, DEFAULT_CYCLE_DENYLIST};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use document::{Document, DocumentStore, Fetcher, IncludedNamespace, ScopeEntry};
pub use error::{EdmError, Result};
pub use graph::TypeGraph;
pub use model::{
    document_stem, top_level_segment, Collection, ComplexType, EntityType, EnumType, Member,
    NavigationProperty, Node, NodeId, Permission, Primitive, Property, TypeDef, TypeRef,
};
pub use routes::{discover_routes, find_root, Route};

/// Build the sub-graph for one input document.
pub fn ingest_document(store: &DocumentStore, options: &BuildOptions, path: &Path) -> Result<TypeGraph> {
    GraphBuilder::new(store, options).ingest(path)
}

/// Join per-document graphs into the corpus the back-ends read: concatenate
/// in the given order, collapse duplicates (last wins), order by name with
/// `root_entity` first, then rewrite abstract references.
pub fn link(parts: impl IntoIterator<Item = TypeGraph>, root_entity: &str) -> TypeGraph {
    let mut graph = TypeGraph::merge(parts);
    graph.dedup();
    graph.sort_top_level(root_entity);
    graph.resolve_abstract();
    graph
}
