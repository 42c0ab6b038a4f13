//! Field type rendering and import bookkeeping.

use std::collections::{BTreeSet, HashMap};

use csdlgen_edm::{document_stem, top_level_segment, Node, NodeId, Primitive, TypeGraph, TypeRef};

pub const NAVIGATION_REFERENCE: &str = "NavigationReference";
pub const NAVIGATION_REFERENCE_FILE: &str = "NavigationReference.proto";
pub const ANY: &str = "google.protobuf.Any";
pub const ANY_IMPORT: &str = "google/protobuf/any.proto";

/// Scalar keyword and well-known import for an EDM primitive.
pub fn scalar(primitive: Primitive) -> (&'static str, Option<&'static str>) {
    match primitive {
        Primitive::String | Primitive::Guid => ("string", None),
        Primitive::Boolean => ("bool", None),
        Primitive::Decimal => ("double", None),
        Primitive::Int64 => ("int64", None),
        Primitive::Int32 => ("int32", None),
        Primitive::Time => (
            "google.protobuf.Timestamp",
            Some("google/protobuf/timestamp.proto"),
        ),
        Primitive::Duration => (
            "google.protobuf.Duration",
            Some("google/protobuf/duration.proto"),
        ),
    }
}

/// Output path of a declaration's file, relative to the proto root.
pub fn file_path(node: &Node) -> String {
    format!("{}/{}.proto", document_stem(node.origin()), node.name())
}

/// Proto package of a declaration: its first namespace segment.
pub fn package_of(node: &Node) -> &str {
    top_level_segment(node.namespace().unwrap_or_default())
}

/// The import set of one file: deduplicated, written case-insensitively
/// sorted.
#[derive(Debug, Default, Clone)]
pub struct Imports(BTreeSet<String>);

impl Imports {
    pub fn add(&mut self, path: impl Into<String>) {
        self.0.insert(path.into());
    }

    pub fn remove(&mut self, path: &str) {
        self.0.remove(path);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sorted(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.0.iter().map(String::as_str).collect();
        out.sort_by_cached_key(|s| (s.to_lowercase(), s.to_string()));
        out
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for path in self.sorted() {
            out.push_str(&format!("import \"{path}\";\n"));
        }
        out
    }
}

/// Top-level declarations that survived dedup, by
/// `(package, name)`. References to a node that lost dedup are rendered
/// against the surviving declaration, since only that one gets a file.
pub struct Catalog {
    emitted: HashMap<(String, String), NodeId>,
}

impl Catalog {
    pub fn new(graph: &TypeGraph) -> Self {
        let mut emitted = HashMap::new();
        for &id in graph.top_level() {
            let node = graph.node(id);
            if emits_file(node) {
                emitted
                    .entry((package_of(node).to_string(), node.name().to_string()))
                    .or_insert(id);
            }
        }
        Self { emitted }
    }

    /// The emitted declaration standing in for `id`, if any.
    pub fn canonical(&self, graph: &TypeGraph, id: NodeId) -> Option<NodeId> {
        let node = graph.node(id);
        self.emitted
            .get(&(package_of(node).to_string(), node.name().to_string()))
            .copied()
    }
}

/// Type definitions and collections never get a file of their own.
pub fn emits_file(node: &Node) -> bool {
    matches!(node, Node::Entity(_) | Node::Enum(_) | Node::Complex(_))
}

/// Render a field type as seen from `package`, collecting its imports.
pub fn field_type(
    graph: &TypeGraph,
    catalog: &Catalog,
    ty: &TypeRef,
    package: &str,
    imports: &mut Imports,
) -> String {
    match graph.peel_typedefs(ty) {
        TypeRef::Primitive(primitive) => {
            let (keyword, import) = scalar(*primitive);
            if let Some(import) = import {
                imports.add(import);
            }
            keyword.to_string()
        }
        TypeRef::Unresolved(_) => {
            imports.add(ANY_IMPORT);
            ANY.to_string()
        }
        TypeRef::Node(id) => match graph.node(*id) {
            Node::Collection(collection) => {
                if is_collection(graph, &collection.contained) {
                    // proto3 has no nested repeated fields.
                    imports.add(ANY_IMPORT);
                    return format!("repeated {ANY}");
                }
                let inner = field_type(graph, catalog, &collection.contained, package, imports);
                format!("repeated {inner}")
            }
            Node::TypeDef(_) => {
                // Only reachable through a type definition cycle.
                imports.add(ANY_IMPORT);
                ANY.to_string()
            }
            Node::Entity(_) | Node::Enum(_) | Node::Complex(_) => {
                let Some(canonical) = catalog.canonical(graph, *id) else {
                    tracing::debug!(
                        name = %graph.describe(ty),
                        "referenced declaration was never emitted, rendering as Any"
                    );
                    imports.add(ANY_IMPORT);
                    return ANY.to_string();
                };
                let node = graph.node(canonical);
                imports.add(file_path(node));
                let target = package_of(node);
                if target == package {
                    node.name().to_string()
                } else {
                    format!(".{target}.{}", node.name())
                }
            }
        },
    }
}

/// Whether a reference is a collection once type definitions are stripped.
pub fn is_collection(graph: &TypeGraph, ty: &TypeRef) -> bool {
    matches!(
        graph.peel_typedefs(ty).node().map(|id| graph.node(id)),
        Some(Node::Collection(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_primitive_has_one_rendering_and_import_set() {
        for primitive in Primitive::ALL {
            let (keyword, import) = scalar(primitive);
            assert!(!keyword.is_empty());
            match primitive {
                Primitive::Time => assert_eq!(import, Some("google/protobuf/timestamp.proto")),
                Primitive::Duration => assert_eq!(import, Some("google/protobuf/duration.proto")),
                _ => assert_eq!(import, None, "{primitive:?}"),
            }
        }
        assert_eq!(scalar(Primitive::Decimal).0, "double");
        assert_eq!(scalar(Primitive::Guid).0, "string");
    }

    #[test]
    fn imports_sort_case_insensitively_and_dedup() {
        let mut imports = Imports::default();
        imports.add("power/Power.proto");
        imports.add("Chassis/Chassis.proto");
        imports.add("power/Power.proto");
        imports.add("Assembly/Assembly.proto");
        assert_eq!(
            imports.sorted(),
            vec!["Assembly/Assembly.proto", "Chassis/Chassis.proto", "power/Power.proto"]
        );
    }
}
