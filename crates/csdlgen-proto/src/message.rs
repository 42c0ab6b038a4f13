//! One proto file per emitted declaration.

use csdlgen_edm::{Member, Node, NodeId, TypeGraph};

use crate::render::{
    field_type, file_path, is_collection, package_of, Catalog, Imports, ANY, ANY_IMPORT,
    NAVIGATION_REFERENCE, NAVIGATION_REFERENCE_FILE,
};
use crate::ProtoFile;

/// One rendered message field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub ty: String,
    pub name: String,
    pub number: u32,
}

/// A contiguous run of fields contributed by one entity layer.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Qualified name of the declaring entity.
    pub from: String,
    pub fields: Vec<Field>,
}

/// Fields of an entity message: every layer of the base chain, base-most
/// first, numbered 1..N across the whole chain.
pub fn entity_layers(
    graph: &TypeGraph,
    catalog: &Catalog,
    id: NodeId,
    imports: &mut Imports,
) -> Vec<Layer> {
    let package = package_of(graph.node(id)).to_string();
    let mut number = 1;
    let mut layers = Vec::new();

    for layer_id in graph.base_chain(id) {
        let Some(entity) = graph.entity(layer_id) else {
            continue;
        };
        let mut fields = Vec::with_capacity(entity.members.len());
        for member in &entity.members {
            let ty = match member {
                Member::Navigation(nav) if !nav.is_inlined() => {
                    imports.add(NAVIGATION_REFERENCE_FILE);
                    if is_collection(graph, &nav.ty) {
                        format!("repeated {NAVIGATION_REFERENCE}")
                    } else {
                        NAVIGATION_REFERENCE.to_string()
                    }
                }
                _ => field_type(graph, catalog, member.ty(), &package, imports),
            };
            fields.push(Field {
                ty,
                name: member.name().to_string(),
                number,
            });
            number += 1;
        }
        layers.push(Layer {
            from: entity.qualified_name(),
            fields,
        });
    }
    layers
}

fn entity_body(graph: &TypeGraph, catalog: &Catalog, id: NodeId, imports: &mut Imports) -> String {
    let name = graph.node(id).name();
    let mut out = format!("message {name} {{\n");
    let mut first = true;
    for layer in entity_layers(graph, catalog, id, imports) {
        if layer.fields.is_empty() {
            continue;
        }
        if !first {
            out.push('\n');
        }
        first = false;
        out.push_str(&format!("    // from {}\n", layer.from));
        for field in layer.fields {
            out.push_str(&format!("    {} {} = {};\n", field.ty, field.name, field.number));
        }
    }
    out.push_str("}\n");
    out
}

/// Render the file for one top-level declaration. Type definitions and
/// collections yield `None`.
pub fn declaration_file(graph: &TypeGraph, catalog: &Catalog, id: NodeId) -> Option<ProtoFile> {
    let node = graph.node(id);
    let mut imports = Imports::default();
    let body = match node {
        Node::Entity(_) => entity_body(graph, catalog, id, &mut imports),
        Node::Enum(e) => {
            let mut out = format!("enum {} {{\n", e.name);
            for (value, member) in e.members.iter().enumerate() {
                out.push_str(&format!("    {}_{member} = {value};\n", e.name));
            }
            out.push_str("}\n");
            out
        }
        Node::Complex(c) => {
            imports.add(ANY_IMPORT);
            format!("message {0} {{\n    map<string, {ANY}> {0} = 1;\n}}\n", c.name)
        }
        Node::TypeDef(_) | Node::Collection(_) => return None,
    };
    // A message embedding its own type needs no import of itself.
    let path = file_path(node);
    imports.remove(&path);

    let mut contents = format!("syntax = \"proto3\";\n\npackage {};\n\n", package_of(node));
    if !imports.is_empty() {
        contents.push_str(&imports.render());
        contents.push('\n');
    }
    contents.push_str(&body);

    Some(ProtoFile { path, contents })
}

/// The fixed reference wrapper every non-inlined navigation renders as.
pub fn navigation_reference_file() -> ProtoFile {
    ProtoFile {
        path: NAVIGATION_REFERENCE_FILE.to_string(),
        contents: format!("syntax = \"proto3\";\n\nmessage {NAVIGATION_REFERENCE} {{\n    string id = 1;\n}}\n"),
    }
}
