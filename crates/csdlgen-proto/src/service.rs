//! The root service file: one RPC per route.

use csdlgen_edm::{Route, TypeGraph};

use crate::render::{file_path, package_of, Catalog, Imports, NAVIGATION_REFERENCE, NAVIGATION_REFERENCE_FILE};
use crate::{ProtoFile, ProtoOptions};

pub const ENTRY_FILE: &str = "entry.proto";

/// Name of the request message for a route.
pub fn filter_spec_name(route: &Route) -> String {
    format!("Get_{}_FilterSpec", route.path)
}

pub fn rpc_name(route: &Route) -> String {
    format!("Get_{}", route.path)
}

pub fn entry_file(graph: &TypeGraph, catalog: &Catalog, routes: &[Route], options: &ProtoOptions) -> ProtoFile {
    let mut imports = Imports::default();
    imports.add(NAVIGATION_REFERENCE_FILE);

    let mut messages = String::new();
    let mut rpcs = String::new();

    for route in routes {
        let Some(target) = catalog.canonical(graph, route.target) else {
            tracing::warn!(
                path = %route.path,
                target = %graph.node(route.target).name(),
                "route target was never emitted, skipping rpc"
            );
            continue;
        };
        let node = graph.node(target);
        imports.add(file_path(node));

        let spec = filter_spec_name(route);
        messages.push_str(&format!("message {spec} {{\n"));
        messages.push_str("    string expand = 1;\n");
        messages.push_str("    repeated string filter = 2;\n");
        if let Some(key) = &route.key_field {
            messages.push_str(&format!("    {NAVIGATION_REFERENCE} {key} = 3;\n"));
        }
        messages.push_str("}\n\n");

        if let Some(via) = &route.via {
            rpcs.push_str(&format!("\n    // from {via}\n"));
        }
        rpcs.push_str(&format!(
            "    rpc {}({spec}) returns ({}.{}) {{}}\n",
            rpc_name(route),
            package_of(node),
            node.name()
        ));
    }

    let mut contents = format!(
        "syntax = \"proto3\";\n\npackage {};\n\n",
        options.service_package
    );
    contents.push_str(&imports.render());
    contents.push('\n');
    contents.push_str(&messages);
    contents.push_str(&format!("service {} {{\n", options.service_name));
    contents.push_str(&rpcs);
    contents.push_str("}\n");

    ProtoFile {
        path: ENTRY_FILE.to_string(),
        contents,
    }
}
