//! Navigation paths reachable from the service root.
//!
//! Both back-ends emit one RPC (and one handler) per [`Route`], so the walk
//! lives here rather than in either of them.

use std::collections::HashSet;

use crate::error::{EdmError, Result};
use crate::graph::TypeGraph;
use crate::model::{Node, NodeId, TypeRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Underscore-joined navigation names, e.g. `ServiceRoot_Chassis_Power`.
    pub path: String,
    /// Static request URL, e.g. `/redfish/v1/Chassis/Power`.
    pub url: String,
    /// Entity returned by this route.
    pub target: NodeId,
    /// `<LastSegment>Id` when the path crossed at least one collection. Only
    /// the first collection on a path is keyed.
    pub key_field: Option<String>,
    /// Qualified name of the entity declaring the navigation property that
    /// leads here; `None` for the root itself.
    pub via: Option<String>,
}

/// The single top-level entity named `name`.
pub fn find_root(graph: &TypeGraph, name: &str) -> Result<NodeId> {
    let found: Vec<NodeId> = graph
        .top_level()
        .iter()
        .copied()
        .filter(|&id| graph.node(id).name() == name)
        .collect();
    match found.as_slice() {
        [id] if graph.entity(*id).is_some() => Ok(*id),
        _ => Err(EdmError::NoUniqueRoot {
            name: name.to_string(),
            found: found.len(),
        }),
    }
}

/// Every navigation path reachable from `root`, regardless of expand flags,
/// in depth-first declaration order (inherited navigations before own).
///
/// Type definitions and collections do not add depth. A navigation that
/// re-enters an entity already on the current path is not followed, and a
/// path reached twice (a redeclared inherited navigation) is kept once.
pub fn discover_routes(graph: &TypeGraph, root: NodeId, root_url: &str) -> Vec<Route> {
    let mut walk = RouteWalk {
        graph,
        routes: Vec::new(),
        seen: HashSet::new(),
        on_path: Vec::new(),
    };
    walk.entity(root, "", root_url, false, None);
    walk.routes
}

struct RouteWalk<'g> {
    graph: &'g TypeGraph,
    routes: Vec<Route>,
    seen: HashSet<String>,
    on_path: Vec<NodeId>,
}

impl RouteWalk<'_> {
    fn ty(&mut self, ty: &TypeRef, path: &str, url: &str, crossed: bool, via: Option<String>) {
        // Type definitions and collections can only loop back on themselves
        // through a self-referencing definition; stop on the first repeat.
        let mut hops = HashSet::new();
        let mut crossed = crossed;
        let mut current = ty;
        while let Some(id) = current.node() {
            if !hops.insert(id) {
                tracing::debug!(path, "type definition cycle, not expanding");
                return;
            }
            match self.graph.node(id) {
                Node::Collection(collection) => {
                    crossed = true;
                    current = &collection.contained;
                }
                Node::TypeDef(def) => current = &def.underlying,
                Node::Entity(_) => return self.entity(id, path, url, crossed, via),
                Node::Enum(_) | Node::Complex(_) => return,
            }
        }
    }

    fn entity(&mut self, id: NodeId, path: &str, url: &str, crossed: bool, via: Option<String>) {
        let graph = self.graph;
        let Some(entity) = graph.entity(id) else {
            return;
        };
        let path = if path.is_empty() {
            entity.name.clone()
        } else {
            path.to_string()
        };

        if self.on_path.contains(&id) {
            tracing::debug!(path, entity = %entity.qualified_name(), "navigation cycle, not expanding");
            return;
        }
        if !self.seen.insert(path.clone()) {
            tracing::debug!(path, "duplicate route, keeping the first");
            return;
        }
        let key_field = crossed.then(|| {
            let last = path.rsplit('_').next().unwrap_or(&path);
            format!("{last}Id")
        });
        self.routes.push(Route {
            path: path.clone(),
            url: url.to_string(),
            target: id,
            key_field,
            via,
        });
        self.on_path.push(id);

        // Inherited navigations first; `base_chain` stops on a base cycle.
        for layer in graph.base_chain(id) {
            let Some(layer) = graph.entity(layer) else {
                continue;
            };
            let declared_in = layer.qualified_name();
            for nav in layer.members.iter().filter_map(|m| m.as_navigation()) {
                let next_path = format!("{path}_{}", nav.name);
                let next_url = format!("{url}/{}", nav.name);
                self.ty(&nav.ty, &next_path, &next_url, crossed, Some(declared_in.clone()));
            }
        }

        self.on_path.pop();
    }
}
