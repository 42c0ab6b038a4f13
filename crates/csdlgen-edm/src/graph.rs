//! The node arena shared by every pass.

use std::collections::HashMap;

use crate::diagnostics::Diagnostic;
use crate::model::{top_level_segment, EntityType, Node, NodeId, TypeRef};

#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    nodes: Vec<Node>,
    /// Declarations ingested as top-level types, in processing order.
    top_level: Vec<NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entity(&self, id: NodeId) -> Option<&EntityType> {
        self.node(id).as_entity()
    }

    pub fn top_level(&self) -> &[NodeId] {
        &self.top_level
    }

    pub fn mark_top_level(&mut self, id: NodeId) {
        self.top_level.push(id);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Append another graph, shifting its ids past ours. Top-level order is
    /// ours followed by theirs.
    pub fn absorb(&mut self, other: TypeGraph) {
        let by = self.nodes.len() as u32;
        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            node.remap(by);
            node
        }));
        self.top_level
            .extend(other.top_level.into_iter().map(|id| id.offset(by)));
        self.diagnostics.extend(other.diagnostics);
    }

    /// Concatenate per-document graphs in the given order.
    pub fn merge(parts: impl IntoIterator<Item = TypeGraph>) -> TypeGraph {
        let mut merged = TypeGraph::new();
        for part in parts {
            merged.absorb(part);
        }
        merged
    }

    /// Collapse top-level declarations to one per
    /// `(top-level namespace segment, name)`, keeping the last one seen.
    /// Each key keeps the position of its first occurrence.
    pub fn dedup(&mut self) {
        let mut slots: HashMap<(String, String), usize> = HashMap::new();
        let mut kept: Vec<NodeId> = Vec::new();
        for &id in &self.top_level {
            let node = &self.nodes[id.index()];
            let key = (
                top_level_segment(node.namespace().unwrap_or_default()).to_string(),
                node.name().to_string(),
            );
            match slots.get(&key) {
                Some(&slot) => kept[slot] = id,
                None => {
                    slots.insert(key, kept.len());
                    kept.push(id);
                }
            }
        }
        let dropped = self.top_level.len() - kept.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = kept.len(), "collapsed duplicate declarations");
        }
        self.top_level = kept;
    }

    /// Order top-level declarations by case-insensitive name, with
    /// declarations whose name starts with `first` ahead of everything else.
    pub fn sort_top_level(&mut self, first: &str) {
        let nodes = &self.nodes;
        self.top_level.sort_by_cached_key(|id| {
            let name = nodes[id.index()].name();
            (!name.starts_with(first), name.to_lowercase())
        });
    }

    /// Base chain of an entity, base-most first, ending with the entity.
    /// Non-entity bases end the chain.
    pub fn base_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(base) = self.entity(current).and_then(|e| e.base) {
            if chain.contains(&base) || self.entity(base).is_none() {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain.reverse();
        chain
    }

    /// Strip type definitions until something that is not one remains.
    pub fn peel_typedefs<'a>(&'a self, mut ty: &'a TypeRef) -> &'a TypeRef {
        let mut hops = 0;
        while let TypeRef::Node(id) = ty {
            match self.node(*id) {
                Node::TypeDef(def) if hops < self.nodes.len() => {
                    ty = &def.underlying;
                    hops += 1;
                }
                _ => break,
            }
        }
        ty
    }

    /// Human-readable name of a reference, for comments and logs.
    pub fn describe(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Primitive(p) => p.edm_name().to_string(),
            TypeRef::Node(id) => {
                let node = self.node(*id);
                match node.namespace() {
                    Some(ns) => format!("{ns}.{}", node.name()),
                    None => node.name().to_string(),
                }
            }
            TypeRef::Unresolved(name) => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, ComplexType, EntityType, Member, Permission, Property, Primitive};
    use std::path::PathBuf;

    fn complex(ns: &str, name: &str, origin: &str) -> Node {
        Node::Complex(ComplexType {
            name: name.into(),
            namespace: ns.into(),
            origin: PathBuf::from(origin),
        })
    }

    fn entity(name: &str, base: Option<NodeId>) -> EntityType {
        EntityType {
            name: name.into(),
            namespace: "Ns.v1_0_0".into(),
            is_abstract: false,
            base,
            ancestors: base.into_iter().collect(),
            members: Vec::new(),
            origin: PathBuf::from("Ns_v1.xml"),
        }
    }

    #[test]
    fn dedup_keeps_last_definition_per_root_and_name() {
        let mut graph = TypeGraph::new();
        let a = graph.push(complex("Thing.v1_0_0", "Thing", "a.xml"));
        let other = graph.push(complex("Other", "Thing", "b.xml"));
        let b = graph.push(complex("Thing.v1_1_0", "Thing", "c.xml"));
        for id in [a, other, b] {
            graph.mark_top_level(id);
        }
        graph.dedup();
        assert_eq!(graph.top_level(), &[b, other]);
    }

    proptest::proptest! {
        #[test]
        fn dedup_is_one_last_definition_per_key(
            decls in proptest::collection::vec((0..3usize, 0..4usize, 0..3usize), 0..24)
        ) {
            let mut graph = TypeGraph::new();
            let mut expected: Vec<((usize, usize), NodeId)> = Vec::new();
            for (root, name, version) in decls {
                let ns = format!("Root{root}.v1_{version}_0");
                let id = graph.push(complex(&ns, &format!("Name{name}"), "x.xml"));
                graph.mark_top_level(id);
                match expected.iter_mut().find(|(key, _)| *key == (root, name)) {
                    Some(slot) => slot.1 = id,
                    None => expected.push(((root, name), id)),
                }
            }
            graph.dedup();
            let ids: Vec<NodeId> = expected.into_iter().map(|(_, id)| id).collect();
            proptest::prop_assert_eq!(graph.top_level(), ids.as_slice());
        }
    }

    #[test]
    fn absorb_shifts_every_reference() {
        let mut left = TypeGraph::new();
        let l = left.push(complex("L", "L", "l.xml"));
        left.mark_top_level(l);

        let mut right = TypeGraph::new();
        let inner = right.push(complex("R", "Inner", "r.xml"));
        let coll = right.push(Node::Collection(Collection {
            name: "Collection(R.Inner)".into(),
            contained: TypeRef::Node(inner),
            origin: PathBuf::from("r.xml"),
        }));
        let mut e = entity("E", None);
        e.members.push(Member::Property(Property {
            name: "Items".into(),
            ty: TypeRef::Node(coll),
            permission: Permission::ReadWrite,
            description: String::new(),
            long_description: String::new(),
            origin: PathBuf::from("r.xml"),
        }));
        let e = right.push(Node::Entity(e));
        right.mark_top_level(e);

        let merged = TypeGraph::merge([left, right]);
        assert_eq!(merged.len(), 4);
        let shifted_e = merged.top_level()[1];
        let entity = merged.entity(shifted_e).unwrap();
        let coll_id = entity.members[0].ty().node().unwrap();
        match merged.node(coll_id) {
            Node::Collection(c) => assert_eq!(merged.node(c.contained.node().unwrap()).name(), "Inner"),
            other => panic!("expected collection, got {other:?}"),
        }
    }

    #[test]
    fn base_chain_is_base_most_first() {
        let mut graph = TypeGraph::new();
        let root = graph.push(Node::Entity(entity("Resource", None)));
        let mid = graph.push(Node::Entity(entity("Chassis", Some(root))));
        let leaf = graph.push(Node::Entity(entity("Chassis2", Some(mid))));
        assert_eq!(graph.base_chain(leaf), vec![root, mid, leaf]);
    }

    #[test]
    fn sort_puts_root_name_first_then_case_insensitive() {
        let mut graph = TypeGraph::new();
        let b = graph.push(complex("N", "beta", "x.xml"));
        let a = graph.push(complex("N", "Alpha", "x.xml"));
        let root = graph.push(complex("N", "ServiceRoot", "x.xml"));
        for id in [b, a, root] {
            graph.mark_top_level(id);
        }
        graph.sort_top_level("ServiceRoot");
        assert_eq!(graph.top_level(), &[root, a, b]);
    }

    #[test]
    fn describe_names_primitives_and_nodes() {
        let mut graph = TypeGraph::new();
        let c = graph.push(complex("Ns", "Location", "x.xml"));
        assert_eq!(graph.describe(&TypeRef::Primitive(Primitive::Int64)), "Edm.Int64");
        assert_eq!(graph.describe(&TypeRef::Node(c)), "Ns.Location");
    }
}
