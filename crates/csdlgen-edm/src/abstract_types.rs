//! Abstract-to-concrete reference rewriting.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::graph::TypeGraph;
use crate::model::{Node, NodeId, TypeRef};

type Identity = (String, PathBuf);

impl TypeGraph {
    /// Rewrite every reachable reference to an abstract entity so it points
    /// at the first concrete top-level entity realizing it.
    ///
    /// A concrete entity `C` realizes abstract `A` when walking `C`'s base
    /// chain (stopping at the first abstract node, or at a node without a
    /// base) ends on a node with `A`'s name and origin document. References
    /// with no realization are left alone. Returns the number of rewrites.
    pub fn resolve_abstract(&mut self) -> usize {
        let realizations = self.realizations();

        let mut rewrites = 0;
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut pending: Vec<NodeId> = self.top_level().to_vec();

        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            match self.node(id) {
                Node::Entity(entity) => {
                    let replacements: Vec<Option<TypeRef>> = entity
                        .members
                        .iter()
                        .map(|m| self.concrete_for(m.ty(), &realizations))
                        .collect();
                    pending.extend(entity.base);
                    if let Node::Entity(entity) = self.node_mut(id) {
                        for (member, replacement) in entity.members.iter_mut().zip(replacements) {
                            if let Some(replacement) = replacement {
                                *member.ty_mut() = replacement;
                                rewrites += 1;
                            }
                        }
                    }
                    if let Some(entity) = self.entity(id) {
                        pending.extend(entity.members.iter().filter_map(|m| m.ty().node()));
                    }
                }
                Node::Collection(collection) => {
                    if let Some(replacement) = self.concrete_for(&collection.contained, &realizations) {
                        if let Node::Collection(collection) = self.node_mut(id) {
                            collection.contained = replacement;
                            rewrites += 1;
                        }
                    }
                    if let Node::Collection(collection) = self.node(id) {
                        pending.extend(collection.contained.node());
                    }
                }
                Node::TypeDef(def) => pending.extend(def.underlying.node()),
                Node::Enum(_) | Node::Complex(_) => {}
            }
        }

        tracing::info!(rewrites, "resolved abstract references");
        rewrites
    }

    /// Map each abstract identity to its first concrete realization, in
    /// top-level order.
    fn realizations(&self) -> HashMap<Identity, NodeId> {
        let mut out = HashMap::new();
        for &id in self.top_level() {
            match self.entity(id) {
                Some(entity) if !entity.is_abstract => {}
                _ => continue,
            }
            let lowest = self.lowest_type(id);
            let node = self.node(lowest);
            out.entry((node.name().to_string(), node.origin().to_path_buf()))
                .or_insert(id);
        }
        out
    }

    /// Walk the base chain until an abstract entity, a base-less entity, or a
    /// non-entity is reached.
    pub fn lowest_type(&self, id: NodeId) -> NodeId {
        let mut current = id;
        let mut seen = HashSet::new();
        while seen.insert(current) {
            let Some(entity) = self.entity(current) else {
                break;
            };
            if entity.is_abstract {
                break;
            }
            match entity.base {
                Some(base) => current = base,
                None => break,
            }
        }
        current
    }

    fn concrete_for(&self, ty: &TypeRef, realizations: &HashMap<Identity, NodeId>) -> Option<TypeRef> {
        let id = ty.node()?;
        let entity = self.entity(id)?;
        if !entity.is_abstract {
            return None;
        }
        let key = (entity.name.clone(), entity.origin.clone());
        match realizations.get(&key) {
            Some(&concrete) if concrete != id => Some(TypeRef::Node(concrete)),
            _ => None,
        }
    }
}
