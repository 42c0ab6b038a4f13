//! Per-document type graph construction.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::document::{Document, DocumentStore};
use crate::error::{EdmError, Result};
use crate::graph::TypeGraph;
use crate::model::{
    ComplexType, EntityType, EnumType, Member, NavigationProperty, Node, NodeId, Permission,
    Property, TypeDef, TypeRef,
};
use crate::xml::Element;

/// Property names known to close reference cycles in the Redfish corpus.
pub const DEFAULT_CYCLE_DENYLIST: &[&str] = &[
    "SubProcessors",
    "AllocatedPools",
    "CapacitySources",
    "StorageGroups",
    "Steps",
    "MetricReportDefinition",
    "SubTasks",
    "DataProtectionLinesOfService",
];

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Members with these names are dropped before resolution and never
    /// count toward field numbering.
    pub cycle_denylist: BTreeSet<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            cycle_denylist: DEFAULT_CYCLE_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BuildOptions {
    pub fn without_denylist() -> Self {
        Self {
            cycle_denylist: BTreeSet::new(),
        }
    }
}

pub(crate) const DECLARATION_TAGS: [&str; 4] =
    ["EntityType", "EnumType", "ComplexType", "TypeDefinition"];

/// Builds one worker's sub-graph.
///
/// Every declaration is built at most once per `(document, namespace, name)`;
/// the node is allocated before its references are resolved, so a reference
/// cycle in the schema becomes a cycle in the graph.
pub struct GraphBuilder<'s> {
    pub(crate) store: &'s DocumentStore,
    options: &'s BuildOptions,
    pub(crate) graph: TypeGraph,
    memo: HashMap<(PathBuf, String, String), NodeId>,
}

impl<'s> GraphBuilder<'s> {
    pub fn new(store: &'s DocumentStore, options: &'s BuildOptions) -> Self {
        Self {
            store,
            options,
            graph: TypeGraph::new(),
            memo: HashMap::new(),
        }
    }

    /// Build every declaration of one document as a top-level type.
    pub fn ingest(mut self, path: &Path) -> Result<TypeGraph> {
        let doc = self.store.load(path)?;
        for (namespace, schema) in doc.schemas() {
            for element in &schema.children {
                if let Some(id) = self.build_declaration(&doc, namespace, element)? {
                    self.graph.mark_top_level(id);
                }
            }
        }
        tracing::debug!(
            path = %path.display(),
            nodes = self.graph.len(),
            top_level = self.graph.top_level().len(),
            "built document graph"
        );
        Ok(self.graph)
    }

    /// Build (or reuse) the node for one schema child. Returns `None` for
    /// children that are not type declarations.
    pub(crate) fn build_declaration(
        &mut self,
        doc: &Arc<Document>,
        namespace: &str,
        element: &Element,
    ) -> Result<Option<NodeId>> {
        if !DECLARATION_TAGS.contains(&element.tag.as_str()) {
            return Ok(None);
        }
        let Some(name) = element.attr("Name") else {
            return Ok(None);
        };
        let key = (doc.path.clone(), namespace.to_string(), name.to_string());
        if let Some(&id) = self.memo.get(&key) {
            return Ok(Some(id));
        }

        let id = match element.tag.as_str() {
            "EntityType" => self.build_entity(doc, namespace, name, element, key)?,
            "EnumType" => {
                let members = element
                    .children_tagged("Member")
                    .filter_map(|m| m.attr("Name"))
                    .map(str::to_string)
                    .collect();
                let id = self.graph.push(Node::Enum(EnumType {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    members,
                    origin: doc.path.clone(),
                }));
                self.memo.insert(key, id);
                id
            }
            "ComplexType" => {
                let id = self.graph.push(Node::Complex(ComplexType {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    origin: doc.path.clone(),
                }));
                self.memo.insert(key, id);
                id
            }
            _ => self.build_typedef(doc, namespace, name, element, key)?,
        };
        Ok(Some(id))
    }

    fn build_entity(
        &mut self,
        doc: &Arc<Document>,
        namespace: &str,
        name: &str,
        element: &Element,
        key: (PathBuf, String, String),
    ) -> Result<NodeId> {
        let id = self.graph.push(Node::Entity(EntityType {
            name: name.to_string(),
            namespace: namespace.to_string(),
            is_abstract: element.flag("Abstract"),
            base: None,
            ancestors: Vec::new(),
            members: Vec::new(),
            origin: doc.path.clone(),
        }));
        self.memo.insert(key, id);

        let mut base = None;
        let mut ancestors = Vec::new();
        if let Some(base_name) = element.attr("BaseType") {
            match self.resolve(base_name, doc)? {
                TypeRef::Node(base_id) => {
                    base = Some(base_id);
                    ancestors.push(base_id);
                    if let Some(parent) = self.graph.entity(base_id) {
                        ancestors.extend(parent.ancestors.iter().copied());
                    }
                }
                TypeRef::Primitive(_) | TypeRef::Unresolved(_) => {
                    self.unresolved(DiagnosticKind::UnresolvedBase, base_name, &doc.path);
                }
            }
        }

        let mut members = Vec::new();
        for child in &element.children {
            if let Some(member) = self.build_member(doc, child)? {
                members.push(member);
            }
        }

        if let Node::Entity(entity) = self.graph.node_mut(id) {
            entity.base = base;
            entity.ancestors = ancestors;
            entity.members = members;
        }
        Ok(id)
    }

    fn build_typedef(
        &mut self,
        doc: &Arc<Document>,
        namespace: &str,
        name: &str,
        element: &Element,
        key: (PathBuf, String, String),
    ) -> Result<NodeId> {
        let underlying_name = element
            .attr("UnderlyingType")
            .ok_or_else(|| missing(&doc.path, "TypeDefinition", "UnderlyingType"))?;
        let id = self.graph.push(Node::TypeDef(TypeDef {
            name: name.to_string(),
            namespace: namespace.to_string(),
            underlying: TypeRef::Unresolved(underlying_name.to_string()),
            origin: doc.path.clone(),
        }));
        self.memo.insert(key, id);

        let underlying = self.resolve(underlying_name, doc)?;
        if let TypeRef::Unresolved(_) = underlying {
            self.unresolved(DiagnosticKind::Unresolved, underlying_name, &doc.path);
        }
        if let Node::TypeDef(def) = self.graph.node_mut(id) {
            def.underlying = underlying;
        }
        Ok(id)
    }

    fn build_member(&mut self, doc: &Arc<Document>, element: &Element) -> Result<Option<Member>> {
        let navigation = match element.tag.as_str() {
            "Property" => false,
            "NavigationProperty" => true,
            _ => return Ok(None),
        };
        let name = element
            .attr("Name")
            .ok_or_else(|| missing(&doc.path, &element.tag, "Name"))?;
        if self.options.cycle_denylist.contains(name) {
            tracing::trace!(name, document = %doc.path.display(), "dropping denylisted member");
            return Ok(None);
        }
        let type_name = element
            .attr("Type")
            .ok_or_else(|| missing(&doc.path, &element.tag, "Type"))?;

        let ty = self.resolve(type_name, doc)?;
        if let TypeRef::Unresolved(_) = ty {
            self.unresolved(DiagnosticKind::Unresolved, type_name, &doc.path);
        }

        let annotations = Annotations::read(element);
        let member = if navigation {
            Member::Navigation(NavigationProperty {
                name: name.to_string(),
                ty,
                permission: annotations.permission,
                auto_expand: annotations.auto_expand,
                expand_references: annotations.expand_references,
                contains_target: element.flag("ContainsTarget"),
                description: annotations.description,
                long_description: annotations.long_description,
                origin: doc.path.clone(),
            })
        } else {
            Member::Property(Property {
                name: name.to_string(),
                ty,
                permission: annotations.permission,
                description: annotations.description,
                long_description: annotations.long_description,
                origin: doc.path.clone(),
            })
        };
        Ok(Some(member))
    }

    pub(crate) fn unresolved(&mut self, kind: DiagnosticKind, name: &str, document: &Path) {
        tracing::warn!(name, document = %document.display(), ?kind, "unable to resolve type");
        self.graph.report(Diagnostic::new(kind, name, document));
    }
}

#[derive(Debug, Default)]
struct Annotations {
    permission: Permission,
    auto_expand: bool,
    expand_references: bool,
    description: String,
    long_description: String,
}

impl Annotations {
    fn read(element: &Element) -> Self {
        let mut out = Annotations::default();
        for annotation in element.children_tagged("Annotation") {
            match annotation.attr("Term").unwrap_or_default() {
                "OData.Permissions" => {
                    if annotation.attr("EnumMember") == Some("OData.Permission/Read") {
                        out.permission = Permission::ReadOnly;
                    }
                }
                "OData.Description" => {
                    out.description = annotation.attr("String").unwrap_or_default().to_string();
                }
                "OData.LongDescription" => {
                    out.long_description =
                        annotation.attr("String").unwrap_or_default().to_string();
                }
                "OData.AutoExpand" => out.auto_expand = true,
                "OData.AutoExpandReferences" => out.expand_references = true,
                _ => {}
            }
        }
        out
    }
}

fn missing(path: &Path, element: &str, attribute: &'static str) -> EdmError {
    EdmError::MissingAttribute {
        path: path.to_path_buf(),
        element: element.to_string(),
        attribute,
    }
}
