//! Type-name resolution against a document's reference scope.

use std::sync::Arc;

use crate::builder::{GraphBuilder, DECLARATION_TAGS};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::document::{matches_name, Document, ScopeEntry};
use crate::error::Result;
use crate::model::{Collection, Node, Primitive, TypeRef};
use crate::xml::Element;

impl GraphBuilder<'_> {
    /// Resolve `name` as seen from `doc`.
    ///
    /// Order: `Collection(..)` peeling, EDM primitives, each reference in
    /// declaration order (first unique hit wins, ambiguous entries are
    /// skipped), then the document itself. A miss yields
    /// [`TypeRef::Unresolved`]; only loading/fetch failures are errors.
    pub fn resolve(&mut self, name: &str, doc: &Arc<Document>) -> Result<TypeRef> {
        if let Some(inner) = name
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let contained = self.resolve(inner, doc)?;
            let id = self.graph.push(Node::Collection(Collection {
                name: name.to_string(),
                contained,
                origin: doc.path.clone(),
            }));
            return Ok(TypeRef::Node(id));
        }

        if let Some(primitive) = Primitive::from_edm(name) {
            return Ok(TypeRef::Primitive(primitive));
        }

        for entry in &doc.scope {
            let target = self.store.load_reference(&entry.uri)?;
            let hits = find_declarations(&target, Some(entry), name);
            match hits.as_slice() {
                [] => continue,
                [(namespace, element)] => {
                    if let Some(id) = self.build_declaration(&target, namespace, element)? {
                        return Ok(TypeRef::Node(id));
                    }
                }
                _ => self.ambiguous(name, doc, entry, hits.len()),
            }
        }

        let hits = find_declarations(doc, None, name);
        if let [(namespace, element)] = hits.as_slice() {
            if let Some(id) = self.build_declaration(doc, namespace, element)? {
                return Ok(TypeRef::Node(id));
            }
        }
        if hits.len() > 1 {
            tracing::warn!(name, document = %doc.path.display(), matches = hits.len(), "ambiguous type in own document");
            self.graph.report(
                Diagnostic::new(DiagnosticKind::Ambiguous, name, &doc.path)
                    .with_detail(format!("{} matches in own document", hits.len())),
            );
        }
        Ok(TypeRef::Unresolved(name.to_string()))
    }

    fn ambiguous(&mut self, name: &str, doc: &Document, entry: &ScopeEntry, matches: usize) {
        tracing::warn!(
            name,
            document = %doc.path.display(),
            reference = %entry.uri,
            matches,
            "ambiguous type, skipping reference"
        );
        self.graph.report(
            Diagnostic::new(DiagnosticKind::Ambiguous, name, &doc.path)
                .with_detail(format!("{matches} matches in {}", entry.uri)),
        );
    }
}

/// Declarations in `doc` whose bare or qualified name equals `wanted`.
///
/// With a scope entry, only the namespaces it includes are searched (an
/// entry that includes nothing searches everything).
pub(crate) fn find_declarations<'d>(
    doc: &'d Document,
    entry: Option<&ScopeEntry>,
    wanted: &str,
) -> Vec<(&'d str, &'d Element)> {
    let mut hits = Vec::new();
    for (namespace, schema) in doc.schemas() {
        if let Some(entry) = entry {
            if !entry.namespaces.is_empty() && !entry.includes(namespace) {
                continue;
            }
        }
        for element in &schema.children {
            if !DECLARATION_TAGS.contains(&element.tag.as_str()) {
                continue;
            }
            let Some(name) = element.attr("Name") else {
                continue;
            };
            if matches_name(entry, namespace, name, wanted) {
                hits.push((namespace, element));
            }
        }
    }
    hits
}
