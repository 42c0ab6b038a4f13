//! Handler and converter emission.
//!
//! Every route gets a public handler that fetches its document and hands it
//! to the converter for the route's message. Converters are emitted once per
//! message, on first request, so inline expansion through a navigation cycle
//! ends in a recursive call instead of unbounded code.

use std::collections::{HashSet, VecDeque};

use csdlgen_edm::{Member, Node, NodeId, Primitive, Route, TypeGraph, TypeRef};
use csdlgen_proto::render::{is_collection, package_of, Catalog};
use csdlgen_proto::service::filter_spec_name;

use crate::naming::{field_ident, module_ident, snake, type_ident};
use crate::writer::CodeWriter;
use crate::{ConvertOptions, Placeholder};

/// How one JSON value turns into one element of a field.
enum Conversion {
    /// `Option<T>` expression assigned as-is.
    Scalar(String),
    /// `Option<T>` expression for a message; singular fields wrap it in `Some`.
    Message(String),
    /// Not converted; the reason ends up in a comment.
    Skipped(String),
}

pub(crate) struct Emitter<'g> {
    graph: &'g TypeGraph,
    catalog: Catalog,
    options: &'g ConvertOptions,
    requested: HashSet<NodeId>,
    pending: VecDeque<NodeId>,
    pub(crate) handlers: usize,
    pub(crate) converters: usize,
    pub(crate) placeholders: Vec<Placeholder>,
}

impl<'g> Emitter<'g> {
    pub(crate) fn new(graph: &'g TypeGraph, options: &'g ConvertOptions) -> Self {
        Self {
            graph,
            catalog: Catalog::new(graph),
            options,
            requested: HashSet::new(),
            pending: VecDeque::new(),
            handlers: 0,
            converters: 0,
            placeholders: Vec::new(),
        }
    }

    pub(crate) fn file(&mut self, routes: &[Route]) -> String {
        let mut w = CodeWriter::new();
        self.prelude(&mut w);
        for route in routes {
            self.handler(&mut w, route);
        }
        while let Some(id) = self.pending.pop_front() {
            self.converter(&mut w, id);
        }
        w.finish()
    }

    // ========================================================================
    // Paths and names
    // ========================================================================

    fn message_path(&self, id: NodeId) -> String {
        let node = self.graph.node(id);
        format!(
            "{}::{}::{}",
            self.options.proto_module,
            module_ident(package_of(node)),
            type_ident(node.name())
        )
    }

    fn navigation_reference_path(&self) -> String {
        format!("{}::NavigationReference", self.options.proto_module)
    }

    fn converter_name(&self, id: NodeId) -> String {
        let node = self.graph.node(id);
        format!("{}_{}_from_json", snake(package_of(node)), snake(node.name()))
    }

    /// Queue a converter for `id` unless one is already queued or written.
    fn request(&mut self, id: NodeId) -> String {
        if self.requested.insert(id) {
            self.pending.push_back(id);
        }
        self.converter_name(id)
    }

    // ========================================================================
    // File sections
    // ========================================================================

    fn prelude(&self, w: &mut CodeWriter) {
        let nav = self.navigation_reference_path();
        w.line("// @generated by csdlgen. Do not edit.");
        w.line("//");
        w.line(format!(
            "// JSON to prost conversion, one handler per `{}` rpc.",
            self.options.service.service_name
        ));
        w.blank();
        w.line("#![allow(clippy::all, dead_code, unused_variables)]");
        w.blank();
        w.line("use serde_json::Value;");
        w.blank();
        w.line("/// Where handlers get their JSON documents from.");
        w.open("pub trait JsonSource {");
        w.line("type Error;");
        w.blank();
        w.line("/// Fetch and parse the resource at `uri`.");
        w.line("fn request_uri(&self, uri: &str) -> Result<Value, Self::Error>;");
        w.blank();
        w.line("/// Error for a keyed request that does not carry its key.");
        w.line("fn missing_key(&self, field: &'static str) -> Self::Error;");
        w.close("}");
        w.blank();
        w.line("/// `{\"@odata.id\": \"...\"}` as a reference wrapper.");
        w.open(format!("pub fn navigation_reference_from_json(value: &Value) -> {nav} {{"));
        w.open(format!("{nav} {{"));
        w.line("id: value");
        w.line("    .get(\"@odata.id\")");
        w.line("    .and_then(Value::as_str)");
        w.line("    .unwrap_or_default()");
        w.line("    .to_string(),");
        w.close("}");
        w.close("}");
    }

    fn handler(&mut self, w: &mut CodeWriter, route: &Route) {
        let Some(target) = self.catalog.canonical(self.graph, route.target) else {
            tracing::warn!(path = %route.path, "route target was never emitted, skipping handler");
            return;
        };
        let converter = self.request(target);
        let spec = format!(
            "{}::{}::{}",
            self.options.proto_module,
            module_ident(&self.options.service.service_package),
            type_ident(&filter_spec_name(route))
        );
        let request = if route.key_field.is_some() { "request" } else { "_request" };

        w.blank();
        match &route.key_field {
            Some(key) => w.line(format!("/// `GET` the `{key}` member below `{}`.", route.url)),
            None => w.line(format!("/// `GET {}`", route.url)),
        }
        w.open(format!(
            "pub fn get_{}<S: JsonSource>(source: &S, {request}: &{spec}) -> Result<{}, S::Error> {{",
            snake(&route.path),
            self.message_path(target)
        ));
        match &route.key_field {
            Some(key) => {
                w.line("let uri = request");
                w.line(format!("    .{}", field_ident(key)));
                w.line("    .as_ref()");
                w.line("    .map(|reference| reference.id.as_str())");
                w.line(format!("    .ok_or_else(|| source.missing_key(\"{key}\"))?;"));
                w.line("let value0 = source.request_uri(uri)?;");
            }
            None => w.line(format!("let value0 = source.request_uri(\"{}\")?;", route.url)),
        }
        w.line(format!("Ok({converter}(&value0))"));
        w.close("}");
        self.handlers += 1;
    }

    fn converter(&mut self, w: &mut CodeWriter, id: NodeId) {
        let graph = self.graph;
        let path = self.message_path(id);
        let name = self.converter_name(id);

        // Derived layers first: a redeclared name binds to the most derived
        // declaration.
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        for layer in graph.base_chain(id).into_iter().rev() {
            let Some(entity) = graph.entity(layer) else {
                continue;
            };
            let owner = entity.qualified_name();
            for member in &entity.members {
                if seen.insert(member.name()) {
                    members.push((member, owner.clone()));
                }
            }
        }

        w.blank();
        if members.is_empty() {
            w.open(format!("fn {name}(_value: &Value) -> {path} {{"));
            w.line(format!("{path}::default()"));
            w.close("}");
            self.converters += 1;
            return;
        }

        w.open(format!("fn {name}(value0: &Value) -> {path} {{"));
        w.line(format!("let mut message = {path}::default();"));
        w.open("let Some(object) = value0.as_object() else {");
        w.line("return message;");
        w.close("};");
        w.open("for (key, value1) in object {");
        w.open("match key.as_str() {");
        for (member, owner) in members {
            self.member(w, member, &owner, 1);
        }
        w.line("_ => {}");
        w.close("}");
        w.close("}");
        w.line("message");
        w.close("}");
        self.converters += 1;
    }

    fn member(&mut self, w: &mut CodeWriter, member: &Member, owner: &str, level: usize) {
        let graph = self.graph;
        let target = format!("message.{}", field_ident(member.name()));
        let value = format!("value{level}");

        let peeled = graph.peel_typedefs(member.ty());
        let (repeated, element) = match peeled.node().map(|id| graph.node(id)) {
            Some(Node::Collection(collection)) => (true, &collection.contained),
            _ => (false, peeled),
        };
        let binding = if repeated {
            format!("value{}", level + 1)
        } else {
            value.clone()
        };

        let conversion = match member {
            Member::Navigation(nav) if !nav.is_inlined() => Conversion::Message(format!(
                "{binding}.is_object().then(|| navigation_reference_from_json({binding}))"
            )),
            _ => self.element(element, &binding, owner, member.name()),
        };
        // Non-inlined navigations mirror the proto rendering, which only
        // looks for a collection once type definitions are stripped.
        let repeated = match member {
            Member::Navigation(nav) if !nav.is_inlined() => is_collection(graph, &nav.ty),
            _ => repeated,
        };

        w.open(format!("\"{}\" => {{", member.name()));
        match conversion {
            Conversion::Skipped(reason) => w.line(format!("// {}: {reason}", member.name())),
            Conversion::Scalar(expr) | Conversion::Message(expr) if repeated => {
                let items = format!("items{}", level + 1);
                w.open(format!("if let Some({items}) = {value}.as_array() {{"));
                w.open(format!("for {binding} in {items} {{"));
                w.open(format!("if let Some(item) = {expr} {{"));
                w.line(format!("{target}.push(item);"));
                w.close("}");
                w.close("}");
                w.close("}");
            }
            Conversion::Scalar(expr) => {
                w.open(format!("if let Some(item) = {expr} {{"));
                w.line(format!("{target} = item;"));
                w.close("}");
            }
            Conversion::Message(expr) => {
                // prost boxes singular fields of recursive messages; `into`
                // covers both `Option<T>` and `Option<Box<T>>`.
                w.open(format!("if let Some(item) = {expr} {{"));
                w.line(format!("{target} = Some(item.into());"));
                w.close("}");
            }
        }
        w.close("}");
    }

    fn element(&mut self, ty: &TypeRef, value: &str, owner: &str, field: &str) -> Conversion {
        let graph = self.graph;
        match graph.peel_typedefs(ty) {
            TypeRef::Primitive(primitive) => self.primitive(*primitive, value, owner, field),
            TypeRef::Unresolved(name) => Conversion::Skipped(format!("unresolved type `{name}`, not converted")),
            TypeRef::Node(id) => match graph.node(*id) {
                Node::Collection(_) => Conversion::Skipped("nested collection, not converted".into()),
                Node::TypeDef(_) => Conversion::Skipped("type definition cycle, not converted".into()),
                Node::Complex(c) => Conversion::Skipped(format!("open type `{}`, not decomposed", c.name)),
                Node::Enum(e) => match self.catalog.canonical(graph, *id) {
                    Some(canonical) => Conversion::Scalar(format!(
                        "{value}.as_str().and_then(|s| {}::from_str_name(&format!(\"{}_{{s}}\"))).map(|e| e as i32)",
                        self.message_path(canonical),
                        e.name
                    )),
                    None => Conversion::Skipped(format!("enum `{}` was never emitted", e.name)),
                },
                Node::Entity(e) => match self.catalog.canonical(graph, *id) {
                    Some(canonical) => {
                        let converter = self.request(canonical);
                        Conversion::Message(format!("{value}.is_object().then(|| {converter}({value}))"))
                    }
                    None => Conversion::Skipped(format!("entity `{}` was never emitted", e.name)),
                },
            },
        }
    }

    fn primitive(&mut self, primitive: Primitive, value: &str, owner: &str, field: &str) -> Conversion {
        let expr = match primitive {
            Primitive::String | Primitive::Guid => format!("{value}.as_str().map(str::to_string)"),
            Primitive::Boolean => format!("{value}.as_bool()"),
            Primitive::Decimal => format!("{value}.as_f64()"),
            Primitive::Int64 => format!("{value}.as_i64()"),
            Primitive::Int32 => format!("{value}.as_i64().and_then(|n| i32::try_from(n).ok())"),
            Primitive::Time | Primitive::Duration => {
                self.placeholders.push(Placeholder {
                    owner: owner.to_string(),
                    field: field.to_string(),
                    primitive,
                });
                return Conversion::Skipped(format!(
                    "UNIMPLEMENTED {} conversion, field left unset",
                    primitive.edm_name()
                ));
            }
        };
        Conversion::Scalar(expr)
    }
}
