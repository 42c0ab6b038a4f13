//! Type graph nodes.
//!
//! Nodes live in a [`crate::TypeGraph`] arena and refer to each other through
//! [`NodeId`]. A node's identity never changes once allocated; passes only
//! rewrite the [`TypeRef`]s held by members and collections.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn offset(self, by: u32) -> Self {
        NodeId(self.0 + by)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Primitives
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Boolean,
    Duration,
    Time,
    Decimal,
    Int64,
    Int32,
    Guid,
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::String,
        Primitive::Boolean,
        Primitive::Duration,
        Primitive::Time,
        Primitive::Decimal,
        Primitive::Int64,
        Primitive::Int32,
        Primitive::Guid,
    ];

    pub fn from_edm(name: &str) -> Option<Self> {
        Some(match name {
            "Edm.String" => Primitive::String,
            "Edm.Boolean" => Primitive::Boolean,
            "Edm.Decimal" => Primitive::Decimal,
            "Edm.Int64" => Primitive::Int64,
            "Edm.Int32" => Primitive::Int32,
            "Edm.DateTimeOffset" => Primitive::Time,
            "Edm.Duration" => Primitive::Duration,
            "Edm.Guid" => Primitive::Guid,
            _ => return None,
        })
    }

    pub fn edm_name(self) -> &'static str {
        match self {
            Primitive::String => "Edm.String",
            Primitive::Boolean => "Edm.Boolean",
            Primitive::Decimal => "Edm.Decimal",
            Primitive::Int64 => "Edm.Int64",
            Primitive::Int32 => "Edm.Int32",
            Primitive::Time => "Edm.DateTimeOffset",
            Primitive::Duration => "Edm.Duration",
            Primitive::Guid => "Edm.Guid",
        }
    }
}

// ============================================================================
// References
// ============================================================================

/// What a property, collection or type definition points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(Primitive),
    Node(NodeId),
    /// The declared type name could not be resolved. Kept so emission can
    /// degrade the field instead of dropping it.
    Unresolved(String),
}

impl TypeRef {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            TypeRef::Node(id) => Some(*id),
            TypeRef::Primitive(_) | TypeRef::Unresolved(_) => None,
        }
    }

    fn remap(&mut self, by: u32) {
        if let TypeRef::Node(id) = self {
            *id = id.offset(by);
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone)]
pub enum Node {
    Entity(EntityType),
    Enum(EnumType),
    Complex(ComplexType),
    TypeDef(TypeDef),
    Collection(Collection),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Entity(e) => &e.name,
            Node::Enum(e) => &e.name,
            Node::Complex(c) => &c.name,
            Node::TypeDef(t) => &t.name,
            Node::Collection(c) => &c.name,
        }
    }

    /// Owning namespace; collections have none of their own.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Node::Entity(e) => Some(&e.namespace),
            Node::Enum(e) => Some(&e.namespace),
            Node::Complex(c) => Some(&c.namespace),
            Node::TypeDef(t) => Some(&t.namespace),
            Node::Collection(_) => None,
        }
    }

    pub fn origin(&self) -> &Path {
        match self {
            Node::Entity(e) => &e.origin,
            Node::Enum(e) => &e.origin,
            Node::Complex(c) => &c.origin,
            Node::TypeDef(t) => &t.origin,
            Node::Collection(c) => &c.origin,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityType> {
        match self {
            Node::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn remap(&mut self, by: u32) {
        match self {
            Node::Entity(e) => {
                if let Some(base) = e.base.as_mut() {
                    *base = base.offset(by);
                }
                for ancestor in &mut e.ancestors {
                    *ancestor = ancestor.offset(by);
                }
                for member in &mut e.members {
                    member.ty_mut().remap(by);
                }
            }
            Node::TypeDef(t) => t.underlying.remap(by),
            Node::Collection(c) => c.contained.remap(by),
            Node::Enum(_) | Node::Complex(_) => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityType {
    pub name: String,
    pub namespace: String,
    pub is_abstract: bool,
    pub base: Option<NodeId>,
    /// Flattened ancestor list, nearest base first.
    pub ancestors: Vec<NodeId>,
    /// Directly declared members only; inherited members stay on the bases.
    pub members: Vec<Member>,
    pub origin: PathBuf,
}

impl EntityType {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub namespace: String,
    /// Member names; position is the wire value.
    pub members: Vec<String>,
    pub origin: PathBuf,
}

/// Opaque structured value; its fields are never decomposed.
#[derive(Debug, Clone)]
pub struct ComplexType {
    pub name: String,
    pub namespace: String,
    pub origin: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub namespace: String,
    pub underlying: TypeRef,
    pub origin: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Collection {
    /// Declared spelling, e.g. `Collection(Chassis.Chassis)`.
    pub name: String,
    pub contained: TypeRef,
    pub origin: PathBuf,
}

// ============================================================================
// Members
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    ReadOnly,
    #[default]
    ReadWrite,
}

#[derive(Debug, Clone)]
pub enum Member {
    Property(Property),
    Navigation(NavigationProperty),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Property(p) => &p.name,
            Member::Navigation(n) => &n.name,
        }
    }

    pub fn ty(&self) -> &TypeRef {
        match self {
            Member::Property(p) => &p.ty,
            Member::Navigation(n) => &n.ty,
        }
    }

    pub fn ty_mut(&mut self) -> &mut TypeRef {
        match self {
            Member::Property(p) => &mut p.ty,
            Member::Navigation(n) => &mut n.ty,
        }
    }

    pub fn as_navigation(&self) -> Option<&NavigationProperty> {
        match self {
            Member::Navigation(n) => Some(n),
            Member::Property(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub ty: TypeRef,
    pub permission: Permission,
    pub description: String,
    pub long_description: String,
    pub origin: PathBuf,
}

#[derive(Debug, Clone)]
pub struct NavigationProperty {
    pub name: String,
    pub ty: TypeRef,
    pub permission: Permission,
    pub auto_expand: bool,
    pub expand_references: bool,
    pub contains_target: bool,
    pub description: String,
    pub long_description: String,
    pub origin: PathBuf,
}

impl NavigationProperty {
    /// Inlined targets are rendered as the target's own message; everything
    /// else is an opaque reference token.
    pub fn is_inlined(&self) -> bool {
        self.auto_expand || self.contains_target
    }
}

/// First dotted segment of a namespace, used as the proto package.
pub fn top_level_segment(namespace: &str) -> &str {
    namespace.split('.').next().unwrap_or(namespace)
}

/// File stem of a schema document, used as the output directory.
pub fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
