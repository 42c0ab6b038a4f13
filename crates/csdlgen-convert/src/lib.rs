//! Conversion-code back-end.
//!
//! Generates a Rust module that turns Redfish JSON documents into the
//! prost messages generated from our protos: one `get_*` handler per route
//! from the root entity, plus a private `*_from_json` converter per message
//! the handlers reach. The generated module depends on `serde_json` and on
//! the prost output mounted at [`ConvertOptions::proto_module`].

pub mod naming;
pub mod writer;

mod emit;

use std::fmt;

use csdlgen_edm::{discover_routes, find_root, EdmError, Primitive, TypeGraph};
use csdlgen_proto::ProtoOptions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Edm(#[from] EdmError),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Root entity, root URL and service package shared with the proto
    /// back-end, so handler and request types line up with `entry.proto`.
    pub service: ProtoOptions,
    /// Rust path of the module holding prost's output, e.g. `crate::proto`.
    pub proto_module: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            service: ProtoOptions::default(),
            proto_module: "crate::proto".to_string(),
        }
    }
}

/// A field whose conversion was not generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Qualified name of the declaring entity.
    pub owner: String,
    pub field: String,
    pub primitive: Primitive,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {} conversion not implemented",
            self.owner,
            self.field,
            self.primitive.edm_name()
        )
    }
}

#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub contents: String,
    pub handlers: usize,
    pub converters: usize,
    pub placeholders: Vec<Placeholder>,
}

pub fn generate(graph: &TypeGraph, options: &ConvertOptions) -> Result<HandlerOutput> {
    let root = find_root(graph, &options.service.root_entity)?;
    let routes = discover_routes(graph, root, &options.service.root_url);

    let mut emitter = emit::Emitter::new(graph, options);
    let contents = emitter.file(&routes);

    if !emitter.placeholders.is_empty() {
        tracing::warn!(
            count = emitter.placeholders.len(),
            "handlers contain unimplemented time/duration conversions"
        );
    }
    tracing::info!(
        handlers = emitter.handlers,
        converters = emitter.converters,
        "generated conversion handlers"
    );

    Ok(HandlerOutput {
        contents,
        handlers: emitter.handlers,
        converters: emitter.converters,
        placeholders: emitter.placeholders,
    })
}
