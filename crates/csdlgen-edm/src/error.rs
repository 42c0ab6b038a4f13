use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while loading or resolving schema documents.
///
/// Anything recoverable (an unknown type name, an ambiguous lookup) is a
/// [`crate::Diagnostic`] instead and never reaches this type.
#[derive(Debug, Error)]
pub enum EdmError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("{path}: <{element}> is missing required attribute `{attribute}`")]
    MissingAttribute {
        path: PathBuf,
        element: String,
        attribute: &'static str,
    },

    #[error("{path}: document has no root element")]
    Empty { path: PathBuf },

    #[error("failed to fetch {uri}: {message}")]
    Fetch { uri: String, message: String },

    #[error("{uri} is not cached under {dir} and fetching is disabled")]
    Offline { uri: String, dir: PathBuf },

    #[error("expected exactly one root entity named `{name}`, found {found}")]
    NoUniqueRoot { name: String, found: usize },
}

pub type Result<T> = std::result::Result<T, EdmError>;
