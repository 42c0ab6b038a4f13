use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    /// A property or type definition names a type that no scope provides.
    Unresolved,
    /// An entity's `BaseType` could not be resolved; the entity has no base.
    UnresolvedBase,
    /// A scope entry matched more than one declaration and was skipped.
    Ambiguous,
}

/// A non-fatal resolution problem, reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub name: String,
    pub document: PathBuf,
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, name: impl Into<String>, document: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            name: name.into(),
            document: document.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            DiagnosticKind::Unresolved => "unresolved type",
            DiagnosticKind::UnresolvedBase => "unresolved base type",
            DiagnosticKind::Ambiguous => "ambiguous type",
        };
        write!(f, "{}: {what} `{}`", self.document.display(), self.name)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}
