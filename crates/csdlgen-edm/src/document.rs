//! Schema documents and the parsed-document cache.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use url::Url;

use crate::error::{EdmError, Result};
use crate::xml::{self, Element};

/// Network collaborator: returns the raw bytes behind `uri`, failing on any
/// non-success response.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// One `(namespace, alias)` pair made visible by an `Include`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedNamespace {
    pub namespace: String,
    pub alias: String,
}

/// One `Reference` declaration: where to find a document and which of its
/// namespaces are in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    pub uri: String,
    pub namespaces: Vec<IncludedNamespace>,
}

impl ScopeEntry {
    pub fn includes(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|n| n.namespace == namespace)
    }

    fn alias_of(&self, namespace: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|n| n.namespace == namespace && n.alias != n.namespace)
            .map(|n| n.alias.as_str())
    }
}

#[derive(Debug)]
pub struct Document {
    pub path: PathBuf,
    pub root: Element,
    /// Reference declarations in document order.
    pub scope: Vec<ScopeEntry>,
}

impl Document {
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let root = xml::parse_document(text)
            .map_err(|source| EdmError::Xml {
                path: path.clone(),
                source,
            })?
            .ok_or_else(|| EdmError::Empty { path: path.clone() })?;
        let scope = read_scope(&path, &root)?;
        Ok(Self { path, root, scope })
    }

    /// `(namespace, Schema element)` for every schema block in the document.
    pub fn schemas(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.root
            .children_tagged("DataServices")
            .flat_map(|ds| ds.children_tagged("Schema"))
            .filter_map(|schema| schema.attr("Namespace").map(|ns| (ns, schema)))
    }

}

fn read_scope(path: &Path, root: &Element) -> Result<Vec<ScopeEntry>> {
    let mut scope = Vec::new();
    for reference in root.children_tagged("Reference") {
        let uri = reference
            .attr("Uri")
            .ok_or_else(|| missing(path, "Reference", "Uri"))?;
        let mut namespaces = Vec::new();
        for include in reference.children_tagged("Include") {
            let namespace = include
                .attr("Namespace")
                .ok_or_else(|| missing(path, "Include", "Namespace"))?;
            namespaces.push(IncludedNamespace {
                namespace: namespace.to_string(),
                alias: include.attr("Alias").unwrap_or(namespace).to_string(),
            });
        }
        scope.push(ScopeEntry {
            uri: uri.to_string(),
            namespaces,
        });
    }
    Ok(scope)
}

fn missing(path: &Path, element: &str, attribute: &'static str) -> EdmError {
    EdmError::MissingAttribute {
        path: path.to_path_buf(),
        element: element.to_string(),
        attribute,
    }
}

/// Qualified spellings a declaration can be referenced by inside one scope
/// entry: `Namespace.Name` and, when an alias differs, `Alias.Name`.
pub(crate) fn matches_name(entry: Option<&ScopeEntry>, namespace: &str, decl: &str, wanted: &str) -> bool {
    if decl == wanted {
        return true;
    }
    let Some(rest) = wanted.strip_suffix(decl).and_then(|p| p.strip_suffix('.')) else {
        return false;
    };
    rest == namespace || entry.and_then(|e| e.alias_of(namespace)) == Some(rest)
}

// ============================================================================
// DocumentStore
// ============================================================================

/// Parsed-document cache shared by every ingestion worker.
///
/// A document is parsed at most once per path in the common case; two workers
/// racing on the same cold path both parse it and the first insert wins.
/// Fetches are serialized per local path, and a fetched document only appears
/// under its final name once completely written.
pub struct DocumentStore {
    schema_dir: PathBuf,
    fetcher: Option<Arc<dyn Fetcher>>,
    cache: RwLock<HashMap<PathBuf, Arc<Document>>>,
    fetching: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DocumentStore {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            fetcher: None,
            cache: RwLock::new(HashMap::new()),
            fetching: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    /// Load (or return the cached) document at `path`.
    pub fn load(&self, path: &Path) -> Result<Arc<Document>> {
        if let Some(doc) = self.cache.read().get(path) {
            return Ok(Arc::clone(doc));
        }
        let text = fs::read_to_string(path).map_err(|source| EdmError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = Arc::new(Document::parse(path, &text)?);
        tracing::debug!(path = %path.display(), "parsed schema document");
        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(path.to_path_buf()).or_insert(doc)))
    }

    /// Local path a referenced URI is cached under: its basename inside the
    /// schema directory.
    pub fn local_path(&self, uri: &str) -> PathBuf {
        self.schema_dir.join(uri_basename(uri))
    }

    /// Load a referenced document, fetching and persisting it verbatim on the
    /// first miss.
    pub fn load_reference(&self, uri: &str) -> Result<Arc<Document>> {
        let path = self.local_path(uri);
        if !self.cache.read().contains_key(&path) && !path.exists() {
            let lock = Arc::clone(self.fetching.lock().entry(path.clone()).or_default());
            let _guard = lock.lock();
            // Another worker may have persisted it while this one waited.
            if !path.exists() {
                self.fetch(uri, &path)?;
            }
        }
        self.load(&path)
    }

    fn fetch(&self, uri: &str, path: &Path) -> Result<()> {
        let fetcher = self.fetcher.as_ref().ok_or_else(|| EdmError::Offline {
            uri: uri.to_string(),
            dir: self.schema_dir.clone(),
        })?;
        tracing::info!(uri, path = %path.display(), "schema not cached, fetching");
        let bytes = fetcher.fetch(uri)?;
        fs::create_dir_all(&self.schema_dir).map_err(|source| EdmError::Io {
            path: self.schema_dir.clone(),
            source,
        })?;

        let partial = self.schema_dir.join(format!(
            ".{}.{}.part",
            uri_basename(uri),
            std::process::id()
        ));
        let io = |source| EdmError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&partial, &bytes).map_err(io)?;
        fs::rename(&partial, path).map_err(|source| {
            let _ = fs::remove_file(&partial);
            io(source)
        })
    }
}

fn uri_basename(uri: &str) -> String {
    if let Ok(url) = Url::parse(uri) {
        if let Some(last) = url.path_segments().and_then(|mut s| s.next_back()) {
            if !last.is_empty() {
                return last.to_string();
            }
        }
    }
    let trimmed = uri.split(['#', '?']).next().unwrap_or(uri);
    Path::new(trimmed)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const DOC: &str = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:Reference Uri="http://redfish.dmtf.org/schemas/v1/Resource_v1.xml">
    <edmx:Include Namespace="Resource"/>
    <edmx:Include Namespace="Resource.v1_0_0" Alias="Res"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Thing">
      <EntityType Name="Thing" Abstract="true"/>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    struct CountingFetcher {
        calls: AtomicUsize,
        body: &'static str,
        delay: Duration,
    }

    impl CountingFetcher {
        fn new(body: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                body,
                delay,
            })
        }
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, _uri: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(self.body.as_bytes().to_vec())
        }
    }

    #[test]
    fn reads_reference_scope_in_order() {
        let doc = Document::parse("Thing_v1.xml", DOC).unwrap();
        assert_eq!(doc.scope.len(), 1);
        let entry = &doc.scope[0];
        assert_eq!(entry.uri, "http://redfish.dmtf.org/schemas/v1/Resource_v1.xml");
        assert_eq!(entry.namespaces[0].alias, "Resource");
        assert_eq!(entry.namespaces[1].alias, "Res");
        assert!(entry.includes("Resource.v1_0_0"));
        let schemas: Vec<_> = doc.schemas().map(|(ns, _)| ns).collect();
        assert_eq!(schemas, vec!["Thing"]);
    }

    #[test]
    fn qualified_and_aliased_names_match() {
        let doc = Document::parse("Thing_v1.xml", DOC).unwrap();
        let entry = Some(&doc.scope[0]);
        assert!(matches_name(entry, "Resource.v1_0_0", "Resource", "Resource"));
        assert!(matches_name(entry, "Resource.v1_0_0", "Resource", "Resource.v1_0_0.Resource"));
        assert!(matches_name(entry, "Resource.v1_0_0", "Resource", "Res.Resource"));
        assert!(!matches_name(entry, "Resource.v1_0_0", "Resource", "Other.Resource"));
        assert!(!matches_name(None, "Resource.v1_0_0", "Resource", "Res.Resource"));
    }

    #[test]
    fn uri_basename_ignores_host_and_fragment() {
        assert_eq!(uri_basename("http://x.org/schemas/v1/Chassis_v1.xml"), "Chassis_v1.xml");
        assert_eq!(uri_basename("Chassis_v1.xml#frag"), "Chassis_v1.xml");
        assert_eq!(uri_basename("local/Chassis_v1.xml"), "Chassis_v1.xml");
    }

    #[test]
    fn fetches_once_then_serves_from_disk_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CountingFetcher::new(DOC, Duration::ZERO);
        let store = DocumentStore::new(dir.path()).with_fetcher(fetcher.clone());

        let uri = "http://redfish.dmtf.org/schemas/v1/Thing_v1.xml";
        let first = store.load_reference(uri).unwrap();
        let second = store.load_reference(uri).unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        let on_disk = fs::read_to_string(dir.path().join("Thing_v1.xml")).unwrap();
        assert_eq!(on_disk, DOC);
    }

    #[test]
    fn concurrent_misses_fetch_once_and_never_read_a_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CountingFetcher::new(DOC, Duration::from_millis(50));
        let store = DocumentStore::new(dir.path()).with_fetcher(fetcher.clone());
        let uri = "http://redfish.dmtf.org/schemas/v1/Thing_v1.xml";

        let docs: Vec<Arc<Document>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| store.load_reference(uri).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(docs.iter().all(|d| Arc::ptr_eq(d, &docs[0])));
        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Thing_v1.xml"]);
    }

    #[test]
    fn offline_store_refuses_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let err = store.load_reference("http://x.org/Missing_v1.xml").unwrap_err();
        assert!(matches!(err, EdmError::Offline { .. }));
    }
}
