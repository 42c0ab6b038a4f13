//! Build manifests for the generated proto tree.
//!
//! Every directory that receives a file gets a `manifest.json` listing its
//! sources; the root manifest lists each such directory once, plus the
//! files written at the root itself.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ProtoFile;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Directory (relative, `""` for the root) → file names inside it.
    entries: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryManifest {
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootManifest {
    pub directories: Vec<String>,
    pub sources: Vec<String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one generated file by its `/`-separated relative path.
    pub fn record(&mut self, relative: &str) {
        let (dir, file) = match relative.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", relative),
        };
        self.entries
            .entry(dir.to_string())
            .or_default()
            .insert(file.to_string());
    }

    /// Directories below the root that received at least one file.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .filter(|dir| !dir.is_empty())
            .map(String::as_str)
    }

    pub fn sources(&self, dir: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(dir)
            .into_iter()
            .flat_map(|files| files.iter().map(String::as_str))
    }

    pub fn root(&self) -> RootManifest {
        RootManifest {
            directories: self.directories().map(str::to_string).collect(),
            sources: self.sources("").map(str::to_string).collect(),
        }
    }

    /// The manifest files themselves, ready to be written next to the protos.
    pub fn render(&self) -> serde_json::Result<Vec<ProtoFile>> {
        let mut out = Vec::new();
        for dir in self.directories() {
            let manifest = DirectoryManifest {
                sources: self.sources(dir).map(str::to_string).collect(),
            };
            out.push(ProtoFile {
                path: format!("{dir}/{MANIFEST_FILE}"),
                contents: serde_json::to_string_pretty(&manifest)? + "\n",
            });
        }
        out.push(ProtoFile {
            path: MANIFEST_FILE.to_string(),
            contents: serde_json::to_string_pretty(&self.root())? + "\n",
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_directory_is_listed_once() {
        let mut manifest = Manifest::new();
        manifest.record("Chassis_v1/Chassis.proto");
        manifest.record("Chassis_v1/PowerState.proto");
        manifest.record("Chassis_v1/Chassis.proto");
        manifest.record("entry.proto");
        manifest.record("NavigationReference.proto");

        let root = manifest.root();
        assert_eq!(root.directories, vec!["Chassis_v1"]);
        assert_eq!(root.sources, vec!["NavigationReference.proto", "entry.proto"]);

        let files = manifest.render().unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["Chassis_v1/manifest.json", "manifest.json"]);
        let dir: DirectoryManifest = serde_json::from_str(&files[0].contents).unwrap();
        assert_eq!(dir.sources, vec!["Chassis.proto", "PowerState.proto"]);
    }
}
