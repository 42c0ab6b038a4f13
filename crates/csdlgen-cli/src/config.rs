//! Run configuration: a JSON file, overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csdlgen_convert::ConvertOptions;
use csdlgen_edm::{BuildOptions, DEFAULT_CYCLE_DENYLIST};
use csdlgen_proto::ProtoOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory tree of CSDL documents; fetched references land here too.
    pub schema_dir: PathBuf,
    /// Root of the generated `.proto` tree.
    pub out_dir: PathBuf,
    /// Descriptor sets written by the proto compiler.
    pub proto_out_dir: PathBuf,
    /// Generated Rust conversion handlers.
    pub handlers_path: PathBuf,
    pub root_entity: String,
    pub root_url: String,
    pub service_package: String,
    pub service_name: String,
    /// Rust path the generated handlers use to reach prost's output.
    pub proto_module: String,
    /// Member names dropped before resolution.
    pub cycle_denylist: Vec<String>,
    /// Input file names starting with any of these are not ingested.
    pub exclude_prefixes: Vec<String>,
    /// Ingestion workers; half the available parallelism when unset.
    pub jobs: Option<usize>,
    pub protoc: PathBuf,
    pub skip_compile: bool,
    /// Treat a reference missing from `schema_dir` as fatal instead of
    /// fetching it.
    pub offline: bool,
    pub fetch_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        let service = ProtoOptions::default();
        Self {
            schema_dir: PathBuf::from("csdl"),
            out_dir: PathBuf::from("proto"),
            proto_out_dir: PathBuf::from("proto_out"),
            handlers_path: PathBuf::from("handlers.rs"),
            root_entity: service.root_entity,
            root_url: service.root_url,
            service_package: service.service_package,
            service_name: service.service_name,
            proto_module: ConvertOptions::default().proto_module,
            cycle_denylist: DEFAULT_CYCLE_DENYLIST.iter().map(|s| s.to_string()).collect(),
            exclude_prefixes: vec!["OemAccountService".to_string()],
            jobs: None,
            protoc: PathBuf::from("protoc"),
            skip_compile: false,
            offline: false,
            fetch_timeout_secs: 30,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(default_jobs).max(1)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            cycle_denylist: self.cycle_denylist.iter().cloned().collect(),
        }
    }

    pub fn proto_options(&self) -> ProtoOptions {
        ProtoOptions {
            root_entity: self.root_entity.clone(),
            root_url: self.root_url.clone(),
            service_package: self.service_package.clone(),
            service_name: self.service_name.clone(),
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            service: self.proto_options(),
            proto_module: self.proto_module.clone(),
        }
    }

    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.exclude_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()))
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_redfish_layout() {
        let config = RunConfig::default();
        assert_eq!(config.root_entity, "ServiceRoot");
        assert_eq!(config.root_url, "/redfish/v1");
        assert_eq!(config.service_package, "redfish_v1");
        assert_eq!(config.service_name, "Redfish_v1");
        assert_eq!(config.cycle_denylist.len(), 8);
        assert!(config.is_excluded("OemAccountService_v1.xml"));
        assert!(!config.is_excluded("AccountService_v1.xml"));
        assert!(config.jobs() >= 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csdlgen.json");
        fs::write(
            &path,
            r#"{ "root_entity": "ServiceRootType", "cycle_denylist": [], "jobs": 0 }"#,
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.root_entity, "ServiceRootType");
        assert!(config.build_options().cycle_denylist.is_empty());
        assert_eq!(config.jobs(), 1);
        assert_eq!(config.service_name, "Redfish_v1");
        assert_eq!(config.convert_options().service.root_entity, "ServiceRootType");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csdlgen.json");
        fs::write(&path, r#"{ "root": "X" }"#).unwrap();
        assert!(RunConfig::load(&path).is_err());
    }
}
