//! The external proto compiler.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};

pub struct Protoc {
    program: PathBuf,
    include: PathBuf,
    descriptor_dir: PathBuf,
}

impl Protoc {
    pub fn new(program: impl Into<PathBuf>, include: &Path, descriptor_dir: &Path) -> Self {
        Self {
            program: program.into(),
            include: include.to_path_buf(),
            descriptor_dir: descriptor_dir.to_path_buf(),
        }
    }

    /// Compile one file (relative to the include root) into a descriptor set
    /// under the descriptor directory. Non-zero exit is an error carrying
    /// the compiler's stderr.
    pub fn compile(&self, relative: &str) -> Result<PathBuf> {
        let descriptor = self.descriptor_dir.join(format!("{relative}.pb"));
        if let Some(parent) = descriptor.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let output = Command::new(&self.program)
            .arg("-I")
            .arg(&self.include)
            .arg("--descriptor_set_out")
            .arg(&descriptor)
            .arg(self.include.join(relative))
            .output()
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("protoc failed for {relative}:\n{stderr}"));
        }
        Ok(descriptor)
    }
}
