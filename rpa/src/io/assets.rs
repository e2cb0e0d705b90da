//! Resolution of screen-reference image files.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::core::types::ScreenReference;
use crate::io::config::AssetConfig;

/// Absolute paths to every reference image used during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSet {
    paths: Vec<(ScreenReference, PathBuf)>,
}

impl AssetSet {
    /// Resolve `config.dir` against `base` (usually the config file's directory).
    pub fn resolve(base: &Path, config: &AssetConfig) -> Self {
        let dir = if config.dir.is_absolute() {
            config.dir.clone()
        } else {
            base.join(&config.dir)
        };
        let paths = ScreenReference::ALL
            .iter()
            .map(|reference| (*reference, dir.join(config.file_name(*reference))))
            .collect();
        Self { paths }
    }

    pub fn path(&self, reference: ScreenReference) -> &Path {
        self.paths
            .iter()
            .find(|(candidate, _)| *candidate == reference)
            .map(|(_, path)| path.as_path())
            .unwrap_or_else(|| Path::new(""))
    }

    /// References whose backing file does not exist.
    pub fn missing(&self) -> Vec<(ScreenReference, &Path)> {
        self.paths
            .iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(reference, path)| (*reference, path.as_path()))
            .collect()
    }

    /// Fail with every missing path listed.
    pub fn ensure_complete(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            debug!(count = self.paths.len(), "all reference images present");
            return Ok(());
        }
        let lines: Vec<String> = missing
            .iter()
            .map(|(reference, path)| format!("{} ({})", path.display(), reference.label()))
            .collect();
        Err(anyhow!(
            "missing reference images:\n- {}",
            lines.join("\n- ")
        ))
    }
}
