//! Lazy handle on a simulation output directory.

use std::path::{Path, PathBuf};

use eam_core::{Error, Result};
use eam_store::Dataset;

use crate::config::ConfigManifest;

/// Handle on an on-disk simulation output.
///
/// Owns nothing in memory beyond the manifest; datasets open lazily. The
/// directory is the source of truth — deleting it invalidates the handle.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    root: PathBuf,
    manifest: ConfigManifest,
}

impl SimulationOutput {
    /// Rehydrate a handle from an existing output directory.
    ///
    /// # Errors
    /// `Io` when the directory is missing the manifest or either dataset
    /// subdirectory.
    pub fn from_dir(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let manifest = ConfigManifest::load(&root)?;
        for sub in ["dataset", "evaluated_conditions"] {
            if !root.join(sub).is_dir() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!(
                        "not a simulation output directory (missing {}/)",
                        root.join(sub).display()
                    ),
                )));
            }
        }
        Ok(Self { root, manifest })
    }

    /// Output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted configuration manifest.
    pub fn manifest(&self) -> &ConfigManifest {
        &self.manifest
    }

    /// Open the simulation-row dataset.
    pub fn open_dataset(&self) -> Result<Dataset> {
        Dataset::open(self.root.join("dataset"))
    }

    /// Open the evaluated-conditions dataset.
    pub fn open_conditions(&self) -> Result<Dataset> {
        Dataset::open(self.root.join("evaluated_conditions"))
    }

    /// Whether every chunk the manifest promises is present on disk.
    ///
    /// A run aborted mid-way leaves a readable directory with fewer
    /// partitions than `n_chunks`; such partial output is never repaired,
    /// only detected.
    pub fn is_complete(&self) -> Result<bool> {
        let partitions = self.open_dataset()?.list_partitions()?;
        Ok(partitions.len() == self.manifest.n_chunks)
    }
}
