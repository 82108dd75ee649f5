//! Project metadata: one directory's package.json plus yarn.lock.

use super::error::PkgError;
use super::lockfile::{Lockfile, LOCKFILE_NAME};
use super::manifest::{Manifest, MANIFEST_NAME};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A project directory with its parsed manifest and lockfile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectMetadata {
    pub dir: PathBuf,
    pub manifest: Manifest,
    pub lockfile: Lockfile,
}

impl ProjectMetadata {
    /// Create metadata for `dir` with an empty manifest and lockfile.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            manifest: Manifest::new(),
            lockfile: Lockfile::new(),
        }
    }

    /// Read `dir/package.json` and `dir/yarn.lock`. Missing files read as empty.
    ///
    /// # Errors
    /// Returns an error if either file exists but is unreadable or malformed.
    pub fn read(dir: &Path) -> Result<Self, PkgError> {
        let manifest = Manifest::read_from(&dir.join(MANIFEST_NAME))?;
        let lockfile = Lockfile::read_from(&dir.join(LOCKFILE_NAME))?;
        debug!(
            dir = %dir.display(),
            lock_entries = lockfile.len(),
            "Loaded project metadata"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
            lockfile,
        })
    }

    /// The manifest `name`, falling back to the directory name.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.manifest.name() {
            Some(name) => name.to_string(),
            None => self
                .dir
                .file_name()
                .map_or_else(|| self.dir.display().to_string(), |n| n.to_string_lossy().into_owned()),
        }
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_NAME)
    }

    #[must_use]
    pub fn lockfile_path(&self) -> PathBuf {
        self.dir.join(LOCKFILE_NAME)
    }

    /// Write both files, skipping any whose content is unchanged.
    ///
    /// Returns the paths that were actually written.
    ///
    /// # Errors
    /// Returns an error if a write fails.
    pub fn write(&self) -> Result<Vec<PathBuf>, PkgError> {
        let mut written = Vec::new();
        for (path, content) in [
            (self.manifest_path(), self.manifest.to_json_string()),
            (self.lockfile_path(), self.lockfile.stringify()),
        ] {
            let changed = lockstep_util::fs::write_if_changed(&path, &content)
                .map_err(|e| PkgError::io(&path, e))?;
            if changed {
                debug!(path = %path.display(), "Wrote file");
                written.push(path);
            }
        }
        Ok(written)
    }
}

/// Load every root in parallel, preserving input order.
///
/// # Errors
/// Returns the first read or parse error.
pub fn load_metadata(roots: &[PathBuf]) -> Result<Vec<ProjectMetadata>, PkgError> {
    roots
        .par_iter()
        .map(|dir| ProjectMetadata::read(dir))
        .collect()
}

/// Write every project in order. There is no rollback across projects.
///
/// # Errors
/// Returns the first write error; earlier projects stay written.
pub fn write_metadata(metas: &[ProjectMetadata]) -> Result<Vec<PathBuf>, PkgError> {
    let mut written = Vec::new();
    for meta in metas {
        written.extend(meta.write()?);
    }
    Ok(written)
}
