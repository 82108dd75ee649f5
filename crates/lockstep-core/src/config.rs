use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Separator between roots in a `--roots` argument.
pub const ROOTS_SEPARATOR: char = '|';

/// Runtime configuration for the lockstep CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory. Relative roots resolve against it.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Parent directory for resolver working directories.
    pub tmp_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            tmp_dir: std::env::temp_dir(),
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the resolver scratch directory.
    #[must_use]
    pub fn with_tmp_dir(mut self, tmp_dir: PathBuf) -> Self {
        self.tmp_dir = self.resolve_path(&tmp_dir);
        self
    }

    /// Resolve `path` against `cwd` unless it is absolute.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Split a `|`-separated roots argument into directories under `cwd`.
    ///
    /// Empty segments are skipped.
    #[must_use]
    pub fn roots(&self, roots: &str) -> Vec<PathBuf> {
        roots
            .split(ROOTS_SEPARATOR)
            .map(str::trim)
            .filter(|root| !root.is_empty())
            .map(|root| self.resolve_path(Path::new(root)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_resolve_against_cwd() {
        let config = Config::new(PathBuf::from("/repo"));
        assert_eq!(
            config.roots("packages/a|/abs/b||"),
            vec![PathBuf::from("/repo/packages/a"), PathBuf::from("/abs/b")]
        );
    }

    #[test]
    fn test_builders() {
        let config = Config::new(PathBuf::from("/repo"))
            .with_verbosity(2)
            .with_json_logs(true)
            .with_tmp_dir(PathBuf::from("scratch"));
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
        assert_eq!(config.tmp_dir, PathBuf::from("/repo/scratch"));
    }
}
