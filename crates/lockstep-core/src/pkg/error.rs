//! Metadata engine error types.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes, stable across releases.
pub mod codes {
    pub const PKG_FROZEN_LOCKFILE: &str = "PKG_FROZEN_LOCKFILE";
    pub const PKG_MANIFEST_INVALID: &str = "PKG_MANIFEST_INVALID";
    pub const PKG_LOCKFILE_INVALID: &str = "PKG_LOCKFILE_INVALID";
    pub const PKG_RESOLVER_FAILED: &str = "PKG_RESOLVER_FAILED";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_IO_ERROR: &str = "PKG_IO_ERROR";
}

/// Metadata engine error.
#[derive(Error, Debug)]
pub enum PkgError {
    #[error(
        "Updating lockfile is not allowed with frozenLockfile. \
         This error is most likely happening if you have committed out-of-date lockfiles \
         and tried to install deps in CI. Install your deps again locally."
    )]
    FrozenLockfile,

    #[error("Invalid package.json at {}: {message}", path.display())]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("Invalid lockfile at {}:{line}: {message}", path.display())]
    LockfileInvalid {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Resolver failed: {message}")]
    ResolverFailed { message: String },

    #[error("Registry error: {message}")]
    Registry { message: String },

    #[error("{message}")]
    SpecInvalid { message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PkgError {
    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::FrozenLockfile => codes::PKG_FROZEN_LOCKFILE,
            Self::ManifestInvalid { .. } => codes::PKG_MANIFEST_INVALID,
            Self::LockfileInvalid { .. } => codes::PKG_LOCKFILE_INVALID,
            Self::ResolverFailed { .. } => codes::PKG_RESOLVER_FAILED,
            Self::Registry { .. } => codes::PKG_REGISTRY_ERROR,
            Self::SpecInvalid { .. } => codes::PKG_SPEC_INVALID,
            Self::Io { .. } => codes::PKG_IO_ERROR,
        }
    }

    /// Create a package.json invalid error.
    pub fn manifest_invalid(path: &Path, message: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a lockfile parse error at a 1-based line number.
    pub fn lockfile_invalid(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Self::LockfileInvalid {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    /// Create a resolver failure.
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::ResolverFailed {
            message: message.into(),
        }
    }

    /// Create a registry error.
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Create a spec invalid error.
    pub fn spec_invalid(message: impl Into<String>) -> Self {
        Self::SpecInvalid {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::registry(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::registry(format!("Connection failed: {e}"))
        } else {
            Self::registry(e.to_string())
        }
    }
}
