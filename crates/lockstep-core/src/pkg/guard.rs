//! Frozen-lockfile guard.

use super::error::PkgError;
use super::lockfile::Lockfile;
use super::metadata::ProjectMetadata;
use std::collections::BTreeMap;

/// Stable hash of a lockfile's shape: its sorted `{specifier: version}` map.
///
/// Resolved URLs, integrity and edges do not participate.
#[must_use]
pub fn lockfile_shape_hash(lockfile: &Lockfile) -> String {
    let shape: BTreeMap<&str, &str> = lockfile
        .iter()
        .map(|(specifier, entry)| (specifier, entry.version.as_str()))
        .collect();
    let json = serde_json::to_string(&shape).unwrap_or_default();
    lockstep_util::hash::blake3_str(&json)
}

/// Whether two metadata sets have the same lockfile shapes, position by
/// position. Different project counts are a change.
#[must_use]
pub fn diff_metadata(before: &[ProjectMetadata], after: &[ProjectMetadata]) -> bool {
    before.len() == after.len()
        && before
            .iter()
            .zip(after)
            .all(|(a, b)| lockfile_shape_hash(&a.lockfile) == lockfile_shape_hash(&b.lockfile))
}

/// The error raised when a frozen lockfile would change.
#[must_use]
pub fn frozen_lockfile_violation() -> PkgError {
    PkgError::FrozenLockfile
}

/// Fail when `frozen` is set and `after` differs from `before`.
///
/// # Errors
/// Returns [`PkgError::FrozenLockfile`] on drift.
pub fn ensure_unchanged(
    frozen: bool,
    before: &[ProjectMetadata],
    after: &[ProjectMetadata],
) -> Result<(), PkgError> {
    if frozen && !diff_metadata(before, after) {
        return Err(frozen_lockfile_violation());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::lockfile::LockEntry;

    fn meta(entries: &[(&str, &str, &str)]) -> ProjectMetadata {
        let mut meta = ProjectMetadata::new("/p");
        for (specifier, version, resolved) in entries {
            meta.lockfile.insert(*specifier, LockEntry::new(*version, *resolved));
        }
        meta
    }

    #[test]
    fn test_shape_ignores_resolved_url() {
        let a = meta(&[("a@^1.0.0", "1.0.0", "https://one.test/a.tgz")]);
        let b = meta(&[("a@^1.0.0", "1.0.0", "https://two.test/a.tgz")]);
        assert_eq!(
            lockfile_shape_hash(&a.lockfile),
            lockfile_shape_hash(&b.lockfile)
        );
        assert!(diff_metadata(&[a], &[b]));
    }

    #[test]
    fn test_version_change_detected() {
        let a = meta(&[("a@^1.0.0", "1.0.0", "u")]);
        let b = meta(&[("a@^1.0.0", "1.1.0", "u")]);
        assert!(!diff_metadata(&[a], &[b]));
    }

    #[test]
    fn test_specifier_change_detected() {
        let a = meta(&[("a@^1.0.0", "1.0.0", "u")]);
        let b = meta(&[("a@^1.0.0", "1.0.0", "u"), ("b@^1.0.0", "1.0.0", "u")]);
        assert!(!diff_metadata(&[a], &[b]));
    }

    #[test]
    fn test_count_mismatch_is_changed() {
        let a = meta(&[]);
        assert!(!diff_metadata(&[a.clone()], &[a.clone(), a]));
        assert!(diff_metadata(&[], &[]));
    }

    #[test]
    fn test_ensure_unchanged() {
        let a = meta(&[("a@^1.0.0", "1.0.0", "u")]);
        let b = meta(&[]);
        assert!(ensure_unchanged(false, &[a.clone()], &[b.clone()]).is_ok());
        let err = ensure_unchanged(true, &[a], &[b]).unwrap_err();
        assert_eq!(err.code(), "PKG_FROZEN_LOCKFILE");
    }
}
