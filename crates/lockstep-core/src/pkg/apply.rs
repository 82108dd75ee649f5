//! The mutating pipeline shared by every editing command.
//!
//! prune → find missing → resolve → fold in → rebuild → guard

use super::error::PkgError;
use super::graph::update_metadata;
use super::guard::ensure_unchanged;
use super::metadata::ProjectMetadata;
use super::plan::{plan_changes, ChangeRequest};
use super::resolver::{augment_metadata, download_metadata, ResolveOptions, Resolver};
use std::path::PathBuf;
use tracing::info;

/// Apply `change` to `metas` in memory.
///
/// Nothing is written. With `frozen_lockfile`, any resulting lockfile drift
/// relative to `metas` as passed in is an error.
///
/// # Errors
/// Returns resolver errors and frozen-lockfile violations.
pub fn apply_metadata_changes(
    metas: Vec<ProjectMetadata>,
    roots: &[PathBuf],
    change: &ChangeRequest,
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<Vec<ProjectMetadata>, PkgError> {
    let baseline = options.frozen_lockfile.then(|| metas.clone());
    let mut metas = metas;

    let pending = plan_changes(&mut metas, roots, change);
    info!(
        removed = pending.removed.len(),
        missing = pending.missing.iter().map(|p| p.deps.len()).sum::<usize>(),
        additions = pending.additional.iter().map(|p| p.deps.len()).sum::<usize>(),
        "Planned changes"
    );

    let added = download_metadata(&pending.into_requests(), options, resolver)?;
    augment_metadata(&mut metas, added);
    let updated = update_metadata(metas);

    if let Some(baseline) = baseline {
        ensure_unchanged(true, &baseline, &updated)?;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::lockfile::LockEntry;
    use crate::pkg::manifest::DepGroup;
    use crate::pkg::plan::DepRequest;
    use crate::pkg::resolver::MemoryResolver;
    use tempfile::tempdir;

    fn registry() -> MemoryResolver {
        MemoryResolver::new()
            .with_package("has", "1.0.3", &[("function-bind", "^1.1.1")])
            .with_package("function-bind", "1.1.1", &[])
    }

    #[test]
    fn test_add_resolves_and_rebuilds() {
        let tmp = tempdir().unwrap();
        let root = PathBuf::from("/proj");
        let change = ChangeRequest {
            additions: vec![DepRequest::parse("has@^1.0.3", DepGroup::Dependencies).unwrap()],
            ..ChangeRequest::default()
        };
        let options = ResolveOptions {
            tmp_dir: tmp.path().to_path_buf(),
            ..ResolveOptions::default()
        };

        let updated = apply_metadata_changes(
            vec![ProjectMetadata::new(&root)],
            &[root],
            &change,
            &options,
            &registry(),
        )
        .unwrap();

        let meta = &updated[0];
        assert_eq!(meta.manifest.get(DepGroup::Dependencies, "has"), Some("^1.0.3"));
        assert!(meta.lockfile.contains("has@^1.0.3"));
        assert!(meta.lockfile.contains("function-bind@^1.1.1"));
    }

    #[test]
    fn test_frozen_accepts_no_op() {
        let root = PathBuf::from("/proj");
        let mut meta = ProjectMetadata::new(&root);
        meta.manifest.set(DepGroup::Dependencies, "function-bind", "^1.1.1");
        meta.lockfile.insert(
            "function-bind@^1.1.1",
            LockEntry::new("1.1.1", MemoryResolver::tarball_url("function-bind", "1.1.1")),
        );
        let options = ResolveOptions {
            frozen_lockfile: true,
            ..ResolveOptions::default()
        };
        let resolver = registry();

        let updated = apply_metadata_changes(
            vec![meta.clone()],
            &[root],
            &ChangeRequest::default(),
            &options,
            &resolver,
        )
        .unwrap();
        assert_eq!(updated, vec![meta]);
        assert_eq!(resolver.resolve_calls(), 0);
    }

    #[test]
    fn test_frozen_rejects_pruning() {
        let root = PathBuf::from("/proj");
        let mut meta = ProjectMetadata::new(&root);
        meta.lockfile.insert(
            "orphan@^1.0.0",
            LockEntry::new("1.0.0", MemoryResolver::tarball_url("orphan", "1.0.0")),
        );
        let options = ResolveOptions {
            frozen_lockfile: true,
            ..ResolveOptions::default()
        };

        let err = apply_metadata_changes(
            vec![meta],
            &[root],
            &ChangeRequest::default(),
            &options,
            &registry(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "PKG_FROZEN_LOCKFILE");
    }
}
