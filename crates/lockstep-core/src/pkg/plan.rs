//! Change planning: what to remove, what is missing, what to add.

use super::error::PkgError;
use super::manifest::{DepEntry, DepGroup};
use super::metadata::ProjectMetadata;
use super::rank::EntryIndex;
use super::spec::PackageSpec;
use super::version::{min_version, Range};
use std::path::PathBuf;
use tracing::debug;

/// A dependency to resolve. A missing range means "latest".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepRequest {
    pub name: String,
    pub range: Option<String>,
    pub group: DepGroup,
}

impl DepRequest {
    /// Parse `name[@range]` into a request for `group`.
    ///
    /// # Errors
    /// Returns an error if the spec is invalid.
    pub fn parse(spec: &str, group: DepGroup) -> Result<Self, PkgError> {
        let PackageSpec { name, range } = PackageSpec::parse(spec)?;
        Ok(Self { name, range, group })
    }
}

impl From<DepEntry> for DepRequest {
    fn from(entry: DepEntry) -> Self {
        Self {
            name: entry.name,
            range: Some(entry.range),
            group: entry.group,
        }
    }
}

/// The dependencies one project directory still needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDeps {
    pub dir: PathBuf,
    pub deps: Vec<DepRequest>,
}

/// An edit to apply across a set of projects.
#[derive(Debug, Clone, Default)]
pub struct ChangeRequest {
    pub additions: Vec<DepRequest>,
    /// Names to remove from every group.
    pub removals: Vec<String>,
    /// Only remove a name whose current minimum version satisfies its filter here.
    pub from: Vec<PackageSpec>,
}

/// The outcome of planning, not persisted.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    /// Every declaration that was removed, with its group and original range.
    pub removed: Vec<DepEntry>,
    /// Declarations no lockfile entry can serve, per project.
    pub missing: Vec<PackageDeps>,
    /// Additions to apply, per root.
    pub additional: Vec<PackageDeps>,
}

impl PendingChanges {
    /// Every resolution request: missing first, then additions.
    pub fn into_requests(self) -> Vec<PackageDeps> {
        let mut requests = self.missing;
        requests.extend(self.additional);
        requests
    }
}

/// Remove `removals` from every group of every manifest.
///
/// With a `from` filter for a name, the declaration is only removed when the
/// minimum version of its current range satisfies the filter. A filter that is
/// not a semver range does not restrict; a current range without a computable
/// minimum is kept.
pub fn prune_metadata(
    metas: &mut [ProjectMetadata],
    removals: &[String],
    from: &[PackageSpec],
) -> Vec<DepEntry> {
    let mut removed = Vec::new();
    for meta in metas.iter_mut() {
        for removal in removals {
            let filter = from
                .iter()
                .find(|spec| spec.name == *removal)
                .and_then(|spec| spec.range.as_deref())
                .and_then(|range| Range::parse(range).ok());

            for group in DepGroup::ALL {
                let Some(range) = meta.manifest.get(group, removal) else {
                    continue;
                };
                let should_remove = match &filter {
                    Some(filter) => min_version(range).is_some_and(|min| filter.matches(&min)),
                    None => true,
                };
                if !should_remove {
                    debug!(name = %removal, range, %group, "Kept by from filter");
                    continue;
                }
                if let Some(range) = meta.manifest.remove(group, removal) {
                    removed.push(DepEntry::new(removal.as_str(), range, group));
                }
            }
        }
    }
    removed
}

/// Every declaration that no lockfile entry across `metas` can serve.
///
/// Only projects with something missing are returned; each project's list is
/// de-duplicated by `(name, range)`.
#[must_use]
pub fn get_missing_deps(metas: &[ProjectMetadata]) -> Vec<PackageDeps> {
    let index = EntryIndex::new(metas);
    let mut missing = Vec::new();
    for meta in metas {
        let mut deps: Vec<DepRequest> = Vec::new();
        for entry in meta.manifest.dep_entries() {
            if index.best(&entry.name, &entry.range).is_some() {
                continue;
            }
            let seen = deps
                .iter()
                .any(|d| d.name == entry.name && d.range.as_deref() == Some(entry.range.as_str()));
            if !seen {
                deps.push(entry.into());
            }
        }
        if !deps.is_empty() {
            debug!(dir = %meta.dir.display(), count = deps.len(), "Missing dependencies");
            missing.push(PackageDeps {
                dir: meta.dir.clone(),
                deps,
            });
        }
    }
    missing
}

/// Decide which additions apply to each root.
///
/// An addition whose name was removed is emitted once per removed group,
/// inheriting that group. With no removals at all, additions apply as given.
/// An addition that was not removed while other names were is dropped.
#[must_use]
pub fn get_additional_deps(
    roots: &[PathBuf],
    additions: &[DepRequest],
    removed: &[DepEntry],
) -> Vec<PackageDeps> {
    roots
        .iter()
        .map(|dir| {
            let mut deps = Vec::new();
            for addition in additions {
                let mut found = removed.iter().filter(|r| r.name == addition.name).peekable();
                if found.peek().is_some() {
                    deps.extend(found.map(|r| DepRequest {
                        group: r.group,
                        ..addition.clone()
                    }));
                } else if removed.is_empty() {
                    deps.push(addition.clone());
                }
            }
            PackageDeps {
                dir: dir.clone(),
                deps,
            }
        })
        .collect()
}

/// Prune, then compute missing and additional dependencies.
pub fn plan_changes(
    metas: &mut [ProjectMetadata],
    roots: &[PathBuf],
    change: &ChangeRequest,
) -> PendingChanges {
    let removed = prune_metadata(metas, &change.removals, &change.from);
    let missing = get_missing_deps(metas);
    let additional = get_additional_deps(roots, &change.additions, &removed);
    PendingChanges {
        removed,
        missing,
        additional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::lockfile::LockEntry;

    fn meta(dir: &str, deps: &[(DepGroup, &str, &str)]) -> ProjectMetadata {
        let mut meta = ProjectMetadata::new(dir);
        for (group, name, range) in deps {
            meta.manifest.set(*group, name, range);
        }
        meta
    }

    fn spec(s: &str) -> PackageSpec {
        PackageSpec::parse(s).unwrap()
    }

    #[test]
    fn test_prune_removes_from_every_group() {
        let mut metas = vec![meta(
            "/a",
            &[
                (DepGroup::Dependencies, "has", "^1.0.3"),
                (DepGroup::PeerDependencies, "has", "^1.0.0"),
                (DepGroup::Dependencies, "keep", "^2.0.0"),
            ],
        )];
        let removed = prune_metadata(&mut metas, &["has".to_string()], &[]);

        assert_eq!(
            removed,
            vec![
                DepEntry::new("has", "^1.0.3", DepGroup::Dependencies),
                DepEntry::new("has", "^1.0.0", DepGroup::PeerDependencies),
            ]
        );
        assert_eq!(metas[0].manifest.dep_entries().len(), 1);
    }

    #[test]
    fn test_prune_from_filter_keeps_non_matching() {
        let mut metas = vec![
            meta("/a", &[(DepGroup::Dependencies, "is-number", "^1.0.0")]),
            meta("/b", &[(DepGroup::Dependencies, "is-number", "^1.6.0")]),
        ];
        let removed = prune_metadata(
            &mut metas,
            &["is-number".to_string()],
            &[spec("is-number@^1.5.0")],
        );

        assert_eq!(removed, vec![DepEntry::new("is-number", "^1.6.0", DepGroup::Dependencies)]);
        assert_eq!(
            metas[0].manifest.get(DepGroup::Dependencies, "is-number"),
            Some("^1.0.0")
        );
        assert_eq!(metas[1].manifest.get(DepGroup::Dependencies, "is-number"), None);
    }

    #[test]
    fn test_prune_invalid_from_does_not_restrict() {
        let mut metas = vec![meta("/a", &[(DepGroup::Dependencies, "a", "^1.0.0")])];
        let removed = prune_metadata(&mut metas, &["a".to_string()], &[spec("a@latest")]);
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn test_prune_alias_kept_under_valid_filter() {
        let mut metas = vec![meta(
            "/a",
            &[(DepGroup::Dependencies, "a", "npm:b@1.0.0")],
        )];
        let removed = prune_metadata(&mut metas, &["a".to_string()], &[spec("a@^1.0.0")]);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_missing_deps_only_for_projects_missing_something() {
        let mut a = meta(
            "/a",
            &[
                (DepGroup::Dependencies, "has", "^1.0.3"),
                (DepGroup::DevDependencies, "has", "^1.0.3"),
                (DepGroup::Dependencies, "left-pad", "^1.0.0"),
            ],
        );
        a.lockfile.insert(
            "left-pad@^1.0.0",
            LockEntry::new("1.3.0", "https://registry.example.test/left-pad-1.3.0.tgz"),
        );
        let b = meta("/b", &[(DepGroup::Dependencies, "left-pad", "^1.1.0")]);

        let missing = get_missing_deps(&[a, b]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].dir, PathBuf::from("/a"));
        assert_eq!(
            missing[0].deps,
            vec![DepRequest {
                name: "has".into(),
                range: Some("^1.0.3".into()),
                group: DepGroup::Dependencies,
            }]
        );
    }

    #[test]
    fn test_additional_deps_without_removals() {
        let roots = [PathBuf::from("/a"), PathBuf::from("/b")];
        let additions = [DepRequest::parse("has@^1.0.3", DepGroup::DevDependencies).unwrap()];
        let deps = get_additional_deps(&roots, &additions, &[]);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].deps, additions);
    }

    #[test]
    fn test_additional_deps_inherit_removed_groups() {
        let roots = [PathBuf::from("/a")];
        let additions = [DepRequest::parse("has@^2.0.0", DepGroup::Dependencies).unwrap()];
        let removed = [
            DepEntry::new("has", "^1.0.0", DepGroup::DevDependencies),
            DepEntry::new("has", "^1.0.0", DepGroup::PeerDependencies),
        ];
        let deps = get_additional_deps(&roots, &additions, &removed);
        let groups: Vec<DepGroup> = deps[0].deps.iter().map(|d| d.group).collect();
        assert_eq!(groups, [DepGroup::DevDependencies, DepGroup::PeerDependencies]);
        assert!(deps[0].deps.iter().all(|d| d.range.as_deref() == Some("^2.0.0")));
    }

    #[test]
    fn test_additional_deps_dropped_after_unrelated_removal() {
        let roots = [PathBuf::from("/a")];
        let additions = [DepRequest::parse("has", DepGroup::Dependencies).unwrap()];
        let removed = [DepEntry::new("other", "^1.0.0", DepGroup::Dependencies)];
        let deps = get_additional_deps(&roots, &additions, &removed);
        assert!(deps[0].deps.is_empty());
    }

    #[test]
    fn test_plan_changes_bundles_everything() {
        let mut metas = vec![meta("/a", &[(DepGroup::Dependencies, "has", "^1.0.0")])];
        let change = ChangeRequest {
            additions: vec![DepRequest::parse("has@^1.0.3", DepGroup::Dependencies).unwrap()],
            removals: vec!["has".into()],
            from: Vec::new(),
        };
        let pending = plan_changes(&mut metas, &[PathBuf::from("/a")], &change);
        assert_eq!(pending.removed.len(), 1);
        assert!(pending.missing.is_empty());
        let requests = pending.into_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].deps[0].range.as_deref(), Some("^1.0.3"));
    }
}
