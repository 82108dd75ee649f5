//! Lockfile graph rebuild.
//!
//! Each project's lockfile is recomputed from its manifest: every declared
//! `name@range` and, transitively, every edge of the chosen entries is mapped
//! to the best entry across **all** projects. Anything unreachable is dropped.

use super::lockfile::Lockfile;
use super::manifest::Manifest;
use super::metadata::ProjectMetadata;
use super::rank::EntryIndex;
use super::spec::specifier;
use rayon::prelude::*;
use tracing::debug;

/// Rebuild every project's lockfile against the combined entries of `metas`.
#[must_use]
pub fn update_metadata(metas: Vec<ProjectMetadata>) -> Vec<ProjectMetadata> {
    let lockfiles: Vec<Lockfile> = {
        let index = EntryIndex::new(&metas);
        metas
            .par_iter()
            .map(|meta| {
                let lockfile = rebuild_lockfile(&meta.manifest, &index);
                debug!(
                    dir = %meta.dir.display(),
                    before = meta.lockfile.len(),
                    after = lockfile.len(),
                    "Rebuilt lockfile"
                );
                lockfile
            })
            .collect()
    };

    metas
        .into_iter()
        .zip(lockfiles)
        .map(|(mut meta, lockfile)| {
            meta.lockfile = lockfile;
            meta
        })
        .collect()
}

/// The reachable lockfile for one manifest.
#[must_use]
pub fn rebuild_lockfile(manifest: &Manifest, index: &EntryIndex<'_>) -> Lockfile {
    rebuild_from(
        manifest
            .dep_entries()
            .into_iter()
            .map(|entry| (entry.name, entry.range)),
        index,
    )
}

/// The lockfile reachable from `roots`, each a `(name, range)` declaration.
///
/// The graph being built doubles as the visited set, so cycles terminate and
/// each specifier is ranked once.
#[must_use]
pub fn rebuild_from(
    roots: impl IntoIterator<Item = (String, String)>,
    index: &EntryIndex<'_>,
) -> Lockfile {
    let mut graph = Lockfile::new();
    let mut stack: Vec<(String, String)> = roots.into_iter().collect();
    stack.reverse();

    while let Some((name, range)) = stack.pop() {
        let key = specifier(&name, &range);
        if graph.contains(&key) {
            continue;
        }
        let Some(best) = index.best(&name, &range) else {
            continue;
        };
        stack.extend(
            best.entry
                .edges()
                .map(|(dep, dep_range)| (dep.to_string(), dep_range.to_string())),
        );
        graph.insert(key, best.entry.clone());
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::lockfile::LockEntry;
    use crate::pkg::manifest::DepGroup;

    fn entry(name: &str, version: &str) -> LockEntry {
        LockEntry::new(
            version,
            format!("https://registry.example.test/{name}/-/{name}-{version}.tgz"),
        )
    }

    #[test]
    fn test_unreachable_entries_dropped() {
        let mut meta = ProjectMetadata::new("/a");
        meta.manifest.set(DepGroup::Dependencies, "has", "^1.0.3");
        meta.lockfile.insert(
            "has@^1.0.3",
            entry("has", "1.0.3").with_dependency("function-bind", "^1.1.1"),
        );
        meta.lockfile.insert("function-bind@^1.1.1", entry("function-bind", "1.1.1"));
        meta.lockfile.insert("orphan@^1.0.0", entry("orphan", "1.0.0"));

        let updated = update_metadata(vec![meta]);
        let specs: Vec<&str> = updated[0].lockfile.specifiers().collect();
        assert_eq!(specs, ["function-bind@^1.1.1", "has@^1.0.3"]);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut meta = ProjectMetadata::new("/a");
        meta.manifest.set(DepGroup::Dependencies, "a", "^1.0.0");
        meta.lockfile.insert("a@^1.0.0", entry("a", "1.0.0").with_dependency("b", "^1.0.0"));
        meta.lockfile.insert("b@^1.0.0", entry("b", "1.0.0").with_dependency("a", "^1.0.0"));

        let updated = update_metadata(vec![meta]);
        assert_eq!(updated[0].lockfile.len(), 2);
    }

    #[test]
    fn test_best_entry_borrowed_from_other_project() {
        let mut a = ProjectMetadata::new("/a");
        a.manifest.set(DepGroup::Dependencies, "x", "^1.0.0");
        a.lockfile.insert("x@^1.0.0", entry("x", "1.0.0"));

        let mut b = ProjectMetadata::new("/b");
        b.manifest.set(DepGroup::Dependencies, "x", "^1.2.0");
        b.lockfile.insert(
            "x@^1.2.0",
            entry("x", "1.4.0").with_dependency("y", "^2.0.0"),
        );
        b.lockfile.insert("y@^2.0.0", entry("y", "2.0.0"));

        let updated = update_metadata(vec![a, b]);
        let a_x = updated[0].lockfile.get("x@^1.0.0").unwrap();
        assert_eq!(a_x.version, "1.4.0");
        assert!(updated[0].lockfile.contains("y@^2.0.0"));
    }

    #[test]
    fn test_optional_dependencies_walked() {
        let mut meta = ProjectMetadata::new("/a");
        meta.manifest.set(DepGroup::Dependencies, "chokidar", "^3.0.0");
        meta.lockfile.insert(
            "chokidar@^3.0.0",
            entry("chokidar", "3.5.3").with_optional_dependency("fsevents", "~2.3.2"),
        );
        meta.lockfile.insert("fsevents@~2.3.2", entry("fsevents", "2.3.3"));

        let updated = update_metadata(vec![meta]);
        assert!(updated[0].lockfile.contains("fsevents@~2.3.2"));
    }

    #[test]
    fn test_rebuild_from_keeps_every_seeded_range() {
        let mut meta = ProjectMetadata::new("/out");
        meta.manifest.set(DepGroup::Dependencies, "x", "^1.2.0");
        meta.lockfile.insert("x@^1.0.0", entry("x", "1.0.0"));
        meta.lockfile.insert("x@^1.2.0", entry("x", "1.2.0"));
        let metas = vec![meta];
        let index = EntryIndex::new(&metas);

        let seeds = [("x", "^1.2.0"), ("x", "^1.0.0")]
            .map(|(name, range)| (name.to_string(), range.to_string()));
        let lockfile = rebuild_from(seeds, &index);
        assert_eq!(lockfile.get("x@^1.0.0").unwrap().version, "1.2.0");
        assert_eq!(lockfile.get("x@^1.2.0").unwrap().version, "1.2.0");

        // Only the manifest's declaration survives a plain rebuild
        let plain = rebuild_lockfile(&metas[0].manifest, &index);
        assert_eq!(plain.specifiers().collect::<Vec<_>>(), ["x@^1.2.0"]);
    }

    #[test]
    fn test_unresolvable_declaration_skipped() {
        let mut meta = ProjectMetadata::new("/a");
        meta.manifest.set(DepGroup::Dependencies, "missing", "^1.0.0");
        let updated = update_metadata(vec![meta]);
        assert!(updated[0].lockfile.is_empty());
    }
}
