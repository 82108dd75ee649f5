//! Lockfile entry ranking.
//!
//! Given a `name` and `range`, find every lockfile entry across a set of
//! projects that can serve it, ordered worst to best:
//! 1. plain semver entries before alias entries (`foo@npm:bar@1.0.0`)
//! 2. then by ascending resolved version
//! 3. then later projects before earlier ones
//!
//! Callers take the **last** element.

use super::lockfile::LockEntry;
use super::metadata::ProjectMetadata;
use super::spec::split_specifier;
use super::version::{is_valid_range, parse_version, Range};
use semver::Version;
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

/// A reference to one entry in one project's lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockfilePointer<'a> {
    /// Index of the owning project in the metadata slice.
    pub project: usize,
    pub specifier: &'a str,
    pub entry: &'a LockEntry,
    /// The specifier's range part is not a semver range.
    pub is_alias: bool,
}

#[derive(Debug)]
struct Indexed<'a> {
    pointer: LockfilePointer<'a>,
    version: Option<Version>,
}

impl Indexed<'_> {
    fn rank_key(&self) -> (bool, Option<&Version>, Reverse<usize>) {
        (
            self.pointer.is_alias,
            self.version.as_ref(),
            Reverse(self.pointer.project),
        )
    }
}

/// Every lockfile entry of a project set, grouped by package name.
///
/// Built once per pass so repeated queries do not rescan every lockfile.
#[derive(Debug, Default)]
pub struct EntryIndex<'a> {
    by_name: HashMap<&'a str, Vec<Indexed<'a>>>,
}

impl<'a> EntryIndex<'a> {
    #[must_use]
    pub fn new(metas: &'a [ProjectMetadata]) -> Self {
        let mut by_name: HashMap<&'a str, Vec<Indexed<'a>>> = HashMap::new();
        for (project, meta) in metas.iter().enumerate() {
            for (specifier, entry) in meta.lockfile.iter() {
                let Some((name, range)) = split_specifier(specifier) else {
                    continue;
                };
                by_name.entry(name).or_default().push(Indexed {
                    pointer: LockfilePointer {
                        project,
                        specifier,
                        entry,
                        is_alias: !is_valid_range(range),
                    },
                    version: parse_version(&entry.version),
                });
            }
        }
        Self { by_name }
    }

    /// Every entry that can serve `name@range`, worst first.
    #[must_use]
    pub fn find(&self, name: &str, range: &str) -> Vec<LockfilePointer<'a>> {
        let Some(candidates) = self.by_name.get(name) else {
            return Vec::new();
        };
        let range = Range::parse(range).ok();

        let mut matches: Vec<&Indexed<'a>> = candidates
            .iter()
            .filter(|c| {
                c.pointer.is_alias
                    || match (&range, &c.version) {
                        (Some(range), Some(version)) => range.matches(version),
                        _ => false,
                    }
            })
            .collect();
        matches.sort_by(|a, b| compare(a, b));
        matches.into_iter().map(|c| c.pointer).collect()
    }

    /// The best entry for `name@range`, if any.
    #[must_use]
    pub fn best(&self, name: &str, range: &str) -> Option<LockfilePointer<'a>> {
        self.find(name, range).pop()
    }
}

fn compare(a: &Indexed<'_>, b: &Indexed<'_>) -> Ordering {
    a.rank_key().cmp(&b.rank_key())
}

/// Rank every entry across `metas` that can serve `name@range`, worst first.
#[must_use]
pub fn find_lockfile_entries<'a>(
    name: &str,
    range: &str,
    metas: &'a [ProjectMetadata],
) -> Vec<LockfilePointer<'a>> {
    EntryIndex::new(metas).find(name, range)
}

/// The best entry for `name@range` across `metas`.
#[must_use]
pub fn find_best_entry<'a>(
    name: &str,
    range: &str,
    metas: &'a [ProjectMetadata],
) -> Option<LockfilePointer<'a>> {
    find_lockfile_entries(name, range, metas).pop()
}
