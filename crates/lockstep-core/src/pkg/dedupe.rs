//! Cross-project lockfile deduplication.
//!
//! Every `name@range` across the project set is pointed at the highest
//! version of `name` that satisfies `range`, wherever that entry lives.
//! Entries pulled in this way bring their transitive dependencies along, and
//! the result is pruned to what each manifest can reach.
//!
//! Alias specifiers (`foo@npm:bar@1.0.0`) are never repointed. The closing
//! rebuild still ranks across every project, so an alias entry in one project
//! can serve a plain range of the same name in another.

use super::graph::update_metadata;
use super::lockfile::{LockEntry, Lockfile};
use super::metadata::ProjectMetadata;
use super::spec::{specifier, split_specifier};
use super::version::{parse_version, Range};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Deduplicate versions across every project's lockfile.
#[must_use]
pub fn dedupe_lockfiles(metas: Vec<ProjectMetadata>) -> Vec<ProjectMetadata> {
    update_metadata(repoint_lockfiles(metas))
}

/// Point every non-alias specifier at its winning entry and pull in the
/// winners' transitive dependencies, without pruning anything.
#[must_use]
pub fn repoint_lockfiles(metas: Vec<ProjectMetadata>) -> Vec<ProjectMetadata> {
    let winners = pick_winners(&metas);

    let mut rewritten = 0usize;
    let metas: Vec<ProjectMetadata> = metas
        .into_iter()
        .map(|mut meta| {
            let mut lockfile = Lockfile::new();
            for (spec, entry) in meta.lockfile.iter() {
                let winner = winners.get(spec).filter(|w| !is_alias(spec) && *w != entry);
                if winner.is_some() {
                    rewritten += 1;
                }
                lockfile.insert(spec, winner.unwrap_or(entry).clone());
            }
            propagate(&mut lockfile, &winners);
            meta.lockfile = lockfile;
            meta
        })
        .collect();

    info!(
        projects = metas.len(),
        rewritten, "Deduplicated lockfile entries"
    );
    metas
}

fn is_alias(spec: &str) -> bool {
    !split_specifier(spec).is_some_and(|(_, range)| Range::parse(range).is_ok())
}

/// Map every specifier seen in any lockfile to the entry it should use.
fn pick_winners(metas: &[ProjectMetadata]) -> BTreeMap<String, LockEntry> {
    // name -> (version, entry) for every non-alias entry
    let mut by_name: BTreeMap<&str, Vec<(Version, &LockEntry)>> = BTreeMap::new();
    let mut specs: BTreeSet<&str> = BTreeSet::new();
    for meta in metas {
        for (spec, entry) in meta.lockfile.iter() {
            specs.insert(spec);
            let Some((name, range)) = split_specifier(spec) else {
                continue;
            };
            if Range::parse(range).is_err() {
                continue;
            }
            if let Some(version) = parse_version(&entry.version) {
                by_name.entry(name).or_default().push((version, entry));
            }
        }
    }

    let mut winners = BTreeMap::new();
    for spec in specs {
        let winner = split_specifier(spec).and_then(|(name, range)| {
            let range = Range::parse(range).ok()?;
            by_name
                .get(name)?
                .iter()
                .filter(|(version, _)| range.matches(version))
                .max_by(|a, b| a.0.cmp(&b.0))
                .map(|(_, entry)| (*entry).clone())
        });
        let winner = winner.or_else(|| highest_own_entry(metas, spec));
        if let Some(entry) = winner {
            winners.insert(spec.to_string(), entry);
        }
    }
    winners
}

/// The highest-versioned entry stored under exactly `spec` in any project.
fn highest_own_entry(metas: &[ProjectMetadata], spec: &str) -> Option<LockEntry> {
    metas
        .iter()
        .filter_map(|meta| meta.lockfile.get(spec))
        .max_by(|a, b| parse_version(&a.version).cmp(&parse_version(&b.version)))
        .cloned()
}

/// Pull in every edge of the lockfile's entries until nothing is missing.
fn propagate(lockfile: &mut Lockfile, winners: &BTreeMap<String, LockEntry>) {
    let mut pending: Vec<String> = lockfile
        .iter()
        .flat_map(|(_, entry)| entry.edges().map(|(name, range)| specifier(name, range)))
        .collect();

    while let Some(spec) = pending.pop() {
        if lockfile.contains(&spec) {
            continue;
        }
        let Some(entry) = winners.get(&spec) else {
            continue;
        };
        debug!(specifier = %spec, "Propagating transitive entry");
        pending.extend(entry.edges().map(|(name, range)| specifier(name, range)));
        lockfile.insert(spec, entry.clone());
    }
}
