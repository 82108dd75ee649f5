//! Command entry points: load, edit, write.
//!
//! Every command loads metadata fresh, edits it in memory, and only writes
//! once every step has succeeded. Writes happen project by project.

use super::apply::apply_metadata_changes;
use super::dedupe::{dedupe_lockfiles, repoint_lockfiles};
use super::error::PkgError;
use super::graph::rebuild_from;
use super::guard::ensure_unchanged;
use super::metadata::{load_metadata, write_metadata, ProjectMetadata};
use super::plan::{ChangeRequest, DepRequest};
use super::rank::EntryIndex;
use super::resolver::{augment_metadata, ResolveOptions, Resolver};
use super::spec::PackageSpec;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub use super::check::{check, CheckReport};

/// What a mutating command did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpOutcome {
    /// Projects loaded.
    pub projects: usize,
    /// Files whose content changed.
    pub written: Vec<PathBuf>,
}

fn run_edit(
    roots: &[PathBuf],
    change: &ChangeRequest,
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<OpOutcome, PkgError> {
    let metas = load_metadata(roots)?;
    let projects = metas.len();
    let updated = apply_metadata_changes(metas, roots, change, options, resolver)?;
    let written = write_metadata(&updated)?;
    info!(projects, written = written.len(), "Metadata updated");
    Ok(OpOutcome { projects, written })
}

/// Add dependencies to every root.
///
/// # Errors
/// Returns load, resolve, frozen-lockfile, or write errors.
pub fn add(
    roots: &[PathBuf],
    additions: Vec<DepRequest>,
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<OpOutcome, PkgError> {
    let change = ChangeRequest {
        additions,
        ..ChangeRequest::default()
    };
    run_edit(roots, &change, options, resolver)
}

/// Remove dependencies from every group of every root.
///
/// # Errors
/// Returns load, resolve, frozen-lockfile, or write errors.
pub fn remove(
    roots: &[PathBuf],
    removals: Vec<String>,
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<OpOutcome, PkgError> {
    let change = ChangeRequest {
        removals,
        ..ChangeRequest::default()
    };
    run_edit(roots, &change, options, resolver)
}

/// Replace existing declarations of each addition's name, keeping their groups.
///
/// With `from`, only declarations whose current minimum version satisfies the
/// matching filter are upgraded.
///
/// # Errors
/// Returns load, resolve, frozen-lockfile, or write errors.
pub fn upgrade(
    roots: &[PathBuf],
    additions: Vec<DepRequest>,
    from: Vec<PackageSpec>,
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<OpOutcome, PkgError> {
    let removals = additions.iter().map(|a| a.name.clone()).collect();
    let change = ChangeRequest {
        additions,
        removals,
        from,
    };
    run_edit(roots, &change, options, resolver)
}

/// Resolve missing entries and prune unreachable ones.
///
/// # Errors
/// Returns load, resolve, frozen-lockfile, or write errors.
pub fn sync(
    roots: &[PathBuf],
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<OpOutcome, PkgError> {
    run_edit(roots, &ChangeRequest::default(), options, resolver)
}

/// Combine every root's declarations and lockfile into `out`.
///
/// Only `out` is written; roots are read and synced in memory. When roots
/// declare different ranges of one name, `out`'s manifest keeps the last
/// root's range but its lockfile keeps every root's `name@range`, each
/// pointing at the highest version that satisfies it.
///
/// # Errors
/// Returns load, resolve, frozen-lockfile, or write errors.
pub fn merge(
    roots: &[PathBuf],
    out: &Path,
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<OpOutcome, PkgError> {
    let metas = load_metadata(roots)?;
    let projects = metas.len();
    let changed =
        apply_metadata_changes(metas, roots, &ChangeRequest::default(), options, resolver)?;

    // out's manifest holds one range per name; the lockfile keeps them all
    let declared: Vec<(String, String)> = changed
        .iter()
        .flat_map(|meta| meta.manifest.dep_entries())
        .map(|entry| (entry.name, entry.range))
        .collect();

    let baseline = vec![ProjectMetadata::read(out)?];
    let mut output = baseline.clone();
    let sources: Vec<ProjectMetadata> = changed
        .into_iter()
        .map(|meta| ProjectMetadata {
            dir: out.to_path_buf(),
            ..meta
        })
        .collect();
    augment_metadata(&mut output, sources);

    let mut merged = repoint_lockfiles(output);
    let lockfile = {
        let index = EntryIndex::new(&merged);
        let manifest_roots = merged
            .iter()
            .flat_map(|meta| meta.manifest.dep_entries())
            .map(|entry| (entry.name, entry.range));
        rebuild_from(manifest_roots.chain(declared), &index)
    };
    for meta in &mut merged {
        meta.lockfile = lockfile.clone();
    }
    ensure_unchanged(options.frozen_lockfile, &baseline, &merged)?;

    let written = write_metadata(&merged)?;
    info!(
        projects,
        out = %out.display(),
        entries = merged.first().map_or(0, |m| m.lockfile.len()),
        "Merged metadata"
    );
    Ok(OpOutcome { projects, written })
}

/// Deduplicate lockfile entries across roots without contacting a resolver.
///
/// # Errors
/// Returns load, frozen-lockfile, or write errors.
pub fn optimize(roots: &[PathBuf], frozen_lockfile: bool) -> Result<OpOutcome, PkgError> {
    let metas = load_metadata(roots)?;
    let projects = metas.len();
    let baseline = frozen_lockfile.then(|| metas.clone());

    let deduped = dedupe_lockfiles(metas);
    if let Some(baseline) = baseline {
        ensure_unchanged(true, &baseline, &deduped)?;
    }

    let written = write_metadata(&deduped)?;
    info!(projects, written = written.len(), "Optimized lockfiles");
    Ok(OpOutcome { projects, written })
}
