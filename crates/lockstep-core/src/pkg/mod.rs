//! Dependency metadata engine.
//!
//! Provides utilities for:
//! - Parsing and writing yarn v1 lockfiles
//! - Reading and editing package.json declarations
//! - Ranking lockfile entries across several projects
//! - Planning removals, upgrades and additions
//! - Resolving new dependencies through a pluggable [`Resolver`]
//! - Rebuilding each project's lockfile to what it can reach
//! - Guarding frozen lockfiles against drift
//! - Deduplicating and merging lockfiles across projects
//! - Reporting declared-version divergence

pub mod apply;
pub mod check;
pub mod dedupe;
pub mod error;
pub mod graph;
pub mod guard;
pub mod lockfile;
pub mod manifest;
pub mod metadata;
pub mod npmrc;
pub mod ops;
pub mod plan;
pub mod rank;
pub mod registry;
pub mod resolver;
pub mod spec;
pub mod version;

pub use apply::apply_metadata_changes;
pub use check::{check, CheckReport, CHECKED_GROUPS};
pub use dedupe::{dedupe_lockfiles, repoint_lockfiles};
pub use error::{codes as pkg_codes, PkgError};
pub use graph::{rebuild_from, rebuild_lockfile, update_metadata};
pub use guard::{diff_metadata, ensure_unchanged, frozen_lockfile_violation, lockfile_shape_hash};
pub use lockfile::{LockEntry, Lockfile, LOCKFILE_NAME};
pub use manifest::{DepEntry, DepGroup, Manifest, MANIFEST_NAME};
pub use metadata::{load_metadata, write_metadata, ProjectMetadata};
pub use npmrc::{load_npmrc_files, parse_npmrc, NpmrcConfig, NPMRC_NAME};
pub use ops::OpOutcome;
pub use plan::{
    get_additional_deps, get_missing_deps, plan_changes, prune_metadata, ChangeRequest,
    DepRequest, PackageDeps, PendingChanges,
};
pub use rank::{find_best_entry, find_lockfile_entries, EntryIndex, LockfilePointer};
pub use registry::{get_latest_version, RegistryClient, DEFAULT_REGISTRY, REGISTRY_ENV};
pub use resolver::{
    augment_metadata, download_metadata, MemoryResolver, ResolveOptions, Resolver, YarnResolver,
    WORKDIR_PREFIX,
};
pub use spec::{alias_target, split_specifier, PackageSpec, NPM_ALIAS_PREFIX};
pub use version::{is_valid_range, min_version, satisfies, Range};
