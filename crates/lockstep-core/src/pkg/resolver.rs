//! Resolution boundary.
//!
//! Dependencies that no existing lockfile entry can serve are handed to a
//! [`Resolver`], one isolated working directory per project, and the results
//! are folded back into the project metadata.

use super::error::PkgError;
use super::lockfile::{LockEntry, Lockfile, LOCKFILE_NAME};
use super::manifest::{Manifest, MANIFEST_NAME};
use super::metadata::ProjectMetadata;
use super::npmrc::{NpmrcConfig, NPMRC_NAME};
use super::plan::PackageDeps;
use super::registry::RegistryClient;
use super::spec::{alias_target, specifier};
use super::version::{max_satisfying, parse_version, Range};
use rayon::prelude::*;
use semver::Version;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Prefix of per-request working directories.
pub const WORKDIR_PREFIX: &str = "lockstep-";

/// Turns a request manifest into a resolved manifest plus lockfile.
pub trait Resolver: Send + Sync {
    /// Resolve every declaration in `request`. `workdir` is an empty private
    /// directory that already contains `request` as package.json.
    ///
    /// # Errors
    /// Returns an error if resolution fails.
    fn resolve(&self, workdir: &Path, request: &Manifest) -> Result<(Manifest, Lockfile), PkgError>;

    /// The latest published version of `name`.
    ///
    /// # Errors
    /// Returns an error if the version cannot be determined.
    fn latest_version(&self, name: &str) -> Result<String, PkgError>;
}

/// Options for [`download_metadata`].
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Names never sent to the resolver.
    pub ignore: Vec<String>,
    /// Fail instead of resolving anything.
    pub frozen_lockfile: bool,
    /// Parent of the per-request working directories.
    pub tmp_dir: PathBuf,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            frozen_lockfile: false,
            tmp_dir: std::env::temp_dir(),
        }
    }
}

/// Resolve every request, tagging each result with its project directory.
///
/// With `frozen_lockfile`, any non-empty request fails before the resolver is
/// contacted. Requests left empty after dropping ignored names are skipped.
///
/// # Errors
/// Returns the frozen-lockfile violation or the first resolution error.
pub fn download_metadata(
    requests: &[PackageDeps],
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<Vec<ProjectMetadata>, PkgError> {
    if options.frozen_lockfile && requests.iter().any(|r| !r.deps.is_empty()) {
        return Err(PkgError::FrozenLockfile);
    }

    let resolved: Vec<Option<ProjectMetadata>> = requests
        .par_iter()
        .map(|request| resolve_one(request, options, resolver))
        .collect::<Result<_, _>>()?;

    Ok(resolved.into_iter().flatten().collect())
}

fn resolve_one(
    request: &PackageDeps,
    options: &ResolveOptions,
    resolver: &dyn Resolver,
) -> Result<Option<ProjectMetadata>, PkgError> {
    let mut manifest = Manifest::new();
    for dep in &request.deps {
        if options.ignore.iter().any(|name| *name == dep.name) {
            debug!(name = %dep.name, "Ignoring dependency");
            continue;
        }
        let range = match dep.range.as_deref() {
            Some(range) if !range.is_empty() => range.to_string(),
            _ => format!("^{}", resolver.latest_version(&dep.name)?),
        };
        manifest.set(dep.group, &dep.name, &range);
    }

    let count = manifest.dep_entries().len();
    if count == 0 {
        return Ok(None);
    }

    std::fs::create_dir_all(&options.tmp_dir).map_err(|e| PkgError::io(&options.tmp_dir, e))?;
    let workdir = tempfile::Builder::new()
        .prefix(WORKDIR_PREFIX)
        .tempdir_in(&options.tmp_dir)
        .map_err(|e| PkgError::io(&options.tmp_dir, e))?;
    let manifest_path = workdir.path().join(MANIFEST_NAME);
    std::fs::write(&manifest_path, manifest.to_json_string())
        .map_err(|e| PkgError::io(&manifest_path, e))?;

    info!(
        dir = %request.dir.display(),
        workdir = %workdir.path().display(),
        count,
        "Resolving dependencies"
    );
    let (manifest, lockfile) = resolver.resolve(workdir.path(), &manifest)?;

    Ok(Some(ProjectMetadata {
        dir: request.dir.clone(),
        manifest,
        lockfile,
    }))
}

/// Fold resolved metadata into the targets with the same directory.
///
/// Source lockfile entries overwrite or extend the target's; every source
/// declaration is set on the target manifest in the same group.
pub fn augment_metadata(targets: &mut [ProjectMetadata], sources: Vec<ProjectMetadata>) {
    for source in sources {
        let Some(target) = targets.iter_mut().find(|t| t.dir == source.dir) else {
            warn!(dir = %source.dir.display(), "No project to receive resolved metadata");
            continue;
        };
        for entry in source.manifest.dep_entries() {
            target.manifest.set(entry.group, &entry.name, &entry.range);
        }
        target.lockfile.extend(source.lockfile);
    }
}

/// Resolves by running `yarn install` in the working directory.
#[derive(Debug, Clone)]
pub struct YarnResolver {
    yarn: PathBuf,
    npmrc: NpmrcConfig,
}

impl YarnResolver {
    /// Create a resolver around a `yarn` executable and an `.npmrc` overlay.
    #[must_use]
    pub fn new(yarn: impl Into<PathBuf>, npmrc: NpmrcConfig) -> Self {
        Self {
            yarn: yarn.into(),
            npmrc,
        }
    }
}

impl Resolver for YarnResolver {
    fn resolve(&self, workdir: &Path, _request: &Manifest) -> Result<(Manifest, Lockfile), PkgError> {
        if !self.npmrc.is_empty() {
            let npmrc_path = workdir.join(NPMRC_NAME);
            std::fs::write(&npmrc_path, self.npmrc.render())
                .map_err(|e| PkgError::io(&npmrc_path, e))?;
        }

        let registry = self.npmrc.registry();
        debug!(yarn = %self.yarn.display(), registry = %registry, "Running yarn install");
        let output = Command::new(&self.yarn)
            .args([
                "install",
                "--ignore-scripts",
                "--ignore-engines",
                "--non-interactive",
                "--registry",
                registry.as_str(),
            ])
            .current_dir(workdir)
            .output()
            .map_err(|e| {
                PkgError::resolver(format!("Failed to run {}: {e}", self.yarn.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PkgError::resolver(format!(
                "yarn install exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let manifest = Manifest::read_from(&workdir.join(MANIFEST_NAME))?;
        let lockfile = Lockfile::read_from(&workdir.join(LOCKFILE_NAME))?;
        Ok((manifest, lockfile))
    }

    fn latest_version(&self, name: &str) -> Result<String, PkgError> {
        let url = self.npmrc.registry_for(name);
        let client =
            RegistryClient::new(url.as_str())?.with_auth_token(self.npmrc.auth_token_for(&url));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to start async runtime: {e}")))?;
        runtime.block_on(client.latest_version(name))
    }
}

/// One published version in a [`MemoryResolver`].
#[derive(Debug, Clone, Default)]
struct Published {
    dependencies: BTreeMap<String, String>,
    optional_dependencies: BTreeMap<String, String>,
}

/// In-memory registry fixture.
///
/// Picks the highest version satisfying each range and walks the transitive
/// closure. `npm:` aliases resolve to the aliased package.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    packages: BTreeMap<String, BTreeMap<Version, Published>>,
    calls: AtomicUsize,
}

impl MemoryResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `name@version` with the given dependencies.
    ///
    /// # Panics
    /// Panics if `version` is not a valid semver version.
    #[must_use]
    pub fn with_package(mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> Self {
        self.publish(name, version, deps, &[]);
        self
    }

    /// Publish `name@version` with dependencies and optional dependencies.
    ///
    /// # Panics
    /// Panics if `version` is not a valid semver version.
    #[must_use]
    pub fn with_optional_package(
        mut self,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
        optional: &[(&str, &str)],
    ) -> Self {
        self.publish(name, version, deps, optional);
        self
    }

    fn publish(&mut self, name: &str, version: &str, deps: &[(&str, &str)], optional: &[(&str, &str)]) {
        let version = parse_version(version).expect("fixture versions must be valid semver");
        let collect = |edges: &[(&str, &str)]| -> BTreeMap<String, String> {
            edges
                .iter()
                .map(|(n, r)| ((*n).to_string(), (*r).to_string()))
                .collect()
        };
        self.packages.entry(name.to_string()).or_default().insert(
            version,
            Published {
                dependencies: collect(deps),
                optional_dependencies: collect(optional),
            },
        );
    }

    /// How many times [`Resolver::resolve`] has been called.
    #[must_use]
    pub fn resolve_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The tarball URL this fixture reports for a package version.
    #[must_use]
    pub fn tarball_url(name: &str, version: &str) -> String {
        let basename = name.rsplit('/').next().unwrap_or(name);
        format!("https://registry.example.test/{name}/-/{basename}-{version}.tgz")
    }

    fn pick(&self, name: &str, range: &str) -> Result<(&Version, &Published), PkgError> {
        let versions = self
            .packages
            .get(name)
            .ok_or_else(|| PkgError::resolver(format!("Package '{name}' not found")))?;
        let parsed = Range::parse(range)?;
        max_satisfying(versions.keys(), &parsed)
            .and_then(|version| versions.get_key_value(version))
            .ok_or_else(|| PkgError::resolver(format!("No version of '{name}' matches '{range}'")))
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, _workdir: &Path, request: &Manifest) -> Result<(Manifest, Lockfile), PkgError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut lockfile = Lockfile::new();
        let mut queue: VecDeque<(String, String)> = request
            .dep_entries()
            .into_iter()
            .map(|entry| (entry.name, entry.range))
            .collect();

        while let Some((name, range)) = queue.pop_front() {
            let key = specifier(&name, &range);
            if lockfile.contains(&key) {
                continue;
            }

            let (real_name, real_range) = match alias_target(&range) {
                Some(target) => (target.name, target.range.unwrap_or_else(|| "*".to_string())),
                None => (name, range),
            };
            let (version, published) = self.pick(&real_name, &real_range)?;
            let version = version.to_string();

            let entry = LockEntry {
                version: version.clone(),
                resolved: Some(Self::tarball_url(&real_name, &version)),
                integrity: None,
                dependencies: published.dependencies.clone(),
                optional_dependencies: published.optional_dependencies.clone(),
                extra: BTreeMap::new(),
            };
            queue.extend(
                entry
                    .edges()
                    .map(|(dep, dep_range)| (dep.to_string(), dep_range.to_string())),
            );
            lockfile.insert(key, entry);
        }

        Ok((request.clone(), lockfile))
    }

    fn latest_version(&self, name: &str) -> Result<String, PkgError> {
        self.packages
            .get(name)
            .and_then(|versions| versions.keys().next_back())
            .map(ToString::to_string)
            .ok_or_else(|| PkgError::registry(format!("Package '{name}' not found in registry")))
    }
}
