//! Declared-version divergence report.

use super::error::PkgError;
use super::manifest::{DepGroup, Manifest, MANIFEST_NAME};
use super::metadata::ProjectMetadata;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Groups consulted by [`check`]. `resolutions` are not declarations.
pub const CHECKED_GROUPS: [DepGroup; 4] = [
    DepGroup::Dependencies,
    DepGroup::DevDependencies,
    DepGroup::PeerDependencies,
    DepGroup::OptionalDependencies,
];

/// `name -> range -> projects declaring it`, only for names declared with
/// more than one distinct range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CheckReport {
    pub versions: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl CheckReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Report dependencies declared with different ranges across `roots`.
///
/// Only package.json files are read. A project without a `name` is reported
/// by its directory name; a missing package.json declares nothing.
///
/// # Errors
/// Returns an error if a package.json exists but is malformed.
pub fn check(roots: &[PathBuf]) -> Result<CheckReport, PkgError> {
    let manifests: Vec<(String, Manifest)> = roots
        .par_iter()
        .map(|dir| {
            let meta = ProjectMetadata {
                manifest: Manifest::read_from(&dir.join(MANIFEST_NAME))?,
                ..ProjectMetadata::new(dir.clone())
            };
            Ok((meta.display_name(), meta.manifest))
        })
        .collect::<Result<_, PkgError>>()?;

    let mut versions: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    for (project, manifest) in &manifests {
        for group in CHECKED_GROUPS {
            for (name, range) in manifest.group(group) {
                let projects = versions
                    .entry(name.to_string())
                    .or_default()
                    .entry(range.to_string())
                    .or_default();
                if !projects.contains(project) {
                    projects.push(project.clone());
                }
            }
        }
    }

    versions.retain(|_, ranges| ranges.len() > 1);
    for projects in versions.values_mut().flat_map(BTreeMap::values_mut) {
        projects.sort();
    }

    Ok(CheckReport { versions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_NAME), content).unwrap();
    }

    #[test]
    fn test_reports_divergent_ranges() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let c = tmp.path().join("c");
        write_manifest(&a, r#"{"name":"a","dependencies":{"has":"^1.0.3","same":"1.0.0"}}"#);
        write_manifest(&b, r#"{"name":"b","devDependencies":{"has":"^1.0.0","same":"1.0.0"}}"#);
        write_manifest(&c, r#"{"name":"c","peerDependencies":{"has":"^1.0.0"}}"#);

        let report = check(&[a, b, c]).unwrap();
        assert_eq!(report.versions.len(), 1);
        let has = &report.versions["has"];
        assert_eq!(has["^1.0.3"], ["a"]);
        assert_eq!(has["^1.0.0"], ["b", "c"]);
    }

    #[test]
    fn test_empty_when_projects_agree() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        write_manifest(&a, r#"{"name":"a","dependencies":{"has":"^1.0.3"}}"#);
        write_manifest(&b, r#"{"name":"b","optionalDependencies":{"has":"^1.0.3"}}"#);

        assert!(check(&[a, b]).unwrap().is_empty());
    }

    #[test]
    fn test_resolutions_ignored() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a");
        write_manifest(
            &a,
            r#"{"name":"a","dependencies":{"has":"^1.0.3"},"resolutions":{"has":"1.0.3"}}"#,
        );
        assert!(check(&[a]).unwrap().is_empty());
    }

    #[test]
    fn test_unnamed_and_missing_projects() {
        let tmp = tempdir().unwrap();
        let web = tmp.path().join("web");
        let api = tmp.path().join("api");
        write_manifest(&web, r#"{"dependencies":{"has":"^1.0.3"}}"#);
        write_manifest(&api, r#"{"dependencies":{"has":"^1.0.0"}}"#);

        let report = check(&[web, api, tmp.path().join("missing")]).unwrap();
        assert_eq!(report.versions["has"]["^1.0.3"], ["web"]);
        assert_eq!(report.versions["has"]["^1.0.0"], ["api"]);
    }

    #[test]
    fn test_same_project_listed_once() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        write_manifest(
            &a,
            r#"{"name":"a","dependencies":{"has":"^1.0.3"},"peerDependencies":{"has":"^1.0.3"}}"#,
        );
        write_manifest(&b, r#"{"name":"b","dependencies":{"has":"^1.0.0"}}"#);

        let report = check(&[a, b]).unwrap();
        assert_eq!(report.versions["has"]["^1.0.3"], ["a"]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut report = CheckReport::default();
        report
            .versions
            .entry("has".into())
            .or_default()
            .insert("^1.0.0".into(), vec!["a".into()]);
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"has":{"^1.0.0":["a"]}}"#
        );
    }
}
