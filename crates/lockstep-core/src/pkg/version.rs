//! npm-style version ranges on top of `semver`.
//!
//! `semver::VersionReq` speaks Cargo's dialect, which differs from npm in a
//! few places that matter for lockfile matching:
//! - a bare version (`1.0.3`) is an exact pin in npm, a caret range in Cargo
//! - a bare partial (`1.2`) is `1.2.x` in npm, `^1.2` in Cargo
//! - npm separates comparators with spaces and alternatives with `||`
//!
//! [`Range`] normalizes npm syntax into one `VersionReq` per `||` alternative.

use super::error::PkgError;
use semver::{BuildMetadata, Op, Prerelease, Version, VersionReq};

/// A parsed npm version range: a disjunction of comparator sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    alternatives: Vec<VersionReq>,
}

impl Range {
    /// Parse an npm range such as `^1.0.0`, `>= 2.1.2 < 3`, `1.x || 2.0.0 - 2.5.0`.
    ///
    /// # Errors
    /// Returns an error if any alternative is not a valid range. Aliases
    /// (`npm:pkg@1.0.0`), tags (`latest`) and URLs are all rejected.
    pub fn parse(range: &str) -> Result<Self, PkgError> {
        let range = range.trim();
        let alternatives = range
            .split("||")
            .map(|alt| parse_comparator_set(alt.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PkgError::spec_invalid(format!("Invalid version range '{range}': {e}")))?;

        Ok(Self { alternatives })
    }

    /// Whether `version` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The lowest version that satisfies this range, if any.
    #[must_use]
    pub fn min_version(&self) -> Option<Version> {
        self.alternatives.iter().filter_map(min_for_set).min()
    }
}

/// Whether `range` parses as an npm semver range.
///
/// Anything else (an `npm:` alias, a git URL, a dist-tag) is treated as an
/// alias by the ranking code.
#[must_use]
pub fn is_valid_range(range: &str) -> bool {
    Range::parse(range).is_ok()
}

/// Parse a resolved version, tolerating a leading `v` or `=`.
#[must_use]
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version
        .strip_prefix('=')
        .or_else(|| version.strip_prefix('v'))
        .unwrap_or(version);
    Version::parse(version).ok()
}

/// Whether the version string satisfies the range string.
///
/// Returns `false` when either side fails to parse.
#[must_use]
pub fn satisfies(version: &str, range: &str) -> bool {
    match (parse_version(version), Range::parse(range)) {
        (Some(version), Ok(range)) => range.matches(&version),
        _ => false,
    }
}

/// The lowest version satisfying `range`, or `None` if the range is invalid
/// or unsatisfiable.
#[must_use]
pub fn min_version(range: &str) -> Option<Version> {
    Range::parse(range).ok()?.min_version()
}

/// The highest version in `versions` that satisfies `range`.
pub fn max_satisfying<'a>(
    versions: impl IntoIterator<Item = &'a Version>,
    range: &Range,
) -> Option<&'a Version> {
    versions.into_iter().filter(|v| range.matches(v)).max()
}

fn parse_comparator_set(set: &str) -> Result<VersionReq, String> {
    if let Some((start, end)) = parse_hyphen_range(set) {
        let converted = format!(">={start}, <={end}");
        return VersionReq::parse(&converted).map_err(|e| e.to_string());
    }

    let mut comparators = Vec::new();
    let mut pending_op = String::new();
    for token in set.split_whitespace() {
        if token.chars().all(is_op_char) {
            pending_op.push_str(token);
            continue;
        }
        let token = format!("{pending_op}{token}");
        pending_op.clear();
        comparators.push(normalize_comparator(&token)?);
    }
    if !pending_op.is_empty() {
        return Err(format!("dangling operator '{pending_op}'"));
    }

    if comparators.is_empty() {
        return Ok(VersionReq::STAR);
    }

    VersionReq::parse(&comparators.join(", ")).map_err(|e| e.to_string())
}

fn is_op_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^')
}

/// Parse a hyphen range like "1.0.0 - 2.0.0".
fn parse_hyphen_range(range: &str) -> Option<(&str, &str)> {
    let (start, end) = range.split_once(" - ")?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() || end.is_empty() {
        return None;
    }
    Some((start, end))
}

/// Rewrite a single npm comparator into Cargo's dialect.
fn normalize_comparator(token: &str) -> Result<String, String> {
    let op_len = token.find(|c: char| !is_op_char(c)).unwrap_or(token.len());
    let (op, rest) = token.split_at(op_len);
    let op = match op {
        "~>" => "~",
        "" | "=" | "<" | "<=" | ">" | ">=" | "~" | "^" => op,
        other => return Err(format!("unknown operator '{other}'")),
    };
    let rest = rest.strip_prefix('v').unwrap_or(rest);

    let core_end = rest.find(['-', '+']).unwrap_or(rest.len());
    let core = &rest[..core_end];
    let parts: Vec<&str> = core.split('.').collect();
    let specified: Vec<&str> = parts
        .iter()
        .take_while(|p| !matches!(**p, "x" | "X" | "*"))
        .copied()
        .collect();

    if core.is_empty() || specified.is_empty() {
        return Ok("*".to_string());
    }
    if parts.len() > 3 {
        return Err(format!("too many version components in '{token}'"));
    }
    let numbers = specified
        .iter()
        .map(|p| p.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("'{token}' is not a version"))?;

    let exact = matches!(op, "" | "=");
    match (numbers.as_slice(), exact) {
        ([_, _, _], true) => Ok(format!("={rest}")),
        ([_, _, _], false) => Ok(format!("{op}{rest}")),
        // "1" / "1.x" -> ">=1.0.0, <2.0.0"
        ([major], true) => {
            let next = bump(*major, token)?;
            Ok(format!(">={major}.0.0, <{next}.0.0"))
        }
        // "1.2" / "1.2.x" -> ">=1.2.0, <1.3.0"
        ([major, minor], true) => {
            let next = bump(*minor, token)?;
            Ok(format!(">={major}.{minor}.0, <{major}.{next}.0"))
        }
        // Cargo's partial semantics agree with npm for every other operator
        (partial, false) => {
            let joined: Vec<String> = partial.iter().map(u64::to_string).collect();
            Ok(format!("{op}{}", joined.join(".")))
        }
        _ => Err(format!("'{token}' is not a version")),
    }
}

/// The exclusive upper bound of a partial version component.
fn bump(component: u64, token: &str) -> Result<u64, String> {
    component
        .checked_add(1)
        .ok_or_else(|| format!("'{token}' is not a version"))
}

/// Lowest version matching one comparator set.
///
/// Candidates are the lower bound implied by each comparator; `<`/`<=` never
/// contribute one.
fn min_for_set(req: &VersionReq) -> Option<Version> {
    let zero = Version::new(0, 0, 0);
    if req.matches(&zero) {
        return Some(zero);
    }

    let mut candidates = Vec::new();
    for c in &req.comparators {
        let base = Version {
            major: c.major,
            minor: c.minor.unwrap_or(0),
            patch: c.patch.unwrap_or(0),
            pre: c.pre.clone(),
            build: BuildMetadata::EMPTY,
        };
        match c.op {
            Op::Exact | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
                candidates.push(base);
            }
            Op::Greater => match (c.minor, c.patch) {
                (Some(_), Some(_)) if c.pre.is_empty() => {
                    candidates.push(Version::new(base.major, base.minor, base.patch + 1));
                }
                (Some(_), Some(_)) => {
                    if let Ok(pre) = Prerelease::new(&format!("{}.0", c.pre.as_str())) {
                        candidates.push(Version { pre, ..base });
                    }
                }
                (Some(minor), None) => candidates.push(Version::new(c.major, minor + 1, 0)),
                (None, _) => candidates.push(Version::new(c.major + 1, 0, 0)),
            },
            _ => {}
        }
    }

    candidates.into_iter().filter(|v| req.matches(v)).min()
}
