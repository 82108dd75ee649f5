//! Package spec parsing.
//!
//! Parses `name@range` strings as they appear on the command line, in
//! lockfile specifiers, and inside `npm:` aliases:
//! - `has`
//! - `has@^1.0.3`
//! - `@types/node@^20`
//! - `function-bind@npm:no-bugs@1.0.0`

use super::error::PkgError;

/// Prefix of an alias range (`"foo": "npm:bar@^1.0.0"`).
pub const NPM_ALIAS_PREFIX: &str = "npm:";

/// A parsed package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Full package name (e.g., "@scope/name" or "name").
    pub name: String,
    /// Version range, alias or tag (None means latest).
    pub range: Option<String>,
}

impl PackageSpec {
    /// Parse a package specification string.
    ///
    /// # Errors
    /// Returns an error if the spec is invalid.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        let (name, range) = match split_specifier(input) {
            Some((name, range)) => (name, Some(range)),
            None if input.ends_with('@') && input.len() > 1 => {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid package spec: empty version range in '{input}'"
                )));
            }
            None => (input, None),
        };

        validate_name(name, input)?;

        Ok(Self {
            name: name.to_string(),
            range: range.map(str::to_string),
        })
    }

    /// URL-encode the package name for registry requests.
    ///
    /// For scoped packages, encodes the `/` as `%2F`.
    #[must_use]
    pub fn url_encoded_name(&self) -> String {
        encode_name(&self.name)
    }
}

/// Split a single lockfile specifier into `(name, rangeOrAlias)` at the first
/// `@` that is not the leading scope marker.
///
/// Returns `None` when there is no such `@` or either side is empty.
#[must_use]
pub fn split_specifier(specifier: &str) -> Option<(&str, &str)> {
    let at_pos = specifier.get(1..)?.find('@')? + 1;
    let (name, range) = (&specifier[..at_pos], &specifier[at_pos + 1..]);
    if name.is_empty() || range.is_empty() {
        return None;
    }
    Some((name, range))
}

/// The real package behind an `npm:` alias range, if `range` is one.
#[must_use]
pub fn alias_target(range: &str) -> Option<PackageSpec> {
    let target = range.strip_prefix(NPM_ALIAS_PREFIX)?;
    PackageSpec::parse(target).ok()
}

/// Build the lockfile specifier for a name and range.
#[must_use]
pub fn specifier(name: &str, range: &str) -> String {
    format!("{name}@{range}")
}

/// URL-encode a package name, escaping the scope separator.
#[must_use]
pub fn encode_name(name: &str) -> String {
    if name.starts_with('@') {
        name.replace('/', "%2F")
    } else {
        name.to_string()
    }
}

fn validate_name(name: &str, input: &str) -> Result<(), PkgError> {
    let bare = match name.strip_prefix('@') {
        Some(scoped) => {
            let Some((scope, pkg)) = scoped.split_once('/') else {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid scoped package: missing '/' in '{input}'"
                )));
            };
            if scope.is_empty() || pkg.is_empty() {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid scoped package: empty scope or name in '{input}'"
                )));
            }
            [scope, pkg]
        }
        None => [name, ""],
    };

    for part in bare {
        for c in part.chars() {
            if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid character '{c}' in package name '{name}'"
                )));
            }
        }
    }

    Ok(())
}
