//! package.json model.
//!
//! Only the five declaration groups are interpreted; every other field is
//! carried through untouched, in its original order, so rewriting a manifest
//! never reshuffles scripts or workspace settings.

use super::error::PkgError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Manifest filename.
pub const MANIFEST_NAME: &str = "package.json";

/// A declaration group in package.json.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DepGroup {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
    Resolutions,
}

impl DepGroup {
    /// Every group, in the order they are visited.
    pub const ALL: [Self; 5] = [
        Self::Dependencies,
        Self::DevDependencies,
        Self::PeerDependencies,
        Self::OptionalDependencies,
        Self::Resolutions,
    ];

    /// The package.json key for this group.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
            Self::PeerDependencies => "peerDependencies",
            Self::OptionalDependencies => "optionalDependencies",
            Self::Resolutions => "resolutions",
        }
    }
}

impl fmt::Display for DepGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepGroup {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == s)
            .ok_or_else(|| PkgError::spec_invalid(format!("Unknown dependency type '{s}'")))
    }
}

/// A single declaration extracted from a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DepEntry {
    pub name: String,
    pub range: String,
    pub group: DepGroup,
}

impl DepEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, range: impl Into<String>, group: DepGroup) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
            group,
        }
    }
}

/// A project's package.json.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    fields: Map<String, Value>,
}

impl Manifest {
    /// Create an empty manifest (`{}`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse package.json content. `path` is only used for error messages.
    ///
    /// # Errors
    /// Returns an error if the content is not a JSON object, or if a
    /// declaration group is not an object of string ranges.
    pub fn parse(content: &str, path: &Path) -> Result<Self, PkgError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| PkgError::manifest_invalid(path, format!("Invalid JSON: {e}")))?;

        let Value::Object(fields) = value else {
            return Err(PkgError::manifest_invalid(
                path,
                "package.json must be a JSON object",
            ));
        };

        for group in DepGroup::ALL {
            let Some(section) = fields.get(group.as_str()) else {
                continue;
            };
            let Some(section) = section.as_object() else {
                return Err(PkgError::manifest_invalid(
                    path,
                    format!("'{group}' must be an object, got {}", json_type_name(section)),
                ));
            };
            for (name, range) in section {
                if !range.is_string() {
                    return Err(PkgError::manifest_invalid(
                        path,
                        format!(
                            "Invalid range for '{name}' in '{group}': expected string, got {}",
                            json_type_name(range)
                        ),
                    ));
                }
            }
        }

        Ok(Self { fields })
    }

    /// Read a manifest, treating a missing file as `{}`.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self, PkgError> {
        match lockstep_util::fs::read_optional(path).map_err(|e| PkgError::io(path, e))? {
            Some(content) => Self::parse(&content, path),
            None => Ok(Self::new()),
        }
    }

    /// Serialize pretty-printed with a trailing newline.
    ///
    /// # Panics
    /// Panics if serialization fails (cannot happen for a JSON object with string keys).
    #[must_use]
    pub fn to_json_string(&self) -> String {
        let mut out = serde_json::to_string_pretty(&self.fields)
            .expect("package.json serialization should not fail");
        out.push('\n');
        out
    }

    /// The package name, if declared.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// The package version, if declared.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.fields.get("version").and_then(Value::as_str)
    }

    /// Iterate `(name, range)` pairs of one group in declaration order.
    pub fn group(&self, group: DepGroup) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .get(group.as_str())
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
            .filter_map(|(name, range)| Some((name.as_str(), range.as_str()?)))
    }

    /// The declared range for `name` in `group`.
    #[must_use]
    pub fn get(&self, group: DepGroup, name: &str) -> Option<&str> {
        self.fields
            .get(group.as_str())?
            .as_object()?
            .get(name)?
            .as_str()
    }

    /// Declare `name@range` in `group`, creating the group if needed.
    pub fn set(&mut self, group: DepGroup, name: &str, range: &str) {
        let section = self
            .fields
            .entry(group.as_str())
            .or_insert_with(|| Value::Object(Map::new()));
        if !section.is_object() {
            *section = Value::Object(Map::new());
        }
        if let Value::Object(section) = section {
            section.insert(name.to_string(), Value::String(range.to_string()));
        }
    }

    /// Remove `name` from `group`, returning its previous range.
    ///
    /// An emptied group is kept as `{}`.
    pub fn remove(&mut self, group: DepGroup, name: &str) -> Option<String> {
        let section = self.fields.get_mut(group.as_str())?.as_object_mut()?;
        match section.shift_remove(name)? {
            Value::String(range) => Some(range),
            _ => None,
        }
    }

    /// Every declaration across all five groups.
    #[must_use]
    pub fn dep_entries(&self) -> Vec<DepEntry> {
        DepGroup::ALL
            .into_iter()
            .flat_map(|group| {
                self.group(group)
                    .map(move |(name, range)| DepEntry::new(name, range, group))
            })
            .collect()
    }
}

/// Get a human-readable type name for a JSON value.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
