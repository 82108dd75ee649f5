//! yarn v1 lockfile codec.
//!
//! ## File Format
//!
//! ```text
//! # THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
//! # yarn lockfile v1
//!
//!
//! has@^1.0.3:
//!   version "1.0.3"
//!   resolved "https://registry.yarnpkg.com/has/-/has-1.0.3.tgz"
//!   dependencies:
//!     function-bind "^1.1.1"
//! ```
//!
//! A block header may list several comma-separated specifiers that share one
//! entry. In memory every specifier is its own key; identical entries are
//! grouped again when the lockfile is stringified.

use super::error::PkgError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Lockfile filename.
pub const LOCKFILE_NAME: &str = "yarn.lock";

const HEADER: &str = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n\
                      # yarn lockfile v1\n";

const DEPENDENCIES: &str = "dependencies";
const OPTIONAL_DEPENDENCIES: &str = "optionalDependencies";

/// A resolved package in the lockfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    /// Exact resolved version.
    pub version: String,
    /// Tarball URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    /// Subresource integrity string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    /// Dependency name to range.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    /// Optional dependency name to range.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, String>,
    /// Any other scalar field, preserved verbatim.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl LockEntry {
    /// Create an entry with a version and tarball URL.
    #[must_use]
    pub fn new(version: impl Into<String>, resolved: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            resolved: Some(resolved.into()),
            ..Self::default()
        }
    }

    /// Add a dependency edge.
    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), range.into());
        self
    }

    /// Add an optional dependency edge.
    #[must_use]
    pub fn with_optional_dependency(
        mut self,
        name: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        self.optional_dependencies.insert(name.into(), range.into());
        self
    }

    /// Every outgoing edge: `dependencies` then `optionalDependencies`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dependencies
            .iter()
            .chain(&self.optional_dependencies)
            .map(|(name, range)| (name.as_str(), range.as_str()))
    }

    /// Fields in yarn's order: the fixed leading fields, then everything else
    /// alphabetically.
    fn write_body(&self, out: &mut String) {
        write_field(out, "version", &self.version);
        if let Some(uid) = self.extra.get("uid") {
            write_field(out, "uid", uid);
        }
        if let Some(resolved) = &self.resolved {
            write_field(out, "resolved", resolved);
        }
        if let Some(integrity) = &self.integrity {
            write_field(out, "integrity", integrity);
        }
        if let Some(registry) = self.extra.get("registry") {
            write_field(out, "registry", registry);
        }
        write_map(out, DEPENDENCIES, &self.dependencies);

        let mut optional_pending = true;
        for (key, value) in &self.extra {
            if matches!(key.as_str(), "uid" | "registry") {
                continue;
            }
            if optional_pending && key.as_str() > OPTIONAL_DEPENDENCIES {
                write_map(out, OPTIONAL_DEPENDENCIES, &self.optional_dependencies);
                optional_pending = false;
            }
            write_field(out, key, value);
        }
        if optional_pending {
            write_map(out, OPTIONAL_DEPENDENCIES, &self.optional_dependencies);
        }
    }
}

/// A parsed yarn.lock: specifier (`name@range`) to entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    entries: BTreeMap<String, LockEntry>,
}

impl Lockfile {
    /// Create an empty lockfile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of specifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by specifier.
    #[must_use]
    pub fn get(&self, specifier: &str) -> Option<&LockEntry> {
        self.entries.get(specifier)
    }

    #[must_use]
    pub fn contains(&self, specifier: &str) -> bool {
        self.entries.contains_key(specifier)
    }

    /// Insert or replace the entry for a specifier.
    pub fn insert(&mut self, specifier: impl Into<String>, entry: LockEntry) -> Option<LockEntry> {
        self.entries.insert(specifier.into(), entry)
    }

    pub fn remove(&mut self, specifier: &str) -> Option<LockEntry> {
        self.entries.remove(specifier)
    }

    /// Iterate `(specifier, entry)` in specifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LockEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate specifiers in order.
    pub fn specifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Parse lockfile text. `path` is only used for error messages.
    ///
    /// # Errors
    /// Returns `PKG_LOCKFILE_INVALID` with the offending line number.
    pub fn parse(text: &str, path: &Path) -> Result<Self, PkgError> {
        Parser::new(path).run(text)
    }

    /// Serialize to yarn v1 text.
    #[must_use]
    pub fn stringify(&self) -> String {
        // Group specifiers whose entries serialize identically. Iteration is
        // in key order, so each group's keys are sorted and groups are ordered
        // by their first key.
        let mut groups: Vec<(Vec<&str>, String)> = Vec::new();
        let mut by_body: HashMap<String, usize> = HashMap::new();
        for (specifier, entry) in &self.entries {
            let mut body = String::new();
            entry.write_body(&mut body);
            match by_body.get(&body) {
                Some(&idx) => groups[idx].0.push(specifier),
                None => {
                    by_body.insert(body.clone(), groups.len());
                    groups.push((vec![specifier], body));
                }
            }
        }

        let mut out = String::from(HEADER);
        out.push('\n');
        for (keys, body) in groups {
            out.push('\n');
            let header: Vec<String> = keys.into_iter().map(maybe_quote).collect();
            out.push_str(&header.join(", "));
            out.push_str(":\n");
            out.push_str(&body);
        }
        out
    }

    /// Read a lockfile, treating a missing file as empty.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self, PkgError> {
        match lockstep_util::fs::read_optional(path).map_err(|e| PkgError::io(path, e))? {
            Some(text) => Self::parse(&text, path),
            None => Ok(Self::new()),
        }
    }
}

impl FromIterator<(String, LockEntry)> for Lockfile {
    fn from_iter<I: IntoIterator<Item = (String, LockEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(String, LockEntry)> for Lockfile {
    fn extend<I: IntoIterator<Item = (String, LockEntry)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Lockfile {
    type Item = (String, LockEntry);
    type IntoIter = std::collections::btree_map::IntoIter<String, LockEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Which nested map the parser is currently filling.
#[derive(Clone, Copy)]
enum Section {
    Dependencies,
    OptionalDependencies,
}

/// Block under construction: its header line, specifiers, and entry.
struct Block {
    line: usize,
    keys: Vec<String>,
    entry: LockEntry,
    has_version: bool,
    section: Option<Section>,
}

struct Parser<'a> {
    path: &'a Path,
    entries: BTreeMap<String, LockEntry>,
    block: Option<Block>,
}

impl<'a> Parser<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
            block: None,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> PkgError {
        PkgError::lockfile_invalid(self.path, line, message)
    }

    fn run(mut self, text: &str) -> Result<Lockfile, PkgError> {
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let content = raw.trim_start_matches(' ');
            if content.starts_with('\t') {
                return Err(self.error(line, "Tabs are not allowed for indentation"));
            }
            let content = content.trim_end();
            match raw.len() - raw.trim_start_matches(' ').len() {
                0 => self.start_block(line, content)?,
                2 => self.field(line, content)?,
                4 => self.nested_field(line, content)?,
                n => return Err(self.error(line, format!("Unexpected indentation of {n} spaces"))),
            }
        }
        self.finish_block()?;
        Ok(Lockfile {
            entries: self.entries,
        })
    }

    fn start_block(&mut self, line: usize, content: &str) -> Result<(), PkgError> {
        self.finish_block()?;

        let Some(keys) = content.strip_suffix(':') else {
            return Err(self.error(line, "Expected ':' at the end of a block header"));
        };
        let keys = split_keys(keys).map_err(|msg| self.error(line, msg))?;
        if keys.is_empty() {
            return Err(self.error(line, "Block header has no specifiers"));
        }

        self.block = Some(Block {
            line,
            keys,
            entry: LockEntry::default(),
            has_version: false,
            section: None,
        });
        Ok(())
    }

    fn finish_block(&mut self) -> Result<(), PkgError> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };
        if !block.has_version {
            return Err(self.error(block.line, "Entry has no version"));
        }
        for key in block.keys {
            if self.entries.contains_key(&key) {
                return Err(self.error(block.line, format!("Duplicate specifier '{key}'")));
            }
            self.entries.insert(key, block.entry.clone());
        }
        Ok(())
    }

    fn field(&mut self, line: usize, content: &str) -> Result<(), PkgError> {
        let (key, rest) = take_token(content).map_err(|msg| self.error(line, msg))?;
        // A quoted key may be directly followed by ':'.
        let (key, rest) = match rest.strip_prefix(':') {
            Some(after) => (format!("{key}:"), after),
            None => (key, rest),
        };

        if rest.trim().is_empty() {
            let section = match key.strip_suffix(':') {
                Some(DEPENDENCIES) => Section::Dependencies,
                Some(OPTIONAL_DEPENDENCIES) => Section::OptionalDependencies,
                Some(other) => {
                    return Err(self.error(line, format!("Unsupported nested field '{other}'")));
                }
                None => return Err(self.error(line, format!("Field '{key}' has no value"))),
            };
            let Some(block) = self.block.as_mut() else {
                return Err(self.error(line, "Field outside of a block"));
            };
            block.section = Some(section);
            return Ok(());
        }

        let (value, trailing) = take_token(rest.trim_start()).map_err(|msg| self.error(line, msg))?;
        if !trailing.trim().is_empty() {
            return Err(self.error(line, format!("Unexpected content after '{key}' value")));
        }

        let Some(block) = self.block.as_mut() else {
            return Err(self.error(line, "Field outside of a block"));
        };
        block.section = None;
        match key.as_str() {
            "version" => {
                block.entry.version = value;
                block.has_version = true;
            }
            "resolved" => block.entry.resolved = Some(value),
            "integrity" => block.entry.integrity = Some(value),
            _ => {
                block.entry.extra.insert(key, value);
            }
        }
        Ok(())
    }

    fn nested_field(&mut self, line: usize, content: &str) -> Result<(), PkgError> {
        let (name, rest) = take_token(content).map_err(|msg| self.error(line, msg))?;
        let (range, trailing) = take_token(rest.trim_start()).map_err(|msg| self.error(line, msg))?;
        if !trailing.trim().is_empty() {
            return Err(self.error(line, format!("Unexpected content after '{name}' range")));
        }

        let Some(block) = self.block.as_mut() else {
            return Err(self.error(line, "Dependency outside of a block"));
        };
        let map = match block.section {
            Some(Section::Dependencies) => &mut block.entry.dependencies,
            Some(Section::OptionalDependencies) => &mut block.entry.optional_dependencies,
            None => return Err(self.error(line, "Dependency outside of a dependency map")),
        };
        map.insert(name, range);
        Ok(())
    }
}

/// Read one token: a JSON-quoted string or a run of non-whitespace.
fn take_token(input: &str) -> Result<(String, &str), String> {
    if input.is_empty() {
        return Err("Expected a value".to_string());
    }
    if !input.starts_with('"') {
        let end = input.find(char::is_whitespace).unwrap_or(input.len());
        return Ok((input[..end].to_string(), &input[end..]));
    }

    let mut escaped = false;
    for (idx, c) in input.char_indices().skip(1) {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => {
                let end = idx + 1;
                let value: String = serde_json::from_str(&input[..end])
                    .map_err(|e| format!("Invalid quoted string: {e}"))?;
                return Ok((value, &input[end..]));
            }
            _ => escaped = false,
        }
    }
    Err("Unterminated quoted string".to_string())
}

/// Split a block header into its specifiers.
fn split_keys(header: &str) -> Result<Vec<String>, String> {
    let mut keys = Vec::new();
    let mut rest = header.trim();
    while !rest.is_empty() {
        let key = if rest.starts_with('"') {
            let (key, after) = take_token(rest)?;
            rest = after;
            key
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let key = rest[..end].trim().to_string();
            rest = &rest[end..];
            key
        };
        if key.is_empty() {
            return Err("Empty specifier in block header".to_string());
        }
        keys.push(key);

        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after.trim_start();
        } else if !rest.is_empty() {
            return Err(format!("Expected ',' between specifiers, found '{rest}'"));
        }
    }
    Ok(keys)
}

fn write_field(out: &mut String, key: &str, value: &str) {
    out.push_str("  ");
    out.push_str(&maybe_quote(key));
    out.push(' ');
    out.push_str(&maybe_quote(value));
    out.push('\n');
}

fn write_map(out: &mut String, name: &str, map: &BTreeMap<String, String>) {
    if map.is_empty() {
        return;
    }
    out.push_str("  ");
    out.push_str(name);
    out.push_str(":\n");
    for (dep, range) in map {
        out.push_str("    ");
        out.push_str(&maybe_quote(dep));
        out.push(' ');
        out.push_str(&maybe_quote(range));
        out.push('\n');
    }
}

fn json_quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Quote a key or scalar value unless it reads back as a bare word: it
/// must start with a letter, not start with `true`/`false`, and contain no
/// whitespace or any of `:\",[]`.
fn maybe_quote(value: &str) -> String {
    let needs_quotes = value.starts_with("true")
        || value.starts_with("false")
        || !value.starts_with(|c: char| c.is_ascii_alphabetic())
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | '\\' | '"' | ',' | '[' | ']'));
    if needs_quotes {
        json_quote(value)
    } else {
        value.to_string()
    }
}
