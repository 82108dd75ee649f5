//! `.npmrc` configuration overlay.
//!
//! Every `key=value` line is kept (closest file wins) so the same settings can
//! be rendered into a resolver's working directory. A few keys are also
//! interpreted here:
//! - `registry=URL` for the default registry
//! - `@scope:registry=URL` for routing scoped packages
//! - `//host/:_authToken=TOKEN` for registry authentication
//!
//! `${ENV_VAR}` is expanded in every value.

use super::registry::{DEFAULT_REGISTRY, REGISTRY_ENV};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// `.npmrc` filename.
pub const NPMRC_NAME: &str = ".npmrc";

/// Merged `.npmrc` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpmrcConfig {
    entries: BTreeMap<String, String>,
}

impl NpmrcConfig {
    /// Raw value of a key after env expansion.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set a key unless it is already present.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_insert_with(|| value.into());
    }

    /// The default registry: `LOCKSTEP_NPM_REGISTRY`, then `registry`, then
    /// the public yarn registry.
    ///
    /// # Panics
    /// Panics if the built-in default registry URL is invalid (it is not).
    #[must_use]
    pub fn registry(&self) -> Url {
        std::env::var(REGISTRY_ENV)
            .ok()
            .and_then(|url| parse_registry_url(&url))
            .or_else(|| self.get("registry").and_then(parse_registry_url))
            .unwrap_or_else(|| Url::parse(DEFAULT_REGISTRY).expect("default registry URL is valid"))
    }

    /// The registry serving `name`: its scope's registry when configured,
    /// otherwise [`Self::registry`].
    #[must_use]
    pub fn registry_for(&self, name: &str) -> Url {
        name.strip_prefix('@')
            .and_then(|scoped| scoped.split_once('/'))
            .and_then(|(scope, _)| self.get(&format!("@{scope}:registry")))
            .and_then(parse_registry_url)
            .unwrap_or_else(|| self.registry())
    }

    /// The auth token configured for a registry URL.
    ///
    /// Tries `host/path` first, then the bare host.
    #[must_use]
    pub fn auth_token_for(&self, url: &Url) -> Option<&str> {
        let host = url.host_str()?;
        let path = url.path().trim_end_matches('/');
        let with_path = if path.is_empty() {
            host.to_string()
        } else {
            format!("{host}{path}")
        };
        self.get(&format!("//{with_path}/:_authToken"))
            .or_else(|| self.get(&format!("//{host}/:_authToken")))
            .filter(|token| !token.is_empty())
    }

    /// Render back to `.npmrc` text, one `key=value` per line.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect()
    }
}

/// Parse a single `.npmrc` file's content.
///
/// Ignores comments (`#`, `;`), blank lines, and lines without `=`.
#[must_use]
pub fn parse_npmrc(content: &str) -> NpmrcConfig {
    let mut config = NpmrcConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        config
            .entries
            .insert(key.to_string(), expand_env_vars(value.trim()));
    }

    config
}

/// Load and merge `.npmrc` files from `project_dir` upward, then `$HOME`.
///
/// The closest file wins for any key.
#[must_use]
pub fn load_npmrc_files(project_dir: &Path) -> NpmrcConfig {
    let mut merged = NpmrcConfig::default();

    let mut files: Vec<PathBuf> = project_dir
        .ancestors()
        .map(|dir| dir.join(NPMRC_NAME))
        .collect();
    if let Some(home) = dirs_next::home_dir() {
        files.push(home.join(NPMRC_NAME));
    }

    for path in files {
        if let Ok(Some(content)) = lockstep_util::fs::read_optional(&path) {
            merge_config(&mut merged, &parse_npmrc(&content));
        }
    }

    merged
}

/// Merge `source` into `target`, keeping existing entries (first wins).
fn merge_config(target: &mut NpmrcConfig, source: &NpmrcConfig) {
    for (key, value) in &source.entries {
        target.set_default(key.as_str(), value.as_str());
    }
}

/// Parse a registry URL, adding the trailing slash `Url::join` needs.
fn parse_registry_url(url: &str) -> Option<Url> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if url.ends_with('/') {
        Url::parse(url).ok()
    } else {
        Url::parse(&format!("{url}/")).ok()
    }
}

/// Expand `${ENV_VAR}` patterns in a string. Unset variables expand to "".
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
            if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}
