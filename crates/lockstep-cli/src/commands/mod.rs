pub mod add;
pub mod check;
pub mod merge;
pub mod optimize;
pub mod remove;
pub mod sync;
pub mod upgrade;
pub mod version;

use lockstep_core::pkg::{load_npmrc_files, OpOutcome, PkgError, ResolveOptions, YarnResolver};
use lockstep_core::Config;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Project directories to operate on.
#[derive(clap::Args, Debug, Clone)]
pub struct RootsArgs {
    /// Project directories, separated by `|`
    #[arg(long, value_name = "DIRS", value_parser = clap::builder::NonEmptyStringValueParser::new())]
    pub roots: String,
}

impl RootsArgs {
    pub fn dirs(&self, config: &Config) -> Vec<PathBuf> {
        config.roots(&self.roots)
    }
}

/// Arguments shared by every command that may contact the resolver.
#[derive(clap::Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub roots: RootsArgs,

    /// Package names never sent to the resolver (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    pub ignore: Vec<String>,

    /// Parent directory for resolver working directories
    #[arg(long, env = "LOCKSTEP_TMP", value_name = "DIR")]
    pub tmp: Option<PathBuf>,

    /// Fail instead of changing any lockfile
    #[arg(long)]
    pub frozen_lockfile: bool,

    /// yarn executable used to resolve new dependencies
    #[arg(long, env = "LOCKSTEP_YARN", value_name = "PATH")]
    pub yarn: Option<PathBuf>,
}

/// Everything a mutating command needs from its arguments.
pub struct EditContext {
    pub roots: Vec<PathBuf>,
    pub options: ResolveOptions,
    pub resolver: YarnResolver,
}

impl ResolveArgs {
    pub fn context(&self, config: &Config) -> EditContext {
        let config = match &self.tmp {
            Some(tmp) => config.clone().with_tmp_dir(tmp.clone()),
            None => config.clone(),
        };

        // A missing yarn only matters once something needs resolving
        let yarn = self
            .yarn
            .clone()
            .or_else(|| which::which("yarn").ok())
            .unwrap_or_else(|| PathBuf::from("yarn"));
        debug!(yarn = %yarn.display(), tmp = %config.tmp_dir.display(), "Resolver configured");

        EditContext {
            roots: self.roots.dirs(&config),
            options: ResolveOptions {
                ignore: self.ignore.clone(),
                frozen_lockfile: self.frozen_lockfile,
                tmp_dir: config.tmp_dir.clone(),
            },
            resolver: YarnResolver::new(yarn, load_npmrc_files(&config.cwd)),
        }
    }
}

/// Error details for JSON output.
#[derive(Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
}

impl From<&PkgError> for ErrorInfo {
    fn from(err: &PkgError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Mutating command result for JSON output.
#[derive(Serialize)]
struct EditResult<'a> {
    ok: bool,
    command: &'a str,
    #[serde(flatten)]
    outcome: Option<&'a OpOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

/// Print the outcome of a mutating command.
///
/// Errors exit non-zero: with `--json` after printing the error object,
/// otherwise through the returned diagnostic.
pub fn finish(command: &str, result: Result<OpOutcome, PkgError>, json: bool) -> Result<()> {
    match result {
        Ok(outcome) => {
            if json {
                let report = EditResult {
                    ok: true,
                    command,
                    outcome: Some(&outcome),
                    error: None,
                };
                println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
            } else if outcome.written.is_empty() {
                println!(
                    "Already up to date ({} project(s) checked)",
                    outcome.projects
                );
            } else {
                println!(
                    "Updated {} file(s) across {} project(s):",
                    outcome.written.len(),
                    outcome.projects
                );
                for path in &outcome.written {
                    println!("  {}", path.display());
                }
            }
            Ok(())
        }
        Err(err) => fail(command, err, json),
    }
}

/// Report `err` and stop.
pub fn fail(command: &str, err: PkgError, json: bool) -> Result<()> {
    if json {
        let report = EditResult {
            ok: false,
            command,
            outcome: None,
            error: Some(ErrorInfo::from(&err)),
        };
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        std::process::exit(1);
    }
    if matches!(err, PkgError::FrozenLockfile) {
        eprintln!("hint: rerun without --frozen-lockfile to apply the change");
    }
    Err(err).into_diagnostic()
}
