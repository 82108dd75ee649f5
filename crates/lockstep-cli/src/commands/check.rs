//! `lockstep check` command implementation.
//!
//! Read-only: only package.json files are consulted.

use super::{fail, RootsArgs};
use lockstep_core::pkg::{ops, CheckReport};
use lockstep_core::Config;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

/// Check result for JSON output.
#[derive(Serialize)]
struct CheckResult<'a> {
    ok: bool,
    command: &'static str,
    versions: &'a CheckReport,
}

pub fn run(config: &Config, roots: &RootsArgs, json: bool) -> Result<()> {
    let report = match ops::check(&roots.dirs(config)) {
        Ok(report) => report,
        Err(err) => return fail("check", err, json),
    };

    if json {
        let result = CheckResult {
            ok: true,
            command: "check",
            versions: &report,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
        return Ok(());
    }

    if report.is_empty() {
        println!("No divergent dependency versions.");
        return Ok(());
    }

    println!("Divergent dependency versions ({}):", report.versions.len());
    for (name, ranges) in &report.versions {
        println!();
        println!("{name}");
        for (range, projects) in ranges {
            println!("  {range}: {}", projects.join(", "));
        }
    }
    Ok(())
}
