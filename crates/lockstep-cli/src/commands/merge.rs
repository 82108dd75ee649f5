//! `lockstep merge` command implementation.

use super::{finish, ResolveArgs};
use lockstep_core::pkg::ops;
use lockstep_core::Config;
use miette::Result;
use std::path::Path;

/// Merge every root into `out`. Roots are left untouched.
pub fn run(config: &Config, out: &Path, args: &ResolveArgs, json: bool) -> Result<()> {
    let ctx = args.context(config);
    let out = config.resolve_path(out);
    let result = ops::merge(&ctx.roots, &out, &ctx.options, &ctx.resolver);
    finish("merge", result, json)
}
