//! `lockstep add` command implementation.

use super::{finish, ResolveArgs};
use lockstep_core::pkg::{ops, DepGroup, DepRequest, PkgError};
use lockstep_core::Config;
use miette::Result;

/// Add `additions` to `group` in every root.
pub fn run(
    config: &Config,
    additions: &[String],
    group: DepGroup,
    args: &ResolveArgs,
    json: bool,
) -> Result<()> {
    let result = additions
        .iter()
        .map(|spec| DepRequest::parse(spec, group))
        .collect::<Result<Vec<_>, PkgError>>()
        .and_then(|requests| {
            let ctx = args.context(config);
            ops::add(&ctx.roots, requests, &ctx.options, &ctx.resolver)
        });
    finish("add", result, json)
}
