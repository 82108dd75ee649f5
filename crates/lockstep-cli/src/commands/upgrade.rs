//! `lockstep upgrade` command implementation.
//!
//! Each addition replaces the existing declarations of its name in whatever
//! groups they were found. `--from` narrows that to declarations whose
//! current minimum version satisfies the given range.

use super::{finish, ResolveArgs};
use lockstep_core::pkg::{ops, DepGroup, DepRequest, PackageSpec, PkgError};
use lockstep_core::Config;
use miette::Result;

pub fn run(
    config: &Config,
    additions: &[String],
    from: &[String],
    args: &ResolveArgs,
    json: bool,
) -> Result<()> {
    let parsed = additions
        .iter()
        .map(|spec| DepRequest::parse(spec, DepGroup::Dependencies))
        .collect::<Result<Vec<_>, PkgError>>()
        .and_then(|additions| {
            let from = from
                .iter()
                .map(|spec| PackageSpec::parse(spec))
                .collect::<Result<Vec<_>, PkgError>>()?;
            Ok((additions, from))
        });

    let result = parsed.and_then(|(additions, from)| {
        let ctx = args.context(config);
        ops::upgrade(&ctx.roots, additions, from, &ctx.options, &ctx.resolver)
    });
    finish("upgrade", result, json)
}
