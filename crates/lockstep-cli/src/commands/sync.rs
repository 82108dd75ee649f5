//! `lockstep sync` command implementation.

use super::{finish, ResolveArgs};
use lockstep_core::pkg::ops;
use lockstep_core::Config;
use miette::Result;

pub fn run(config: &Config, args: &ResolveArgs, json: bool) -> Result<()> {
    let ctx = args.context(config);
    let result = ops::sync(&ctx.roots, &ctx.options, &ctx.resolver);
    finish("sync", result, json)
}
