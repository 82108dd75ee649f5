//! `lockstep remove` command implementation.

use super::{finish, ResolveArgs};
use lockstep_core::pkg::ops;
use lockstep_core::Config;
use miette::Result;

pub fn run(config: &Config, names: Vec<String>, args: &ResolveArgs, json: bool) -> Result<()> {
    let ctx = args.context(config);
    let result = ops::remove(&ctx.roots, names, &ctx.options, &ctx.resolver);
    finish("remove", result, json)
}
