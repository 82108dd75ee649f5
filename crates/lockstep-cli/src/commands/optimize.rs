//! `lockstep optimize` command implementation.

use super::{finish, RootsArgs};
use lockstep_core::pkg::ops;
use lockstep_core::Config;
use miette::Result;

pub fn run(config: &Config, roots: &RootsArgs, frozen_lockfile: bool, json: bool) -> Result<()> {
    let result = ops::optimize(&roots.dirs(config), frozen_lockfile);
    finish("optimize", result, json)
}
