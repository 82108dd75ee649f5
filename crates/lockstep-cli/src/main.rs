#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use commands::{ResolveArgs, RootsArgs};
use lockstep_core::pkg::DepGroup;
use lockstep_core::Config;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lockstep")]
#[command(author, version, about = "Keep package.json and yarn.lock in step across projects", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Add dependencies to every root
    Add {
        /// Packages to add, as name[@range] (comma or space separated)
        #[arg(required = true, value_delimiter = ',')]
        additions: Vec<String>,

        /// Dependency group to add to
        #[arg(long = "type", value_name = "GROUP", default_value = "dependencies")]
        group: DepGroup,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Remove dependencies from every group of every root
    Remove {
        /// Package names to remove (comma or space separated)
        #[arg(required = true, value_delimiter = ',')]
        names: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Replace existing declarations, keeping their dependency groups
    Upgrade {
        /// New declarations, as name[@range] (comma or space separated)
        #[arg(required = true, value_delimiter = ',')]
        additions: Vec<String>,

        /// Only upgrade declarations whose minimum version satisfies name@range
        #[arg(long, value_delimiter = ',', value_name = "SPECS")]
        from: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Resolve missing lockfile entries and drop unreachable ones
    Sync {
        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Combine every root's dependencies into one project
    Merge {
        /// Directory receiving the merged package.json and yarn.lock
        #[arg(long, value_name = "DIR")]
        out: PathBuf,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Report dependencies declared with different ranges across roots
    Check {
        #[command(flatten)]
        roots: RootsArgs,
    },

    /// Deduplicate lockfile versions across roots without resolving
    Optimize {
        #[command(flatten)]
        roots: RootsArgs,

        /// Fail instead of changing any lockfile
        #[arg(long)]
        frozen_lockfile: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Upgrade { .. } => "upgrade",
            Self::Sync { .. } => "sync",
            Self::Merge { .. } => "merge",
            Self::Check { .. } => "check",
            Self::Optimize { .. } => "optimize",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    let Some(command) = cli.command else {
        return commands::version::run(cli.json);
    };
    if matches!(command, Commands::Version) {
        return commands::version::run(cli.json);
    }

    logging::init(config.verbosity, config.json_logs);
    let span = tracing::info_span!("lockstep", cmd = command.name(), cwd = %config.cwd.display());
    let _guard = span.enter();

    match command {
        Commands::Version => commands::version::run(cli.json),
        Commands::Add {
            additions,
            group,
            resolve,
        } => commands::add::run(&config, &additions, group, &resolve, cli.json),
        Commands::Remove { names, resolve } => {
            commands::remove::run(&config, names, &resolve, cli.json)
        }
        Commands::Upgrade {
            additions,
            from,
            resolve,
        } => commands::upgrade::run(&config, &additions, &from, &resolve, cli.json),
        Commands::Sync { resolve } => commands::sync::run(&config, &resolve, cli.json),
        Commands::Merge { out, resolve } => {
            commands::merge::run(&config, &out, &resolve, cli.json)
        }
        Commands::Check { roots } => commands::check::run(&config, &roots, cli.json),
        Commands::Optimize {
            roots,
            frozen_lockfile,
        } => commands::optimize::run(&config, &roots, frozen_lockfile, cli.json),
    }
}
