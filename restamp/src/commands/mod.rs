//! Restamp command-line interface
//!
//! Every verb turns the workspace into a target set, narrows it with the
//! target filter, and then runs or exports the resulting plan:
//! - `exec`: a shell command in every package
//! - `run`: a package script in every package
//! - `yarn-build`: the `build` script, following package dependencies
//! - `build` / `test` / `was`: the full per-package target set

use crate::ui::UiMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub mod run;

pub use run::{CliError, Outcome, describe, execute};

/// Restamp - incremental task runner for package.json workspaces
#[derive(Debug, Parser)]
#[command(name = "restamp")]
#[command(about = "Incremental task runner for package.json workspaces")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub verb: Verb,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Verb {
    /// Run a shell command in every package
    Exec {
        /// Command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a package script in every package
    Run {
        /// Script name from package.json
        script: String,
    },

    /// Run the build script, following package dependencies
    YarnBuild,

    /// Build every package
    Build,

    /// Test every package
    Test,

    /// Build, test, format, lint and every other script
    Was,
}

/// What to do with the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Emit {
    /// Execute the plan
    Run,
    /// Write a Makefile next to the root manifest
    Makefile,
    /// Write redo `.do` files into the state directory
    Redo,
}

/// Options shared by every verb.
#[derive(Debug, Clone, Args)]
pub struct Options {
    /// Target filters, comma separated regular expressions
    #[arg(short, long, global = true)]
    pub targets: Option<String>,

    /// Run targets even if their stamps are fresh
    #[arg(short, long, global = true, overrides_with = "no_force")]
    pub force: bool,

    /// Only run stale targets
    #[arg(long, global = true, overrides_with = "force")]
    pub no_force: bool,

    /// Make targets depend on the same targets of dependency packages
    #[arg(long, global = true, overrides_with = "no_by_deps")]
    pub by_deps: bool,

    /// Do not follow package dependencies
    #[arg(long, global = true, overrides_with = "by_deps")]
    pub no_by_deps: bool,

    /// Compare stamps against the tracked files of each package
    #[arg(long, global = true, overrides_with = "no_use_srcs")]
    pub use_srcs: bool,

    /// Ignore source files
    #[arg(long, global = true, overrides_with = "use_srcs")]
    pub no_use_srcs: bool,

    /// Progress display
    #[arg(long, global = true, value_enum, default_value = "auto", env = "RESTAMP_UI")]
    pub ui: UiMode,

    /// Execute the plan or export it
    #[arg(long, global = true, value_enum, default_value = "run")]
    pub emit: Emit,

    /// Print the plan and exit
    #[arg(long, global = true)]
    pub only_show_targets: bool,

    /// Directory holding stamps and logs
    #[arg(long, global = true, default_value = ".restamp", env = "RESTAMP_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Root package.json of the workspace
    #[arg(long, global = true, default_value = "package.json", env = "RESTAMP_MANIFEST")]
    pub manifest: PathBuf,

    /// Kill commands running longer than this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

/// Per-verb defaults for the boolean options and the target filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub force: bool,
    pub by_deps: bool,
    pub use_srcs: bool,
    pub filter: Option<&'static str>,
}

impl Verb {
    #[must_use]
    pub fn preset(&self) -> Preset {
        let (force, by_deps, use_srcs, filter) = match self {
            Self::Exec { .. } | Self::Run { .. } => (true, false, false, None),
            Self::YarnBuild => (false, true, true, None),
            Self::Build | Self::Was => (false, true, true, Some("build-.*")),
            Self::Test => (false, true, true, Some("test-.*")),
        };
        Preset {
            force,
            by_deps,
            use_srcs,
            filter,
        }
    }
}

/// Options with the verb's preset applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub force: bool,
    pub by_deps: bool,
    pub use_srcs: bool,
    pub patterns: Vec<String>,
    pub timeout: Option<Duration>,
}

impl Options {
    /// Explicit flags win over the preset.
    #[must_use]
    pub fn settings(&self, preset: Preset) -> Settings {
        let pick = |yes: bool, no: bool, default: bool| {
            if yes {
                true
            } else if no {
                false
            } else {
                default
            }
        };

        let patterns = match self.targets.as_deref() {
            Some(targets) => parse_targets(targets),
            None => preset.filter.map(str::to_string).into_iter().collect(),
        };

        Settings {
            force: pick(self.force, self.no_force, preset.force),
            by_deps: pick(self.by_deps, self.no_by_deps, preset.by_deps),
            use_srcs: pick(self.use_srcs, self.no_use_srcs, preset.use_srcs),
            patterns,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

/// Split a comma separated filter list, dropping blank entries.
#[must_use]
pub fn parse_targets(targets: &str) -> Vec<String> {
    targets
        .split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_string)
        .collect()
}
