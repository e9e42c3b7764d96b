//! Turning parsed options into a plan and running or exporting it.

use super::{Cli, Emit, Settings, Verb};
use crate::discovery::{DiscoveryError, TargetBuilder, Workspace, sources};
use crate::ui;
use restamp_core::export::{self, default_groups, makefile, redo};
use restamp_core::{
    CommandRunner, Engine, EngineError, ExecutionPlan, ProcessRunner, RunOptions, RunReport,
    StampStore, TargetGraph, TargetSpec,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("could not write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a command invocation did.
#[derive(Debug)]
pub enum Outcome {
    /// The plan was executed
    Ran(RunReport),
    /// The plan was written to these files
    Exported(Vec<PathBuf>),
    /// The plan was printed
    Listed(Vec<String>),
}

impl Outcome {
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::Ran(report) => report.succeeded(),
            Self::Exported(_) | Self::Listed(_) => true,
        }
    }
}

/// Load the workspace, build the plan for the verb and run or export it.
///
/// # Errors
///
/// Fails when the workspace cannot be loaded, the targets form a cycle, a
/// filter is not a valid regex, or the state directory cannot be written.
pub async fn execute(cli: &Cli) -> Result<Outcome, CliError> {
    let options = &cli.options;
    let settings = options.settings(cli.verb.preset());
    debug!("settings: {:?}", settings);

    let workspace = Workspace::load(&options.manifest)?;
    let files = if settings.use_srcs {
        sources::list(&workspace.root, &options.state_dir).await
    } else {
        Vec::new()
    };

    let specs = targets(&cli.verb, &workspace, &files, &settings);
    let plan = TargetGraph::build(specs)?.focus(&settings.patterns)?;
    info!("{} targets selected", plan.len());

    if options.only_show_targets {
        let lines = describe(&plan);
        for line in &lines {
            println!("{line}");
        }
        return Ok(Outcome::Listed(lines));
    }

    let stamps = StampStore::new(&options.state_dir);
    let prepare = || {
        stamps.prepare().map_err(|source| CliError::Write {
            path: stamps.dir().to_path_buf(),
            source,
        })
    };

    match options.emit {
        Emit::Makefile => {
            let path = workspace.root.join("Makefile");
            let contents = makefile::render(&plan, &stamps, &default_groups());
            export::write_makefile(&path, &contents).map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            })?;
            info!("wrote {}", path.display());
            Ok(Outcome::Exported(vec![path]))
        }
        Emit::Redo => {
            prepare()?;
            let files = redo::render(&plan, &stamps);
            export::write_redo_files(&files).map_err(|source| CliError::Write {
                path: stamps.dir().to_path_buf(),
                source,
            })?;
            info!("wrote {} redo files", files.len());
            Ok(Outcome::Exported(files.into_iter().map(|file| file.path).collect()))
        }
        Emit::Run => {
            prepare()?;
            let mut runner = ProcessRunner::new().with_timeout(settings.timeout);
            if console::colors_enabled() {
                runner = runner.with_env("FORCE_COLOR", "1");
            }
            let runner: Arc<dyn CommandRunner> = Arc::new(runner);
            let engine = Engine::new(
                stamps,
                runner,
                RunOptions {
                    force: settings.force,
                },
            );
            let observer = ui::observer(options.ui, &plan);
            Ok(Outcome::Ran(engine.run(&plan, observer.as_ref()).await))
        }
    }
}

fn targets(verb: &Verb, workspace: &Workspace, files: &[PathBuf], settings: &Settings) -> Vec<TargetSpec> {
    let builder = TargetBuilder::new(workspace, files, settings.by_deps, settings.use_srcs);
    match verb {
        Verb::Exec { command } => builder.exec(command),
        Verb::Run { script } => builder.run(script),
        Verb::YarnBuild => builder.run("build"),
        Verb::Build | Verb::Test | Verb::Was => builder.was(),
    }
}

/// One line per plan target: its name and its dependencies inside the plan.
#[must_use]
pub fn describe(plan: &ExecutionPlan) -> Vec<String> {
    (0..plan.len())
        .zip(plan.names())
        .map(|(index, name)| {
            let deps = plan.dependency_names(index);
            if deps.is_empty() {
                name.to_string()
            } else {
                format!("{name}: {}", deps.join(" "))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use restamp_core::Command;

    #[test]
    fn test_describe_lists_plan_order() {
        let plan = TargetGraph::build([
            TargetSpec::new("build-b", Command::Noop, ".").with_deps(["build-a"]),
            TargetSpec::new("build-a", Command::Noop, "."),
        ])
        .unwrap()
        .focus::<&str>(&[])
        .unwrap();

        assert_eq!(describe(&plan), vec!["build-a", "build-b: build-a"]);
    }

    #[test]
    fn test_listed_and_exported_outcomes_succeed() {
        assert!(Outcome::Listed(Vec::new()).success());
        assert!(Outcome::Exported(vec![PathBuf::from("Makefile")]).success());
    }
}
