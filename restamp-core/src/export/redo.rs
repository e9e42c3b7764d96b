//! redo export: one `.do` script per stamp.

use super::quoted;
use crate::graph::ExecutionPlan;
use crate::stamp::StampStore;
use std::path::PathBuf;

/// A `.do` file to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedoFile {
    /// Destination path
    pub path: PathBuf,
    /// Script contents
    pub content: String,
}

fn do_file(stamp: PathBuf, deps: &[String], sources: &[String], script: Option<String>) -> RedoFile {
    let mut path = stamp.into_os_string();
    path.push(".do");

    let lines = [
        "cd $REDO_BASE".to_string(),
        format!("redo-ifchange {}", deps.join(" ")).trim_end().to_string(),
        format!("redo-ifchange {}", sources.join(" ")).trim_end().to_string(),
        script.unwrap_or_default(),
    ];

    RedoFile {
        path: PathBuf::from(path),
        content: lines.join("\n"),
    }
}

/// Render the plan as redo scripts.
///
/// Besides one file per target this emits `all.do` (every target) and
/// `build.do` (every `build-` target) in the state directory.
#[must_use]
pub fn render(plan: &ExecutionPlan, stamps: &StampStore) -> Vec<RedoFile> {
    let stamp_of = |name: &str| quoted(&stamps.stamp_path(name).display().to_string());
    let mut files = Vec::with_capacity(plan.len() + 2);

    for node in plan.nodes() {
        let spec = &node.spec;
        let deps: Vec<String> = node
            .deps
            .iter()
            .map(|&dep| stamp_of(&plan.nodes()[dep].spec.name))
            .collect();
        let sources: Vec<String> = spec
            .sources
            .iter()
            .flatten()
            .map(|source| quoted(&source.display().to_string()))
            .collect();
        let script = (!spec.command.is_noop()).then(|| {
            format!(
                "cd {} && {}",
                quoted(&spec.cwd.display().to_string()),
                spec.command.shell_line()
            )
        });
        files.push(do_file(stamps.stamp_path(&spec.name), &deps, &sources, script));
    }

    let all: Vec<String> = plan.names().map(stamp_of).collect();
    files.push(do_file(stamps.dir().join("all"), &all, &[], None));

    let build: Vec<String> = plan
        .names()
        .filter(|name| name.starts_with("build-"))
        .map(stamp_of)
        .collect();
    files.push(do_file(stamps.dir().join("build"), &build, &[], None));

    files
}
