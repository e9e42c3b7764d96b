//! GNU Make export.
//!
//! Every target becomes a stamp rule depending on its dependencies' stamps and
//! its sources, plus a phony rule under the target's own name. Aggregate
//! rules (`all`, `test`, ...) collect stamps by name prefix.

use super::quoted;
use crate::graph::ExecutionPlan;
use crate::stamp::StampStore;
use std::fmt::Write as _;

/// Aggregate rule collecting every target whose name starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Rule name
    pub name: String,
    /// Target name prefix
    pub prefix: String,
}

impl Group {
    /// Group `name` over targets starting with `prefix`.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
        }
    }
}

/// `all`, `test`, `format` and `lint` over the matching target prefixes.
#[must_use]
pub fn default_groups() -> Vec<Group> {
    vec![
        Group::new("all", "build-"),
        Group::new("test", "test-"),
        Group::new("format", "format-"),
        Group::new("lint", "lint-"),
    ]
}

/// A target or prerequisite word with make's special characters escaped.
fn word(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '$' => out.push_str("$$"),
            ':' | '#' | '%' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Shell text placed in a recipe line.
fn recipe(text: &str) -> String {
    format!("\t{}", text.replace('$', "$$"))
}

/// Render the plan as a Makefile.
///
/// Rule names and paths are escaped, so names such as `start:dev-app`
/// produce valid rules.
#[must_use]
pub fn render(plan: &ExecutionPlan, stamps: &StampStore, groups: &[Group]) -> String {
    let stamp_path = |name: &str| stamps.stamp_path(name).display().to_string();
    let stamp_of = |name: &str| word(&stamp_path(name));
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut phony: Vec<String> = Vec::new();

    for group in groups {
        let members: Vec<String> = plan
            .names()
            .filter(|name| name.starts_with(&group.prefix))
            .map(stamp_of)
            .collect();
        if !members.is_empty() {
            phony.push(word(&group.name));
            chunks.push(vec![format!("{}: {}", word(&group.name), members.join(" "))]);
        }
    }

    for node in plan.nodes() {
        let spec = &node.spec;
        let stamp = stamp_of(&spec.name);
        let mut lines = Vec::new();

        if !node.deps.is_empty() {
            let deps: Vec<String> = node
                .deps
                .iter()
                .map(|&dep| stamp_of(&plan.nodes()[dep].spec.name))
                .collect();
            lines.push(format!("{stamp}: {}", deps.join(" ")));
        }
        if let Some(sources) = spec.sources.as_ref().filter(|s| !s.is_empty()) {
            let sources: Vec<String> = sources
                .iter()
                .map(|s| word(&s.display().to_string()))
                .collect();
            lines.push(format!("{stamp}: {}", sources.join(" ")));
        }

        lines.push(String::new());
        lines.push(format!("{}: {stamp}", word(&spec.name)));
        lines.push(format!("{stamp}:"));
        if !spec.command.is_noop() {
            lines.push(recipe(&format!(
                "cd {} && {}",
                quoted(&spec.cwd.display().to_string()),
                spec.command.shell_line()
            )));
        }
        lines.push(recipe(&format!("touch {}", quoted(&stamp_path(&spec.name)))));

        phony.push(word(&spec.name));
        chunks.push(lines);
    }

    let mut out = String::new();
    if !phony.is_empty() {
        let _ = writeln!(out, ".PHONY: {}", phony.join(" "));
        out.push('\n');
    }
    for chunk in chunks {
        for line in chunk {
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TargetGraph;
    use crate::target::{Command, TargetSpec};

    fn plan() -> ExecutionPlan {
        TargetGraph::build(vec![
            TargetSpec::new("build-a", Command::shell("tsc -p $PWD"), "packages/a")
                .with_sources(["packages/a/index.ts"]),
            TargetSpec::new("build-b", Command::Noop, "packages/b").with_deps(["build-a"]),
            TargetSpec::new("test-b", Command::program("yarn", ["run", "test"]), "packages/b")
                .with_deps(["build-b"]),
        ])
        .unwrap()
        .focus::<&str>(&[])
        .unwrap()
    }

    #[test]
    fn test_render_makefile() {
        let stamps = StampStore::new(".restamp");
        let text = render(&plan(), &stamps, &default_groups());

        let expected = "\
.PHONY: all test build-a build-b test-b

all: .restamp/build-a .restamp/build-b

test: .restamp/test-b

.restamp/build-a: packages/a/index.ts

build-a: .restamp/build-a
.restamp/build-a:
\tcd 'packages/a' && tsc -p $$PWD
\ttouch '.restamp/build-a'

.restamp/build-b: .restamp/build-a

build-b: .restamp/build-b
.restamp/build-b:
\ttouch '.restamp/build-b'

.restamp/test-b: .restamp/build-b

test-b: .restamp/test-b
.restamp/test-b:
\tcd 'packages/b' && yarn run test
\ttouch '.restamp/test-b'

";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_empty_groups_omitted() {
        let stamps = StampStore::new("s");
        let text = render(&plan(), &stamps, &[Group::new("lint", "lint-")]);
        assert!(!text.contains("lint:"));
        assert!(text.starts_with(".PHONY: build-a build-b test-b\n"));
    }

    #[test]
    fn test_word_escapes_make_syntax() {
        assert_eq!(word("start:dev-app"), r"start\:dev-app");
        assert_eq!(word("my dir/#1 50%"), r"my\ dir/\#1\ 50\%");
        assert_eq!(word("$HOME"), "$$HOME");
    }

    #[test]
    fn test_colon_target_and_spaced_paths() {
        let plan = TargetGraph::build(vec![
            TargetSpec::new("build-app", Command::Noop, "app"),
            TargetSpec::new("start:dev-app", Command::shell("node ."), "app")
                .with_deps(["build-app"])
                .with_sources(["app/src dir/main.js"]),
        ])
        .unwrap()
        .focus::<&str>(&[])
        .unwrap();
        let stamps = StampStore::new("state dir");
        let text = render(&plan, &stamps, &[]);

        assert!(text.starts_with(".PHONY: build-app start\\:dev-app\n"));
        assert!(text.contains("\nstart\\:dev-app: state\\ dir/start_3adev-app\n"));
        assert!(text.contains("\nstate\\ dir/start_3adev-app: state\\ dir/build-app\n"));
        assert!(text.contains("\nstate\\ dir/start_3adev-app: app/src\\ dir/main.js\n"));
        assert!(text.contains("\n\ttouch 'state dir/start_3adev-app'\n"));
    }

    #[test]
    fn test_colon_target_parses_with_make() {
        let tmp = tempfile::TempDir::new().unwrap();
        let plan = TargetGraph::build(vec![
            TargetSpec::new("build-app", Command::Noop, "app"),
            TargetSpec::new("start:dev-app", Command::shell("echo $HOME"), "app")
                .with_deps(["build-app"]),
        ])
        .unwrap()
        .focus::<&str>(&[])
        .unwrap();
        let stamps = StampStore::new(tmp.path().join("state dir"));
        let makefile = tmp.path().join("Makefile");
        std::fs::write(&makefile, render(&plan, &stamps, &default_groups())).unwrap();

        let Ok(output) = std::process::Command::new("make")
            .arg("-n")
            .arg("-f")
            .arg(&makefile)
            .arg("start:dev-app")
            .current_dir(tmp.path())
            .output()
        else {
            // make is not installed
            return;
        };
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(output.status.success(), "make rejected the file: {stderr}");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("echo $HOME"));
    }
}
