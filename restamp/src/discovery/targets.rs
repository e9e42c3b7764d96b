//! Target construction, one builder method per CLI verb.

use super::{PackageJson, Workspace};
use restamp_core::{Command, TargetSpec};
use std::path::PathBuf;

/// Scripts that get fixed wiring in [`TargetBuilder::was`].
const WIRED_SCRIPTS: [&str; 4] = ["build", "test", "format", "lint"];

/// Builds target specifications for every package of a workspace.
#[derive(Debug, Clone, Copy)]
pub struct TargetBuilder<'a> {
    workspace: &'a Workspace,
    sources: &'a [PathBuf],
    by_deps: bool,
    use_srcs: bool,
}

impl<'a> TargetBuilder<'a> {
    /// Builder over a loaded workspace and its listed source files.
    #[must_use]
    pub fn new(workspace: &'a Workspace, sources: &'a [PathBuf], by_deps: bool, use_srcs: bool) -> Self {
        Self {
            workspace,
            sources,
            by_deps,
            use_srcs,
        }
    }

    /// `exec-<first word>-<package>` running the words as shell text.
    #[must_use]
    pub fn exec(&self, words: &[String]) -> Vec<TargetSpec> {
        let first = words.first().map_or("", String::as_str);
        let script = words.join(" ");
        self.workspace
            .packages
            .iter()
            .map(|package| {
                let spec = self.spec(
                    package,
                    format!("exec-{first}-{}", package.target_name()),
                    Command::shell(script.clone()),
                );
                self.wire_same_verb(spec, package, &format!("exec-{first}"))
            })
            .collect()
    }

    /// `<script>-<package>` running `yarn run <script>`.
    ///
    /// Packages without the script get a target that does nothing.
    #[must_use]
    pub fn run(&self, script: &str) -> Vec<TargetSpec> {
        self.workspace
            .packages
            .iter()
            .map(|package| {
                let spec = self.yarn_run(package, script);
                self.wire_same_verb(spec, package, script)
            })
            .collect()
    }

    /// The fixed target set per package: build, test, format, lint and one
    /// target per remaining script.
    ///
    /// `build-<pkg>` depends on `build-<dep>` for each dependency (with
    /// by-deps), `test-<pkg>` on `build-<pkg>`, `lint-<pkg>` on
    /// `format-<pkg>`, and `start*` scripts on `build-<pkg>`.
    #[must_use]
    pub fn was(&self) -> Vec<TargetSpec> {
        let mut specs = Vec::new();

        for package in &self.workspace.packages {
            let name = package.target_name();
            let build_name = format!("build-{name}");

            let build = self.yarn_run(package, "build");
            specs.push(if self.by_deps {
                build.with_deps(
                    package
                        .dependency_names()
                        .iter()
                        .map(|dep| format!("build-{dep}")),
                )
            } else {
                build
            });
            specs.push(self.yarn_run(package, "test").with_deps([build_name.clone()]));
            specs.push(self.yarn_run(package, "format"));
            specs.push(self.yarn_run(package, "lint").with_deps([format!("format-{name}")]));

            for script in package.script_names() {
                if WIRED_SCRIPTS.contains(&script) {
                    continue;
                }
                let spec = self.yarn_run(package, script);
                specs.push(if script.starts_with("start") {
                    spec.with_deps([build_name.clone()])
                } else {
                    spec
                });
            }
        }

        specs
    }

    fn yarn_run(&self, package: &PackageJson, script: &str) -> TargetSpec {
        let command = if package.has_script(script) {
            Command::program("yarn", ["run", script])
        } else {
            Command::Noop
        };
        self.spec(package, format!("{script}-{}", package.target_name()), command)
    }

    fn spec(&self, package: &PackageJson, name: String, command: Command) -> TargetSpec {
        let dir = package.dir();
        let spec = TargetSpec::new(name, command, dir.clone());
        if self.use_srcs {
            spec.with_sources(self.sources.iter().filter(|source| source.starts_with(&dir)).cloned())
        } else {
            spec
        }
    }

    fn wire_same_verb(&self, spec: TargetSpec, package: &PackageJson, prefix: &str) -> TargetSpec {
        if !self.by_deps {
            return spec;
        }
        spec.with_deps(
            package
                .dependency_names()
                .iter()
                .map(|dep| format!("{prefix}-{dep}")),
        )
    }
}
