//! Real processes, real stamps: a three-target chain A -> B -> C.

use filetime::FileTime;
use restamp_core::{
    Command, CommandRunner, Engine, ProcessRunner, Recorder, RunOptions, RunReport, StampStore,
    TargetGraph, TargetSpec, TargetState,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

struct Repo {
    _tmp: TempDir,
    root: PathBuf,
    stamps: StampStore,
}

impl Repo {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        for pkg in ["a", "b", "c"] {
            let dir = root.join(pkg);
            fs::create_dir_all(&dir).unwrap();
            let source = dir.join("index.js");
            fs::write(&source, format!("// {pkg}\n")).unwrap();
            let old = FileTime::from_unix_time(1_000_000, 0);
            filetime::set_file_times(&source, old, old).unwrap();
        }
        let stamps = StampStore::new(root.join(".restamp"));
        stamps.prepare().unwrap();
        Self {
            _tmp: tmp,
            root,
            stamps,
        }
    }

    fn spec(&self, pkg: &str, script: &str, deps: &[&str]) -> TargetSpec {
        let dir = self.root.join(pkg);
        TargetSpec::new(format!("build-{pkg}"), Command::shell(script), &dir)
            .with_deps(deps.iter().copied())
            .with_sources([dir.join("index.js")])
    }

    fn chain(&self, a_script: &str) -> Vec<TargetSpec> {
        let order = self.root.join("order.txt");
        let append = |name: &str| format!("echo {name} >> '{}'", order.display());
        vec![
            self.spec("a", &format!("{a_script} && {}", append("A")), &[]),
            self.spec("b", &append("B"), &["build-a"]),
            self.spec("c", &append("C"), &["build-b"]),
        ]
    }

    async fn run(&self, specs: Vec<TargetSpec>, runner: ProcessRunner) -> (RunReport, Recorder) {
        let plan = TargetGraph::build(specs).unwrap().focus(&["build-c"]).unwrap();
        let runner: Arc<dyn CommandRunner> = Arc::new(runner);
        let engine = Engine::new(self.stamps.clone(), runner, RunOptions::default());
        let recorder = Recorder::new();
        let report = engine.run(&plan, &recorder).await;
        (report, recorder)
    }

    fn order(&self) -> String {
        fs::read_to_string(self.root.join("order.txt")).unwrap_or_default()
    }
}

fn states(report: &RunReport) -> Vec<TargetState> {
    report.statuses().iter().map(|status| status.state).collect()
}

fn touch_future(path: &Path) {
    let later = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(60));
    filetime::set_file_times(path, later, later).unwrap();
}

#[tokio::test]
async fn test_first_run_builds_in_order() {
    let repo = Repo::new();
    let (report, recorder) = repo.run(repo.chain("echo building a"), ProcessRunner::new()).await;

    assert!(report.succeeded());
    assert_eq!(states(&report), vec![TargetState::Success; 3]);
    assert_eq!(repo.order(), "A\nB\nC\n");
    assert_eq!(recorder.lines_of("build-a"), vec!["building a"]);

    for name in ["build-a", "build-b", "build-c"] {
        assert!(repo.stamps.stamp_path(name).exists());
        assert!(repo.stamps.log_path(name).exists());
    }
    let log = fs::read_to_string(repo.stamps.log_path("build-a")).unwrap();
    assert_eq!(log, "building a\n");
}

#[tokio::test]
async fn test_immediate_rerun_runs_nothing() {
    let repo = Repo::new();
    let _ = repo.run(repo.chain("true"), ProcessRunner::new()).await;
    let (report, recorder) = repo.run(repo.chain("true"), ProcessRunner::new()).await;

    assert!(report.succeeded());
    assert_eq!(states(&report), vec![TargetState::NotOutOfDate; 3]);
    assert_eq!(repo.order(), "A\nB\nC\n");
    assert!(
        recorder
            .transitions()
            .iter()
            .all(|t| t.state != TargetState::Working)
    );
}

#[tokio::test]
async fn test_failing_first_target() {
    let repo = Repo::new();
    let (report, _) = repo
        .run(repo.chain("echo broken >&2; exit 2"), ProcessRunner::new())
        .await;

    assert!(!report.succeeded());
    assert_eq!(
        states(&report),
        vec![TargetState::Failure, TargetState::CantDo, TargetState::CantDo]
    );
    assert_eq!(report.get("build-a").unwrap().exit_code, Some(2));
    assert_eq!(repo.order(), "");
    assert_eq!(
        fs::read_to_string(repo.stamps.log_path("build-a")).unwrap(),
        "broken\n"
    );
    for name in ["build-a", "build-b", "build-c"] {
        assert!(!repo.stamps.stamp_path(name).exists());
    }
}

#[tokio::test]
async fn test_missing_program_fails_and_blocks_consumers() {
    let repo = Repo::new();
    let mut specs = repo.chain("true");
    specs[0].command = Command::program("restamp-no-such-program", ["--version"]);

    let (report, recorder) = repo.run(specs, ProcessRunner::new()).await;

    assert!(!report.succeeded());
    assert_eq!(
        states(&report),
        vec![TargetState::Failure, TargetState::CantDo, TargetState::CantDo]
    );
    let a = report.get("build-a").unwrap();
    assert_eq!(a.exit_code, None);
    assert!(
        a.failure
            .as_deref()
            .unwrap()
            .starts_with("could not start restamp-no-such-program")
    );
    let log = fs::read_to_string(repo.stamps.log_path("build-a")).unwrap();
    assert!(log.starts_with("could not start restamp-no-such-program: "));
    assert!(!recorder.states_of("build-b").contains(&TargetState::Working));
    assert_eq!(repo.order(), "");
    assert!(!repo.stamps.stamp_path("build-a").exists());
}

#[tokio::test]
async fn test_changed_source_rebuilds_downstream_only() {
    let repo = Repo::new();
    let _ = repo.run(repo.chain("true"), ProcessRunner::new()).await;

    touch_future(&repo.root.join("b").join("index.js"));
    let (report, _) = repo.run(repo.chain("true"), ProcessRunner::new()).await;

    assert_eq!(
        states(&report),
        vec![TargetState::NotOutOfDate, TargetState::Success, TargetState::Success]
    );
    assert_eq!(repo.order(), "A\nB\nC\nB\nC\n");
}

#[tokio::test]
async fn test_deleting_state_dir_forces_everything() {
    let repo = Repo::new();
    let _ = repo.run(repo.chain("true"), ProcessRunner::new()).await;

    fs::remove_dir_all(repo.stamps.dir()).unwrap();
    repo.stamps.prepare().unwrap();
    let (report, _) = repo.run(repo.chain("true"), ProcessRunner::new()).await;

    assert_eq!(states(&report), vec![TargetState::Success; 3]);
}

#[tokio::test]
async fn test_timeout_fails_target() {
    let repo = Repo::new();
    let runner = ProcessRunner::new().with_timeout(Some(Duration::from_millis(200)));
    let (report, _) = repo.run(repo.chain("sleep 5"), runner).await;

    let a = report.get("build-a").unwrap();
    assert_eq!(a.state, TargetState::Failure);
    assert_eq!(a.failure.as_deref(), Some("timed out"));
    assert_eq!(report.state_of("build-c"), Some(TargetState::CantDo));
}
