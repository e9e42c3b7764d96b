//! Listing the files a repository tracks.

use super::normalize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never scanned for sources.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

/// Files tracked by git under `root`, or every file found by walking `root`
/// when git is unavailable.
///
/// Paths are `root`-joined and normalized, so they compare with package
/// directories component by component.
pub async fn list(root: &Path, state_dir: &Path) -> Vec<PathBuf> {
    match git_ls_files(root).await {
        Ok(files) => files,
        Err(reason) => {
            debug!("git ls-files unavailable ({}), walking {}", reason, root.display());
            walk(root, state_dir)
        }
    }
}

async fn git_ls_files(root: &Path) -> Result<Vec<PathBuf>, String> {
    let output = Command::new("git")
        .args(["ls-files", "-z"])
        .current_dir(root)
        .output()
        .await
        .map_err(|err| err.to_string())?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }

    Ok(output
        .stdout
        .split(|byte| *byte == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| normalize(&root.join(path_from_bytes(entry))))
        .collect())
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

fn walk(root: &Path, state_dir: &Path) -> Vec<PathBuf> {
    // Both sides canonical, so a relative state dir matches absolute entries
    let state_dir = state_dir.canonicalize().ok();
    let is_state_dir = |entry: &DirEntry| {
        state_dir
            .as_ref()
            .is_some_and(|dir| entry.path().canonicalize().is_ok_and(|path| &path == dir))
    };
    let skip = |entry: &DirEntry| {
        entry.file_type().is_dir()
            && entry.depth() > 0
            && (entry
                .file_name()
                .to_str()
                .is_some_and(|name| SKIPPED_DIRS.contains(&name))
                || is_state_dir(entry))
    };

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !skip(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping while listing sources: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| normalize(entry.path()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_skips_tooling_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for file in [
            "packages/a/index.js",
            "packages/a/node_modules/dep/index.js",
            ".git/HEAD",
            ".restamp/build-a",
            "README.md",
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let files = walk(root, &root.join(".restamp"));
        assert_eq!(
            files,
            vec![root.join("README.md"), root.join("packages/a/index.js")]
        );
    }

    #[test]
    fn test_walk_skips_state_dir_given_another_way() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for file in ["state/build-a", "src/index.js"] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let files = walk(root, &root.join("src").join("..").join("state"));
        assert_eq!(files, vec![root.join("src/index.js")]);
    }

    #[tokio::test]
    async fn test_git_listing_keeps_unusual_names() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let names = ["plain.js", "with space.js", "line\nbreak.js", "\u{fc}ber.js"];
        for name in names {
            fs::write(root.join(name), "").unwrap();
        }
        let git = |args: &[&str]| {
            std::process::Command::new("git")
                .args(args)
                .current_dir(root)
                .output()
                .is_ok_and(|output| output.status.success())
        };
        if !git(&["init", "-q"]) || !git(&["add", "."]) {
            // git is not available
            return;
        }

        let mut files = list(root, &root.join(".restamp")).await;
        files.sort();
        let mut expected: Vec<PathBuf> = names.iter().map(|name| root.join(name)).collect();
        expected.sort();
        assert_eq!(files, expected);
    }

    #[tokio::test]
    async fn test_list_outside_git_falls_back_to_walk() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        let files = list(tmp.path(), &tmp.path().join(".restamp")).await;
        assert_eq!(files, vec![tmp.path().join("a.txt")]);
    }
}
