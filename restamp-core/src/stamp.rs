//! Stamp files: zero-byte markers whose modification time records when a
//! target last completed.

use crate::staleness::StampRead;
use filetime::FileTime;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// Location of stamps and logs for one state directory.
#[derive(Debug, Clone)]
pub struct StampStore {
    dir: PathBuf,
}

impl StampStore {
    /// Store rooted at `dir` (created by [`StampStore::prepare`]).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The state directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the state directory.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn prepare(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Stamp file of a target.
    #[must_use]
    pub fn stamp_path(&self, name: &str) -> PathBuf {
        self.dir.join(sanitize(name))
    }

    /// Log file of a target, next to its stamp.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.log", sanitize(name)))
    }

    /// Read the stamp time of a target.
    pub fn read(&self, name: &str) -> StampRead {
        let path = self.stamp_path(name);
        match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(time) => StampRead::At(time),
            Err(err) if err.kind() == io::ErrorKind::NotFound => StampRead::Missing,
            Err(err) => {
                warn!("could not read stamp {}: {}", path.display(), err);
                StampRead::Unreadable
            }
        }
    }

    /// Truncate a target's log, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the log cannot be created.
    pub fn reset_log(&self, name: &str) -> io::Result<()> {
        fs::File::create(self.log_path(name)).map(drop)
    }

    /// Mark a target as completed now.
    ///
    /// Returns the modification time the file system actually recorded, which
    /// may be coarser than the clock.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the stamp cannot be created or touched.
    pub fn write(&self, name: &str) -> io::Result<SystemTime> {
        let path = self.stamp_path(name);
        let _ = fs::File::create(&path)?;
        let now = FileTime::now();
        filetime::set_file_times(&path, now, now)?;
        fs::metadata(&path)?.modified()
    }
}

/// Map a target name to a file name.
///
/// ASCII letters, digits and `-` pass through; every other byte becomes `_`
/// followed by two lowercase hex digits.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "_{byte:02x}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("build-app"), "build-app");
        assert_eq!(sanitize("build-@scope/app"), "build-_40scope_2fapp");
        assert_eq!(sanitize("a_b"), "a_5fb");
        assert_eq!(sanitize(".."), "_2e_2e");
        assert_eq!(sanitize("x.log"), "x_2elog");
    }

    #[test]
    fn test_sanitize_is_injective_on_tricky_names() {
        let names = ["a_2fb", "a/b", "a_b", "a.b", "a-b"];
        let mapped: std::collections::HashSet<String> = names.iter().map(|n| sanitize(n)).collect();
        assert_eq!(mapped.len(), names.len());
    }

    #[test]
    fn test_paths() {
        let store = StampStore::new(".restamp");
        assert_eq!(store.stamp_path("build-a"), PathBuf::from(".restamp/build-a"));
        assert_eq!(store.log_path("build-a"), PathBuf::from(".restamp/build-a.log"));
    }

    #[test]
    fn test_missing_then_written() {
        let tmp = TempDir::new().unwrap();
        let store = StampStore::new(tmp.path().join("state"));
        store.prepare().unwrap();

        assert_eq!(store.read("build-a"), StampRead::Missing);

        let written = store.write("build-a").unwrap();
        assert_eq!(store.read("build-a"), StampRead::At(written));
        assert_eq!(fs::metadata(store.stamp_path("build-a")).unwrap().len(), 0);
    }

    #[test]
    fn test_write_moves_time_forward() {
        let tmp = TempDir::new().unwrap();
        let store = StampStore::new(tmp.path());
        let path = store.stamp_path("a");
        fs::write(&path, "").unwrap();
        let old = FileTime::from_unix_time(1_000, 0);
        filetime::set_file_times(&path, old, old).unwrap();

        let written = store.write("a").unwrap();
        assert!(written > UNIX_EPOCH + Duration::from_secs(1_000));
    }

    #[test]
    fn test_stamp_under_a_file_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let not_a_dir = tmp.path().join("state");
        fs::write(&not_a_dir, "").unwrap();

        let store = StampStore::new(&not_a_dir);
        assert_eq!(store.read("build-a"), StampRead::Unreadable);
    }

    #[test]
    fn test_reset_log_truncates() {
        let tmp = TempDir::new().unwrap();
        let store = StampStore::new(tmp.path());
        fs::write(store.log_path("a"), "old output\n").unwrap();

        store.reset_log("a").unwrap();
        assert_eq!(fs::read_to_string(store.log_path("a")).unwrap(), "");
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let store = StampStore::new(tmp.path().join("not-there"));
        assert!(store.write("a").is_err());
    }
}
