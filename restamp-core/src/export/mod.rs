//! Exporting a resolved plan to other build tools.
//!
//! Both exporters only read the plan and the stamp locations; nothing runs.

pub mod makefile;
pub mod redo;

pub use makefile::{Group, default_groups};
pub use redo::RedoFile;

use std::fs;
use std::io;
use std::path::Path;

/// Write a rendered Makefile.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be written.
pub fn write_makefile(path: &Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents)
}

/// Write rendered redo files, creating their directories.
///
/// # Errors
///
/// Returns the first I/O error encountered.
pub fn write_redo_files(files: &[RedoFile]) -> io::Result<()> {
    for file in files {
        if let Some(parent) = file.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file.path, &file.content)?;
    }
    Ok(())
}

/// Single-quote a word for `sh`.
pub(crate) fn quoted(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
