//! Turning a package.json workspace into target specifications.
//!
//! - [`package_json`]: the subset of package.json we read
//! - [`workspace`]: root manifest plus every package matched by its globs
//! - [`sources`]: files tracked in the repository
//! - [`targets`]: one builder per CLI verb

pub mod package_json;
pub mod sources;
pub mod targets;
pub mod workspace;

pub use package_json::PackageJson;
pub use targets::TargetBuilder;
pub use workspace::Workspace;

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors that stop discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A manifest could not be read
    #[error("could not read {}: {source}", path.display())]
    Read {
        /// Manifest path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A manifest is not valid package.json
    #[error("invalid manifest {}: {source}", path.display())]
    Parse {
        /// Manifest path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A workspace pattern is not a valid glob
    #[error("invalid workspace pattern {pattern}: {source}")]
    Pattern {
        /// The pattern as written in the manifest
        pattern: String,
        /// Underlying error
        source: glob::PatternError,
    },
}

/// Drop `.` components so that paths from different sources compare equal.
///
/// An empty result becomes `.`.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./packages/a")), PathBuf::from("packages/a"));
        assert_eq!(normalize(Path::new("packages/./a/x.js")), PathBuf::from("packages/a/x.js"));
        assert_eq!(normalize(Path::new("")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("/abs/./p")), PathBuf::from("/abs/p"));
    }
}
