//! Workspace loading: the root manifest and the packages its globs match.

use super::{DiscoveryError, PackageJson, normalize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A root manifest and its workspace packages.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory of the root manifest
    pub root: PathBuf,
    /// The root manifest
    pub manifest: PackageJson,
    /// Workspace packages, sorted by manifest path
    pub packages: Vec<PackageJson>,
}

impl Workspace {
    /// Load the root manifest and every package matched by
    /// `<pattern>/package.json`.
    ///
    /// Package manifests that cannot be read or parsed are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the root manifest is unusable or a pattern is not a valid glob.
    pub fn load(manifest_path: &Path) -> Result<Self, DiscoveryError> {
        let manifest = PackageJson::load(manifest_path)?;
        let root = manifest.dir();

        let mut paths = Vec::new();
        for pattern in manifest.workspace_patterns() {
            let full = root.join(pattern).join("package.json");
            let entries = glob::glob(&full.to_string_lossy()).map_err(|source| {
                DiscoveryError::Pattern {
                    pattern: pattern.clone(),
                    source,
                }
            })?;
            for entry in entries {
                match entry {
                    Ok(path) => paths.push(normalize(&path)),
                    Err(err) => warn!("skipping unreadable workspace entry: {}", err),
                }
            }
        }
        paths.sort();
        paths.dedup();

        let mut packages = Vec::with_capacity(paths.len());
        for path in paths {
            match PackageJson::load(&path) {
                Ok(package) => packages.push(package),
                Err(err) => warn!("skipping package: {}", err),
            }
        }
        debug!("found {} workspace packages under {}", packages.len(), root.display());

        Ok(Self {
            root,
            manifest,
            packages,
        })
    }
}
