//! package.json model.

use super::{DiscoveryError, normalize};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// `workspaces` is either a list of globs or an object with a `packages` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    /// `"workspaces": ["packages/*"]`
    List(Vec<String>),
    /// `"workspaces": { "packages": ["packages/*"] }`
    Config {
        /// Package globs
        #[serde(default)]
        packages: Vec<String>,
    },
}

/// The parts of a package.json that matter for target discovery.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    /// Package name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    scripts: BTreeMap<String, Value>,
    #[serde(default)]
    workspaces: Option<Workspaces>,
    /// Where the manifest was read from
    #[serde(skip)]
    pub path: PathBuf,
}

impl PackageJson {
    /// Read and parse a manifest.
    ///
    /// # Errors
    ///
    /// `DiscoveryError::Read` or `DiscoveryError::Parse`.
    pub fn load(path: &Path) -> Result<Self, DiscoveryError> {
        let content = fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut json = Self::parse(&content).map_err(|source| DiscoveryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        json.path = normalize(path);
        Ok(json)
    }

    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the text is not a package.json object.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Directory holding the manifest.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        normalize(self.path.parent().unwrap_or(Path::new(".")))
    }

    /// Name used in target names: the package name, or the directory name for
    /// packages without one.
    #[must_use]
    pub fn target_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .dir()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// Names from `dependencies` and `devDependencies`, without duplicates.
    #[must_use]
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Script names with a string body.
    pub fn script_names(&self) -> impl Iterator<Item = &str> {
        self.scripts
            .iter()
            .filter(|(_, body)| body.is_string())
            .map(|(name, _)| name.as_str())
    }

    /// Whether a script with this name exists.
    #[must_use]
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.get(name).is_some_and(Value::is_string)
    }

    /// Workspace globs, in either notation.
    #[must_use]
    pub fn workspace_patterns(&self) -> &[String] {
        match &self.workspaces {
            Some(Workspaces::List(patterns)) | Some(Workspaces::Config { packages: patterns }) => {
                patterns.as_slice()
            }
            None => &[],
        }
    }
}
