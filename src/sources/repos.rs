//! Repository registry: repo ID → local checkout path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CapsuleError, Result};

/// Resolves registered repository IDs to local paths.
pub trait RepoRegistry: Send + Sync {
    fn repo_path(&self, repo_id: &str) -> Result<PathBuf>;

    fn repo_ids(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    repos: BTreeMap<String, RepoEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RepoEntry {
    path: String,
}

/// Registry backed by a `repos.toml` file:
///
/// ```toml
/// [repos.api]
/// path = "~/src/api"
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlRepoRegistry {
    repos: BTreeMap<String, PathBuf>,
}

impl TomlRepoRegistry {
    /// Load the registry; a missing file yields an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no repo registry, git correlation disabled");
            return Ok(Self::default());
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| CapsuleError::io("read", path, e))?;
        let file: RegistryFile = toml::from_str(&contents).map_err(|e| CapsuleError::Malformed {
            session: "repos".into(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            repos: file
                .repos
                .into_iter()
                .map(|(id, entry)| (id, crate::config::expand_tilde(&entry.path)))
                .collect(),
        })
    }

    pub fn insert(&mut self, repo_id: &str, path: impl Into<PathBuf>) {
        self.repos.insert(repo_id.to_string(), path.into());
    }
}

impl RepoRegistry for TomlRepoRegistry {
    fn repo_path(&self, repo_id: &str) -> Result<PathBuf> {
        self.repos
            .get(repo_id)
            .cloned()
            .ok_or_else(|| CapsuleError::RepoNotFound(repo_id.to_string()))
    }

    fn repo_ids(&self) -> Vec<String> {
        self.repos.keys().cloned().collect()
    }
}
