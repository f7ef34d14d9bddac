use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::capsule::recall::RecallEngine;
use crate::capsule::similarity::{SimilarityChecker, Thresholds};
use crate::capsule::store::CapsuleStore;
use crate::capsule::types::PhaseOrder;
use crate::sources::{FsSessionIndex, GitCli, TomlRepoRegistry};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CapsulesConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub recall: RecallConfig,
    pub similarity: Thresholds,
    pub graph: GraphConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `sessions/` and `repos.toml`.
    pub root: String,
    /// Phase order, earliest first. Empty means the canonical order.
    pub phases: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecallConfig {
    pub default_limit: usize,
    pub token_budget: usize,
    pub git_commit_limit: usize,
    /// Repo used when a recall names none.
    pub default_repo: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    pub default_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 3737,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_capsules_dir().to_string_lossy().into_owned(),
            phases: Vec::new(),
        }
    }
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            default_limit: crate::capsule::recall::DEFAULT_LIMIT,
            token_budget: 4000,
            git_commit_limit: crate::capsule::recall::DEFAULT_GIT_COMMIT_LIMIT,
            default_repo: None,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_depth: crate::capsule::graph::DEFAULT_DEPTH,
        }
    }
}

/// Returns `$CAPSULES_HOME`, or `~/.capsules/` when unset.
pub fn default_capsules_dir() -> PathBuf {
    if let Ok(home) = std::env::var("CAPSULES_HOME") {
        return expand_tilde(&home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".capsules")
}

/// Returns the default config file path: `~/.capsules/config.toml`
pub fn default_config_path() -> PathBuf {
    default_capsules_dir().join("config.toml")
}

impl CapsulesConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CapsulesConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (CAPSULES_HOME, CAPSULES_LOG_LEVEL, CAPSULES_REPO).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAPSULES_HOME") {
            self.storage.root = val;
        }
        if let Ok(val) = std::env::var("CAPSULES_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("CAPSULES_REPO") {
            self.recall.default_repo = Some(val).filter(|v| !v.is_empty());
        }
    }

    /// Resolve the storage root, expanding `~` if needed.
    pub fn resolved_root(&self) -> PathBuf {
        expand_tilde(&self.storage.root)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.resolved_root().join("sessions")
    }

    pub fn repos_path(&self) -> PathBuf {
        self.resolved_root().join("repos.toml")
    }

    pub fn phase_order(&self) -> PhaseOrder {
        if self.storage.phases.is_empty() {
            PhaseOrder::default()
        } else {
            PhaseOrder::new(self.storage.phases.iter().cloned())
        }
    }

    /// Store rooted at the configured directory, with session metadata attached.
    pub fn open_store(&self) -> CapsuleStore {
        CapsuleStore::new(self.resolved_root())
            .with_phase_order(self.phase_order())
            .with_session_index(Arc::new(FsSessionIndex::new(self.sessions_dir())))
    }

    /// Recall engine over [`open_store`](Self::open_store) with git correlation.
    pub fn recall_engine(&self) -> Result<RecallEngine> {
        let registry = TomlRepoRegistry::load(self.repos_path())
            .with_context(|| format!("failed to load {}", self.repos_path().display()))?;
        Ok(RecallEngine::new(self.open_store())
            .with_git(Arc::new(registry), Arc::new(GitCli))
            .with_limits(self.recall.default_limit, self.recall.git_commit_limit))
    }

    pub fn similarity_checker(&self) -> SimilarityChecker {
        SimilarityChecker::default().with_thresholds(self.similarity)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
