//! Session listing and metadata.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CapsuleError, Result};

/// Name of the optional per-session metadata file.
pub const SESSION_META_FILE: &str = "session.toml";

/// Descriptive metadata for one work session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Enumerates sessions and reads their metadata.
pub trait SessionIndex: Send + Sync {
    /// All known session IDs, sorted.
    fn list_sessions(&self) -> Result<Vec<String>>;

    /// Metadata for one session, or `None` if the session has none recorded.
    fn session(&self, id: &str) -> Result<Option<SessionInfo>>;

    /// IDs of sessions whose metadata lists `repo`.
    fn sessions_for_repo(&self, repo: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for id in self.list_sessions()? {
            if let Some(info) = self.session(&id)? {
                if info.repos.iter().any(|r| r == repo) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }
}

/// Reads `<sessions_dir>/<id>/session.toml` files.
#[derive(Debug, Clone)]
pub struct FsSessionIndex {
    sessions_dir: PathBuf,
}

impl FsSessionIndex {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(id).join(SESSION_META_FILE)
    }

    /// Write metadata for a session, creating its directory if needed.
    pub fn write_session(&self, info: &SessionInfo) -> Result<()> {
        let dir = self.sessions_dir.join(&info.id);
        std::fs::create_dir_all(&dir).map_err(|e| CapsuleError::io("create directory", &dir, e))?;
        let path = self.meta_path(&info.id);
        let body = toml::to_string_pretty(info).map_err(|e| CapsuleError::Malformed {
            session: info.id.clone(),
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, body).map_err(|e| CapsuleError::io("write", &path, e))
    }
}

impl SessionIndex for FsSessionIndex {
    fn list_sessions(&self) -> Result<Vec<String>> {
        list_dirs(&self.sessions_dir)
    }

    fn session(&self, id: &str) -> Result<Option<SessionInfo>> {
        let path = self.meta_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&path).map_err(|e| CapsuleError::io("read", &path, e))?;
        let mut info: SessionInfo =
            toml::from_str(&contents).map_err(|e| CapsuleError::Malformed {
                session: id.to_string(),
                path: path.clone(),
                reason: e.to_string(),
            })?;
        info.id = id.to_string();
        Ok(Some(info))
    }
}

/// Names of the subdirectories of `dir`, sorted. A missing directory is empty.
pub(crate) fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| CapsuleError::io("read directory", dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CapsuleError::io("read directory", dir, e))?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let index = FsSessionIndex::new(tmp.path().join("sessions"));
        assert!(index.list_sessions().unwrap().is_empty());
        assert!(index.session("nope").unwrap().is_none());
    }

    #[test]
    fn write_then_read_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let index = FsSessionIndex::new(tmp.path());
        index
            .write_session(&SessionInfo {
                id: "s1".into(),
                description: Some("auth rewrite".into()),
                status: Some("done".into()),
                repos: vec!["api".into()],
                created_at: None,
            })
            .unwrap();
        std::fs::create_dir_all(tmp.path().join("s2")).unwrap();

        assert_eq!(index.list_sessions().unwrap(), vec!["s1", "s2"]);
        let info = index.session("s1").unwrap().unwrap();
        assert_eq!(info.description.as_deref(), Some("auth rewrite"));
        assert_eq!(index.sessions_for_repo("api").unwrap(), vec!["s1"]);
        assert!(index.sessions_for_repo("web").unwrap().is_empty());
    }

    #[test]
    fn malformed_metadata_names_session() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("bad")).unwrap();
        std::fs::write(tmp.path().join("bad").join(SESSION_META_FILE), "repos = [").unwrap();
        let err = FsSessionIndex::new(tmp.path()).session("bad").unwrap_err();
        assert!(err.to_string().contains("session bad"));
    }
}
