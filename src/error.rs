//! Error taxonomy for the capsule store and its engines.
//!
//! Library code returns [`CapsuleError`]; the CLI and MCP layers wrap it in
//! `anyhow` with extra context. Every variant names the capsule, session, or
//! path involved.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by capsule storage, parsing, and queries.
#[derive(Debug, Error)]
pub enum CapsuleError {
    /// No capsule with this ID exists in any session.
    #[error("capsule not found: {0}")]
    NotFound(String),

    /// The session has no consolidated capsule file.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The repository ID is not registered.
    #[error("repo not found: {0}")]
    RepoNotFound(String),

    /// A consolidated session file could not be parsed.
    #[error("malformed capsule file for session {session} ({}): {reason}", path.display())]
    Malformed {
        session: String,
        path: PathBuf,
        reason: String,
    },

    /// Filesystem failure while reading or writing capsule data.
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The capsule violates a model invariant.
    #[error("invalid capsule {id}: {reason}")]
    Invalid { id: String, reason: String },

    /// Storing the capsule would make the supersession relation cyclic.
    #[error("supersession cycle through capsule {0}")]
    SupersessionCycle(String),

    /// The git subprocess failed.
    #[error("git: {0}")]
    Git(String),
}

impl CapsuleError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(id: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// `true` for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::SessionNotFound(_) | Self::RepoNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CapsuleError>;
