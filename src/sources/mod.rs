//! Collaborators the capsule engine consumes at its boundary.
//!
//! - [`sessions`] — enumerate sessions and read their metadata
//! - [`repos`] — resolve a repository ID to a local checkout
//! - [`git`] — list recent commits touching a set of files
//!
//! Each is a trait with a filesystem or subprocess default implementation.

pub mod git;
pub mod repos;
pub mod sessions;

pub use git::{GitCli, GitLog};
pub use repos::{RepoRegistry, TomlRepoRegistry};
pub use sessions::{FsSessionIndex, SessionIndex, SessionInfo};
