//! Commit lookup through the `git` executable.

use std::path::Path;
use std::process::Command;

use crate::error::{CapsuleError, Result};

/// Lists recent commits touching a set of files.
pub trait GitLog: Send + Sync {
    /// Up to `limit` commit SHAs, newest first, that touched any of `files`.
    fn recent_commits(&self, repo_path: &Path, files: &[String], limit: usize) -> Result<Vec<String>>;
}

/// Runs `git log` as a synchronous subprocess. There is no timeout: a hung
/// git process blocks the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitLog for GitCli {
    fn recent_commits(&self, repo_path: &Path, files: &[String], limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let output = Command::new("git")
            .args(["log", "--format=%H", "-n", &limit, "--"])
            .args(files)
            .current_dir(repo_path)
            .output()
            .map_err(|e| CapsuleError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CapsuleError::Git(format!(
                "git log failed in {}: {}",
                repo_path.display(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        dir
    }

    #[test]
    fn recent_commits_filters_by_file() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("a.rs"), "fn a() {}").unwrap();
        run_git(repo.path(), &["add", "a.rs"]);
        run_git(repo.path(), &["commit", "-m", "add a"]);
        std::fs::write(repo.path().join("b.rs"), "fn b() {}").unwrap();
        run_git(repo.path(), &["add", "b.rs"]);
        run_git(repo.path(), &["commit", "-m", "add b"]);

        let a = GitCli.recent_commits(repo.path(), &["a.rs".into()], 10).unwrap();
        let all = GitCli.recent_commits(repo.path(), &[], 10).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], a[0]);
        assert!(a[0].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn non_repo_is_git_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitCli.recent_commits(dir.path(), &[], 5).unwrap_err();
        assert!(matches!(err, CapsuleError::Git(_)));
    }
}
