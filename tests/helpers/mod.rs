#![allow(dead_code)]

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use capsules::capsule::store::CapsuleStore;
use capsules::capsule::types::Capsule;
use capsules::sources::{FsSessionIndex, SessionInfo};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

/// Open a fresh store rooted in a temp directory, with session metadata attached.
pub fn test_store() -> (TempDir, CapsuleStore) {
    let tmp = TempDir::new().unwrap();
    let store = CapsuleStore::new(tmp.path())
        .with_session_index(Arc::new(FsSessionIndex::new(tmp.path().join("sessions"))));
    (tmp, store)
}

/// Fixed timestamp `minute` minutes into a reference hour.
pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, minute, 0).unwrap()
}

/// A capsule with a deterministic creation time.
pub fn capsule_at(session: &str, phase: &str, question: &str, minute: u32) -> Capsule {
    let mut c = Capsule::new(session, phase, question, "yes");
    c.created_at = Some(ts(minute));
    c
}

/// Store a capsule and return its ID.
pub fn insert_capsule(store: &CapsuleStore, capsule: Capsule) -> String {
    store.store(capsule).unwrap().id
}

/// Write `session.toml` metadata listing `repos`.
pub fn write_session_meta(root: &Path, session: &str, repos: &[&str]) {
    let index = FsSessionIndex::new(root.join("sessions"));
    index
        .write_session(&SessionInfo {
            id: session.to_string(),
            description: Some(format!("{session} work")),
            status: Some("active".into()),
            repos: repos.iter().map(|r| r.to_string()).collect(),
            created_at: Some(ts(0)),
        })
        .unwrap();
}

/// Run git in `dir`, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git must be installed");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Initialize a git repo with one commit touching `file`. Returns the SHA.
pub fn make_git_repo(dir: &Path, file: &str) -> String {
    run_git(dir, &["init", "-q"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test"]);
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, "fn main() {}\n").unwrap();
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "-q", "-m", "initial"]);
    run_git(dir, &["rev-parse", "HEAD"])
}
