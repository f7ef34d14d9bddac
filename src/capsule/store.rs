//! Capsule persistence: one consolidated markdown file per session.
//!
//! [`CapsuleStore::store`] is the single write entry point. Every mutation is
//! read-whole-file → mutate → write-whole-file (temp file + rename). There is no
//! locking; concurrent writers to the same session race and the last write wins.
//!
//! Cross-capsule back-links (`superseded_by`, `supersedes`, `enables`) are
//! best-effort and single-attempt: if updating the linked capsule fails the
//! primary write still succeeds and the relation stays one-directional.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::capsule::codec::{decode_session, encode_session};
use crate::capsule::tags::{touches_file, TagClassifier};
use crate::capsule::types::{Capsule, CapsuleType, Challenge, PhaseOrder, Status};
use crate::error::{CapsuleError, Result};
use crate::sources::sessions::{list_dirs, SessionIndex};

/// File name of the consolidated capsule file inside a session directory.
pub const CAPSULE_FILE: &str = "capsules.md";

/// Result returned from a store operation.
#[derive(Debug, Serialize)]
pub struct StoreCapsuleResult {
    pub id: String,
    pub session_id: String,
    /// `false` when an existing capsule with the same ID was replaced.
    pub created: bool,
    /// IDs this capsule supersedes that were back-linked successfully.
    pub superseded: Vec<String>,
}

/// Result of attaching commit SHAs to capsules.
#[derive(Debug, Default, Serialize)]
pub struct LinkCommitsResult {
    pub capsules_updated: usize,
    pub commits_added: usize,
}

/// A capsule with its direct supersession neighbours resolved.
#[derive(Debug, Serialize)]
pub struct CapsuleChain {
    pub capsule: Capsule,
    /// Older capsules this one replaced.
    pub supersedes: Vec<Capsule>,
    /// The newer capsule that replaced this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<Capsule>,
}

/// A tag and how many active capsules carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Filters for [`CapsuleStore::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub session: Option<String>,
    pub repo: Option<String>,
    pub phase: Option<String>,
    /// Tag query, synonym-aware.
    pub tag: Option<String>,
    /// Capsules with a `file:` tag matching this path.
    pub file_path: Option<String>,
    pub status: Option<Status>,
    pub kind: Option<CapsuleType>,
    pub include_invalidated: bool,
    /// Keep every phase revision instead of only the latest per question.
    pub show_evolution: bool,
}

impl ListFilter {
    /// Every capsule, every revision, including invalidated ones.
    pub fn everything() -> Self {
        Self {
            include_invalidated: true,
            show_evolution: true,
            ..Self::default()
        }
    }
}

/// File-backed capsule store rooted at a directory containing `sessions/`.
#[derive(Clone)]
pub struct CapsuleStore {
    root: PathBuf,
    phases: PhaseOrder,
    classifier: TagClassifier,
    sessions: Option<Arc<dyn SessionIndex>>,
}

impl std::fmt::Debug for CapsuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapsuleStore")
            .field("root", &self.root)
            .field("phases", &self.phases)
            .finish_non_exhaustive()
    }
}

impl CapsuleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            phases: PhaseOrder::default(),
            classifier: TagClassifier::default(),
            sessions: None,
        }
    }

    pub fn with_phase_order(mut self, phases: PhaseOrder) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_classifier(mut self, classifier: TagClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Session metadata source, consulted for repo filters.
    pub fn with_session_index(mut self, index: Arc<dyn SessionIndex>) -> Self {
        self.sessions = Some(index);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn classifier(&self) -> &TagClassifier {
        &self.classifier
    }

    pub fn phase_order(&self) -> &PhaseOrder {
        &self.phases
    }

    pub fn session_index(&self) -> Option<&dyn SessionIndex> {
        self.sessions.as_deref()
    }

    /// Path of a session's consolidated file.
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(session_id).join(CAPSULE_FILE)
    }

    /// IDs of sessions that have a consolidated capsule file, sorted.
    pub fn session_ids(&self) -> Result<Vec<String>> {
        Ok(list_dirs(&self.sessions_dir())?
            .into_iter()
            .filter(|id| self.session_path(id).is_file())
            .collect())
    }

    /// Load a session's capsules; `None` if the session has no file yet.
    pub fn load_session(&self, session_id: &str) -> Result<Option<Vec<Capsule>>> {
        validate_session_id(session_id)?;
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&path).map_err(|e| CapsuleError::io("read", &path, e))?;
        let doc = decode_session(&contents).map_err(|reason| CapsuleError::Malformed {
            session: session_id.to_string(),
            path: path.clone(),
            reason,
        })?;
        if doc.session_id != session_id {
            tracing::warn!(
                dir = session_id,
                front_matter = %doc.session_id,
                "session id in front matter differs from directory name"
            );
        }
        Ok(Some(doc.capsules))
    }

    /// Rewrite a session's consolidated file.
    fn write_session(&self, session_id: &str, capsules: &[Capsule]) -> Result<()> {
        let path = self.session_path(session_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CapsuleError::io("create directory", parent, e))?;
        }
        let contents = encode_session(session_id, capsules, &self.phases);
        let tmp_path = path.with_extension("md.tmp");
        std::fs::write(&tmp_path, contents).map_err(|e| CapsuleError::io("write", &tmp_path, e))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| CapsuleError::io("rename", &path, e))?;
        tracing::debug!(session = session_id, capsules = capsules.len(), "session file written");
        Ok(())
    }

    /// Insert or replace a capsule by ID.
    ///
    /// Tags are normalized, invariants checked, and supersession cycles
    /// rejected before anything is written. A replaced capsule keeps its
    /// challenge history, back-links and linked commits.
    pub fn store(&self, capsule: Capsule) -> Result<StoreCapsuleResult> {
        let mut capsule = capsule;
        validate_session_id(&capsule.session_id)?;
        capsule.tags = self.classifier.normalize_tags(&capsule.tags);
        capsule
            .validate()
            .map_err(|reason| CapsuleError::invalid(&capsule.id, reason))?;
        if !capsule.supersedes.is_empty() {
            self.check_acyclic(&capsule.id, &capsule.supersedes)?;
        }

        let session_id = capsule.session_id.clone();
        let mut capsules = self.load_session(&session_id)?.unwrap_or_default();

        let created = match capsules.iter_mut().find(|c| c.id == capsule.id) {
            Some(existing) => {
                carry_over(existing, &mut capsule);
                *existing = capsule.clone();
                false
            }
            None => {
                capsules.push(capsule.clone());
                true
            }
        };
        self.write_session(&session_id, &capsules)?;

        tracing::info!(
            id = %capsule.id,
            session = %session_id,
            phase = %capsule.phase,
            created,
            "capsule stored"
        );

        let mut superseded = Vec::new();
        for old_id in &capsule.supersedes {
            let new_id = capsule.id.clone();
            let linked = self.backlink(old_id, "superseded_by", |old| {
                if old.superseded_by.as_deref() == Some(new_id.as_str()) {
                    return false;
                }
                old.superseded_by = Some(new_id.clone());
                true
            });
            if linked {
                superseded.push(old_id.clone());
            }
        }
        if let Some(ref parent) = capsule.enabled_by {
            let child = capsule.id.clone();
            self.backlink(parent, "enables", |p| push_unique(&mut p.enables, &child));
        }

        Ok(StoreCapsuleResult {
            id: capsule.id,
            session_id,
            created,
            superseded,
        })
    }

    /// Apply `update` to another capsule and persist it, swallowing failures.
    ///
    /// Returns `true` if the linked capsule exists and is consistent afterwards.
    fn backlink(&self, id: &str, relation: &str, update: impl FnOnce(&mut Capsule) -> bool) -> bool {
        match self.update_capsule(id, update) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(id, relation, error = %e, "back-link failed, relation left one-directional");
                false
            }
        }
    }

    /// Load the capsule's session, apply `update`, and write if it changed.
    fn update_capsule(&self, id: &str, update: impl FnOnce(&mut Capsule) -> bool) -> Result<Capsule> {
        let (session_id, mut capsules) = self.locate(id)?;
        let idx = capsules
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| CapsuleError::NotFound(id.to_string()))?;
        if update(&mut capsules[idx]) {
            self.write_session(&session_id, &capsules)?;
        }
        Ok(capsules.swap_remove(idx))
    }

    /// Find the session holding `id` and return all of that session's capsules.
    fn locate(&self, id: &str) -> Result<(String, Vec<Capsule>)> {
        for session_id in self.session_ids()? {
            match self.load_session(&session_id) {
                Ok(Some(capsules)) => {
                    if capsules.iter().any(|c| c.id == id) {
                        return Ok((session_id, capsules));
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(session = %session_id, error = %e, "skipping unreadable session"),
            }
        }
        Err(CapsuleError::NotFound(id.to_string()))
    }

    /// Reject the write if `id`'s supersedes closure would reach `id` again.
    fn check_acyclic(&self, id: &str, supersedes: &[String]) -> Result<()> {
        let mut edges: HashMap<String, Vec<String>> = self
            .list(&ListFilter::everything())?
            .into_iter()
            .map(|c| (c.id, c.supersedes))
            .collect();
        edges.insert(id.to_string(), supersedes.to_vec());

        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = supersedes.iter().map(String::as_str).collect();
        while let Some(next) = stack.pop() {
            if next == id {
                return Err(CapsuleError::SupersessionCycle(id.to_string()));
            }
            if !seen.insert(next) {
                continue;
            }
            if let Some(older) = edges.get(next) {
                stack.extend(older.iter().map(String::as_str));
            }
        }
        Ok(())
    }

    /// Fetch a capsule by ID from any session.
    pub fn get(&self, id: &str) -> Result<Capsule> {
        let (_, capsules) = self.locate(id)?;
        capsules
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CapsuleError::NotFound(id.to_string()))
    }

    /// List capsules across sessions.
    ///
    /// Invalidated capsules are excluded unless requested. Unless
    /// `show_evolution` is set, only the latest-phase revision of each
    /// (session, question) is kept. Results are newest first.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Capsule>> {
        let session_ids = match filter.session {
            Some(ref s) => vec![s.clone()],
            None => self.session_ids()?,
        };
        let repo_sessions = self.sessions_for_repo(filter.repo.as_deref());

        let mut out = Vec::new();
        for session_id in session_ids {
            let capsules = match self.load_session(&session_id) {
                Ok(Some(capsules)) => capsules,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(session = %session_id, error = %e, "skipping unreadable session");
                    continue;
                }
            };
            out.extend(
                capsules
                    .into_iter()
                    .filter(|c| self.matches(c, filter, &repo_sessions)),
            );
        }

        let mut out = if filter.show_evolution {
            out
        } else {
            dedup_latest_phase(out, &self.phases)
        };
        sort_newest_first(&mut out);
        Ok(out)
    }

    fn sessions_for_repo(&self, repo: Option<&str>) -> HashSet<String> {
        let (Some(repo), Some(index)) = (repo, self.sessions.as_deref()) else {
            return HashSet::new();
        };
        match index.sessions_for_repo(repo) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!(repo, error = %e, "session index lookup failed");
                HashSet::new()
            }
        }
    }

    fn matches(&self, c: &Capsule, filter: &ListFilter, repo_sessions: &HashSet<String>) -> bool {
        let include_invalidated =
            filter.include_invalidated || filter.status == Some(Status::Invalidated);
        if c.status == Status::Invalidated && !include_invalidated {
            return false;
        }
        if filter.status.is_some_and(|s| s != c.status) {
            return false;
        }
        if filter.kind.is_some_and(|k| k != c.kind) {
            return false;
        }
        if let Some(ref phase) = filter.phase {
            if !c.phase.eq_ignore_ascii_case(phase) {
                return false;
            }
        }
        if let Some(ref repo) = filter.repo {
            let owned = c.repos.iter().any(|r| r == repo);
            let via_session = c.repos.is_empty() && repo_sessions.contains(&c.session_id);
            if !owned && !via_session {
                return false;
            }
        }
        if let Some(ref tag) = filter.tag {
            if !self.classifier.matches_tag_query_with_synonyms(&c.tags, tag) {
                return false;
            }
        }
        if let Some(ref path) = filter.file_path {
            if !touches_file(&c.tags, path) {
                return false;
            }
        }
        true
    }

    /// Mark a capsule invalidated and record why.
    ///
    /// If `superseded_by` is given, that capsule's `supersedes` list is
    /// back-linked on a best-effort basis.
    pub fn invalidate(
        &self,
        id: &str,
        reason: &str,
        learned: Option<&str>,
        superseded_by: Option<&str>,
    ) -> Result<Capsule> {
        if reason.trim().is_empty() {
            return Err(CapsuleError::invalid(id, "invalidation reason must not be empty"));
        }
        if let Some(newer) = superseded_by {
            if newer == id {
                return Err(CapsuleError::invalid(id, "a capsule cannot supersede itself"));
            }
            let mut supersedes = self.get(newer).map(|c| c.supersedes).unwrap_or_default();
            push_unique(&mut supersedes, id);
            self.check_acyclic(newer, &supersedes)?;
        }

        let now = Utc::now();
        let learned = learned.map(str::trim).filter(|l| !l.is_empty()).map(String::from);
        let updated = self.update_capsule(id, |c| {
            c.status = Status::Invalidated;
            c.invalidated_at = Some(now);
            c.invalidation_reason = Some(reason.trim().to_string());
            if learned.is_some() {
                c.learned = learned.clone();
            }
            if let Some(newer) = superseded_by {
                c.superseded_by = Some(newer.to_string());
            }
            c.challenges.push(Challenge {
                timestamp: now,
                reason: reason.trim().to_string(),
                learned: learned.clone(),
                resolution: "invalidated".into(),
            });
            true
        })?;

        tracing::info!(id, superseded_by, "capsule invalidated");

        if let Some(newer) = superseded_by {
            self.backlink(newer, "supersedes", |n| push_unique(&mut n.supersedes, id));
        }
        Ok(updated)
    }

    /// Resolve a capsule's direct supersession neighbours.
    pub fn get_chain(&self, id: &str) -> Result<CapsuleChain> {
        let all: HashMap<String, Capsule> = self
            .list(&ListFilter::everything())?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        let capsule = all
            .get(id)
            .cloned()
            .ok_or_else(|| CapsuleError::NotFound(id.to_string()))?;
        let supersedes = capsule
            .supersedes
            .iter()
            .filter_map(|old| all.get(old).cloned())
            .collect();
        let superseded_by = capsule
            .superseded_by
            .as_ref()
            .and_then(|newer| all.get(newer).cloned());
        Ok(CapsuleChain {
            capsule,
            supersedes,
            superseded_by,
        })
    }

    /// Tag usage across active capsules, most used first.
    pub fn list_tags(&self, prefix: Option<&str>) -> Result<Vec<TagCount>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for capsule in self.list(&ListFilter::default())? {
            for tag in capsule.tags {
                let wanted = prefix.map_or(true, |p| {
                    tag.strip_prefix(p.trim_end_matches(':'))
                        .is_some_and(|rest| rest.starts_with(':'))
                });
                if wanted {
                    *counts.entry(tag).or_insert(0) += 1;
                }
            }
        }
        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        Ok(tags)
    }

    /// Attach commit SHAs to one capsule.
    pub fn link_commits(&self, id: &str, shas: &[String]) -> Result<LinkCommitsResult> {
        let mut added = 0;
        self.update_capsule(id, |c| {
            added = extend_unique(&mut c.commits, shas);
            added > 0
        })?;
        Ok(LinkCommitsResult {
            capsules_updated: usize::from(added > 0),
            commits_added: added,
        })
    }

    /// Attach commit SHAs to every active capsule of a session.
    pub fn link_commits_for_session(
        &self,
        session_id: &str,
        shas: &[String],
    ) -> Result<LinkCommitsResult> {
        let mut capsules = self
            .load_session(session_id)?
            .ok_or_else(|| CapsuleError::SessionNotFound(session_id.to_string()))?;
        let mut result = LinkCommitsResult::default();
        for capsule in capsules.iter_mut().filter(|c| c.is_active()) {
            let added = extend_unique(&mut capsule.commits, shas);
            if added > 0 {
                result.capsules_updated += 1;
                result.commits_added += added;
            }
        }
        if result.capsules_updated > 0 {
            self.write_session(session_id, &capsules)?;
        }
        tracing::info!(
            session = session_id,
            capsules = result.capsules_updated,
            commits = result.commits_added,
            "commits linked"
        );
        Ok(result)
    }
}

/// Collapse each (session, question) group to its highest-ranked phase.
///
/// Ties on rank keep the most recently created capsule.
pub fn dedup_latest_phase(capsules: Vec<Capsule>, phases: &PhaseOrder) -> Vec<Capsule> {
    let mut best: HashMap<(String, String), Capsule> = HashMap::new();
    for capsule in capsules {
        let key = (capsule.session_id.clone(), capsule.question.trim().to_string());
        match best.get(&key) {
            Some(current) => {
                let newer_rank = phases.rank(&capsule.phase);
                let current_rank = phases.rank(&current.phase);
                if newer_rank > current_rank
                    || (newer_rank == current_rank && capsule.created_at > current.created_at)
                {
                    best.insert(key, capsule);
                }
            }
            None => {
                best.insert(key, capsule);
            }
        }
    }
    best.into_values().collect()
}

/// Newest `created_at` first; ties broken by ID for a stable order.
pub fn sort_newest_first(capsules: &mut [Capsule]) {
    capsules.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Fold state written by other operations into a replacement record.
///
/// `superseded_by` survives unless the replacement sets it. `enables` and
/// `commits` are unions, existing entries first. Challenges are append-only.
fn carry_over(existing: &mut Capsule, replacement: &mut Capsule) {
    if replacement.superseded_by.is_none() {
        replacement.superseded_by = existing.superseded_by.take();
    }

    let mut enables = std::mem::take(&mut existing.enables);
    extend_unique(&mut enables, &replacement.enables);
    replacement.enables = enables;

    let mut commits = std::mem::take(&mut existing.commits);
    extend_unique(&mut commits, &replacement.commits);
    replacement.commits = commits;

    let mut history = std::mem::take(&mut existing.challenges);
    for challenge in replacement.challenges.drain(..) {
        if !history.contains(&challenge) {
            history.push(challenge);
        }
    }
    replacement.challenges = history;
    if replacement.unparsed_challenges.is_none() {
        replacement.unparsed_challenges = existing.unparsed_challenges.take();
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        false
    } else {
        list.push(value.to_string());
        true
    }
}

fn extend_unique(list: &mut Vec<String>, values: &[String]) -> usize {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .filter(|v| push_unique(list, v))
        .count()
}

fn validate_session_id(session_id: &str) -> Result<()> {
    let bad = session_id.trim().is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\']);
    if bad {
        return Err(CapsuleError::invalid(
            session_id,
            "session id must be a non-empty single path component",
        ));
    }
    Ok(())
}
