//! Multi-strategy recall over the capsule store.
//!
//! Each strategy tags its matches with a [`MatchTier`]; a capsule matched by
//! several strategies keeps its best tier. No state survives between calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capsule::store::{sort_newest_first, CapsuleStore, ListFilter};
use crate::capsule::tags::touches_file;
use crate::capsule::types::{truncate_preview, Capsule};
use crate::error::Result;
use crate::sources::{GitLog, RepoRegistry};

// ── Public types ──────────────────────────────────────────────────────────────

pub const DEFAULT_LIMIT: usize = 20;

/// Commits requested from git per repository.
pub const DEFAULT_GIT_COMMIT_LIMIT: usize = 50;

/// Shortest commit prefix accepted when matching abbreviated SHAs.
const MIN_SHA_PREFIX: usize = 7;

/// Recall request. Every field is optional; an empty query returns the most
/// recent capsules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallQuery {
    /// File paths being worked on.
    pub files: Vec<String>,
    pub tags: Vec<String>,
    /// Case-insensitive substring over question, choice, and rationale.
    pub text: Option<String>,
    pub repo: Option<String>,
    pub limit: Option<usize>,
}

impl RecallQuery {
    fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn files(&self) -> Vec<&str> {
        self.files
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect()
    }

    fn tags(&self) -> Vec<&str> {
        self.tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn has_content_filters(&self) -> bool {
        !self.files().is_empty() || !self.tags().is_empty() || self.text().is_some()
    }

    fn repo(&self) -> Option<&str> {
        self.repo.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

/// Match strength, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExactFile,
    GitCorrelation,
    Tag,
    Text,
    Repo,
    Recent,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactFile => "file",
            Self::GitCorrelation => "git",
            Self::Tag => "tag",
            Self::Text => "text",
            Self::Repo => "repo",
            Self::Recent => "recent",
        }
    }

    /// File and git matches get full detail in rendered context.
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::ExactFile | Self::GitCorrelation)
    }
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    pub tier: MatchTier,
    pub capsule: Capsule,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallResult {
    pub hits: Vec<RecallHit>,
    /// Matches before truncation to the limit.
    pub total_matched: usize,
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Query planner over a [`CapsuleStore`].
#[derive(Clone)]
pub struct RecallEngine {
    store: CapsuleStore,
    repos: Option<Arc<dyn RepoRegistry>>,
    git: Option<Arc<dyn GitLog>>,
    default_limit: usize,
    git_commit_limit: usize,
}

impl RecallEngine {
    pub fn new(store: CapsuleStore) -> Self {
        Self {
            store,
            repos: None,
            git: None,
            default_limit: DEFAULT_LIMIT,
            git_commit_limit: DEFAULT_GIT_COMMIT_LIMIT,
        }
    }

    /// Enable commit correlation.
    pub fn with_git(mut self, repos: Arc<dyn RepoRegistry>, git: Arc<dyn GitLog>) -> Self {
        self.repos = Some(repos);
        self.git = Some(git);
        self
    }

    pub fn with_limits(mut self, default_limit: usize, git_commit_limit: usize) -> Self {
        self.default_limit = default_limit.max(1);
        self.git_commit_limit = git_commit_limit.max(1);
        self
    }

    pub fn store(&self) -> &CapsuleStore {
        &self.store
    }

    /// Run every applicable strategy and merge by best tier.
    pub fn query(&self, q: &RecallQuery) -> Result<RecallResult> {
        let limit = q.limit.filter(|l| *l > 0).unwrap_or(self.default_limit);

        // 1. Candidate set: active, latest phase only
        let candidates = self.store.list(&ListFilter::default())?;

        // 2. Zero-argument default
        if !q.has_content_filters() && q.repo().is_none() {
            return Ok(truncate(tag_all(by_recent(candidates), MatchTier::Recent), limit));
        }

        // 3. Repo alone lists the repo's capsules
        if !q.has_content_filters() {
            let repo_capsules = self.repo_candidates(q.repo())?;
            return Ok(truncate(tag_all(repo_capsules, MatchTier::Repo), limit));
        }

        // 4. Content strategies
        let mut best: HashMap<String, RecallHit> = HashMap::new();
        let files = q.files();
        if !files.is_empty() {
            let scoped = match q.repo() {
                Some(_) => self.repo_candidates(q.repo())?,
                None => candidates.clone(),
            };
            merge(&mut best, by_files(&scoped, &files), MatchTier::ExactFile);
            merge(
                &mut best,
                self.by_git_history(&candidates, &files, q.repo()),
                MatchTier::GitCorrelation,
            );
        }
        let tags = q.tags();
        if !tags.is_empty() {
            merge(&mut best, self.by_tags(&candidates, &tags), MatchTier::Tag);
        }
        if let Some(text) = q.text() {
            merge(&mut best, by_text(&candidates, text), MatchTier::Text);
        }

        // 5. Rank: tier, then newest first
        let mut hits: Vec<RecallHit> = best.into_values().collect();
        hits.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| b.capsule.created_at.cmp(&a.capsule.created_at))
                .then_with(|| a.capsule.id.cmp(&b.capsule.id))
        });
        tracing::debug!(matched = hits.len(), limit, "recall merged");
        Ok(truncate(hits, limit))
    }

    fn repo_candidates(&self, repo: Option<&str>) -> Result<Vec<Capsule>> {
        self.store.list(&ListFilter {
            repo: repo.map(String::from),
            ..ListFilter::default()
        })
    }

    /// Capsules carrying a tag that matches any query tag, synonyms included.
    pub fn by_tags(&self, candidates: &[Capsule], tags: &[&str]) -> Vec<Capsule> {
        let classifier = self.store.classifier();
        candidates
            .iter()
            .filter(|c| {
                tags.iter()
                    .any(|t| classifier.matches_tag_query_with_synonyms(&c.tags, t))
            })
            .cloned()
            .collect()
    }

    /// Capsules linked to recent commits that touched `files`.
    ///
    /// Registry and git failures are logged and skipped.
    pub fn by_git_history(
        &self,
        candidates: &[Capsule],
        files: &[&str],
        repo: Option<&str>,
    ) -> Vec<Capsule> {
        let (Some(registry), Some(git)) = (self.repos.as_deref(), self.git.as_deref()) else {
            return Vec::new();
        };
        let repos: BTreeSet<String> = match repo {
            Some(r) => BTreeSet::from([r.to_string()]),
            None => candidates.iter().flat_map(|c| c.repos.iter().cloned()).collect(),
        };
        let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();

        let mut shas: Vec<String> = Vec::new();
        for repo_id in &repos {
            let path = match registry.repo_path(repo_id) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(repo = %repo_id, error = %e, "skipping git correlation");
                    continue;
                }
            };
            match git.recent_commits(&path, &files, self.git_commit_limit) {
                Ok(found) => shas.extend(found),
                Err(e) => tracing::warn!(repo = %repo_id, error = %e, "git log failed"),
            }
        }
        if shas.is_empty() {
            return Vec::new();
        }
        candidates
            .iter()
            .filter(|c| c.commits.iter().any(|mine| shas.iter().any(|s| same_commit(mine, s))))
            .cloned()
            .collect()
    }
}

// ── Strategies ────────────────────────────────────────────────────────────────

/// Capsules with a `file:` tag matching any requested path.
pub fn by_files(candidates: &[Capsule], files: &[&str]) -> Vec<Capsule> {
    candidates
        .iter()
        .filter(|c| files.iter().any(|f| touches_file(&c.tags, f)))
        .cloned()
        .collect()
}

/// Case-insensitive substring match over question, choice and rationale.
pub fn by_text(candidates: &[Capsule], text: &str) -> Vec<Capsule> {
    let needle = text.to_lowercase();
    candidates
        .iter()
        .filter(|c| {
            c.question.to_lowercase().contains(&needle)
                || c.choice.to_lowercase().contains(&needle)
                || c.rationale.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Newest first.
pub fn by_recent(mut candidates: Vec<Capsule>) -> Vec<Capsule> {
    sort_newest_first(&mut candidates);
    candidates
}

fn same_commit(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.len() < MIN_SHA_PREFIX {
        return short == long;
    }
    long.to_ascii_lowercase()
        .starts_with(&short.to_ascii_lowercase())
}

fn merge(best: &mut HashMap<String, RecallHit>, matches: Vec<Capsule>, tier: MatchTier) {
    for capsule in matches {
        match best.get_mut(&capsule.id) {
            Some(hit) if hit.tier <= tier => {}
            Some(hit) => hit.tier = tier,
            None => {
                best.insert(capsule.id.clone(), RecallHit { tier, capsule });
            }
        }
    }
}

fn tag_all(capsules: Vec<Capsule>, tier: MatchTier) -> Vec<RecallHit> {
    capsules
        .into_iter()
        .map(|capsule| RecallHit { tier, capsule })
        .collect()
}

fn truncate(mut hits: Vec<RecallHit>, limit: usize) -> RecallResult {
    let total_matched = hits.len();
    hits.truncate(limit);
    RecallResult {
        hits,
        total_matched,
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Rough token count: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// One line per hit, for terminal output.
pub fn format_terminal(result: &RecallResult) -> String {
    if result.hits.is_empty() {
        return "No matching capsules.\n".to_string();
    }
    let mut out = format!(
        "{} of {} capsule(s):\n",
        result.hits.len(),
        result.total_matched
    );
    for hit in &result.hits {
        let c = &hit.capsule;
        out.push_str(&format!(
            "[{:<6}] {} ({})\n         {} -> {}\n",
            hit.tier,
            c.id,
            c.phase,
            truncate_preview(&c.question, 80),
            truncate_preview(&c.choice, 60)
        ));
    }
    out
}

/// Prompt context within `token_budget`.
///
/// Entries are appended greedily in rank order; strong matches get full
/// detail, the rest one line each. Rendering stops before the first entry
/// that would push [`estimate_tokens`] of the whole block over the budget.
pub fn format_context(result: &RecallResult, token_budget: usize) -> String {
    let mut out = String::new();
    let mut used_chars = 0usize;
    for hit in &result.hits {
        let entry = if hit.tier.is_strong() {
            detailed_entry(hit)
        } else {
            summary_entry(hit)
        };
        let chars = used_chars + entry.chars().count();
        if chars / 4 > token_budget {
            break;
        }
        used_chars = chars;
        out.push_str(&entry);
    }
    out
}

fn detailed_entry(hit: &RecallHit) -> String {
    let c = &hit.capsule;
    let mut entry = format!(
        "### {}\n- ID: {} ({}, {})\n- Choice: {}\n",
        c.question, c.id, c.phase, hit.tier, c.choice
    );
    if !c.rationale.is_empty() {
        entry.push_str(&format!("- Rationale: {}\n", c.rationale));
    }
    if !c.alternatives.is_empty() {
        entry.push_str(&format!("- Alternatives: {}\n", c.alternatives.join(", ")));
    }
    if !c.tags.is_empty() {
        entry.push_str(&format!("- Tags: {}\n", c.tags.join(", ")));
    }
    if !c.commits.is_empty() {
        entry.push_str(&format!("- Commits: {}\n", c.commits.join(", ")));
    }
    if let Some(ref learned) = c.learned {
        entry.push_str(&format!("- Learned: {learned}\n"));
    }
    entry.push('\n');
    entry
}

fn summary_entry(hit: &RecallHit) -> String {
    let c = &hit.capsule;
    format!(
        "- [{}] {} -> {} ({})\n",
        hit.tier,
        truncate_preview(&c.question, 100),
        truncate_preview(&c.choice, 80),
        c.id
    )
}
