//! Core capsule type definitions.
//!
//! Defines [`CapsuleType`], [`Status`], [`Origin`], [`Confirmation`], the
//! append-only [`Challenge`] history entry, the [`PhaseOrder`] precedence
//! table, and [`Capsule`] itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters of the question digest kept in a capsule ID.
const ID_HASH_LEN: usize = 12;

/// Canonical phase order, earliest first.
pub const CANONICAL_PHASES: [&str; 8] = [
    "ask",
    "investigate",
    "plan",
    "review",
    "execute",
    "verify",
    "simplify",
    "record",
];

/// Derive a capsule ID from `(session, phase, question)`.
///
/// Pure and deterministic: recording the same question in the same phase of the
/// same session always yields the same ID, so re-recording is an upsert.
pub fn generate_id(session_id: &str, phase: &str, question: &str) -> String {
    let digest = Sha256::digest(question.trim().as_bytes());
    let hash = hex::encode(digest);
    format!("{session_id}-{phase}-{}", &hash[..ID_HASH_LEN])
}

/// Whether a capsule records a choice between alternatives or an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapsuleType {
    /// A choice made between one or more recorded alternatives.
    #[default]
    Decision,
    /// An observation with no alternatives.
    Finding,
}

impl CapsuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Finding => "finding",
        }
    }
}

impl std::fmt::Display for CapsuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapsuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decision" => Ok(Self::Decision),
            "finding" => Ok(Self::Finding),
            other => Err(format!("unknown capsule type: {other}")),
        }
    }
}

/// Lifecycle status. Active capsules carry no status line on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Active,
    Invalidated,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Invalidated => "invalidated",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "active" => Ok(Self::Active),
            "invalidated" => Ok(Self::Invalidated),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Who produced the capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Human,
    #[default]
    Agent,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "agent" => Ok(Self::Agent),
            other => Err(format!("unknown origin: {other}")),
        }
    }
}

/// How the capsule was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// A human explicitly approved the record.
    Explicit,
    /// Recorded without an explicit approval step.
    Implicit,
}

impl Confirmation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
        }
    }
}

impl std::fmt::Display for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Confirmation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explicit" => Ok(Self::Explicit),
            "implicit" => Ok(Self::Implicit),
            other => Err(format!("unknown confirmation: {other}")),
        }
    }
}

/// One dispute or invalidation event in a capsule's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned: Option<String>,
    pub resolution: String,
}

/// Phase precedence table used for section ordering and dedup-to-latest-phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOrder {
    phases: Vec<String>,
}

impl PhaseOrder {
    pub fn new<I, S>(phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phases: phases.into_iter().map(Into::into).collect(),
        }
    }

    /// Rank of a phase. Known phases rank `1..=n` in order; unknown phases rank 0.
    pub fn rank(&self, phase: &str) -> usize {
        self.position(phase).map(|i| i + 1).unwrap_or(0)
    }

    /// Index of a known phase in the canonical order.
    pub fn position(&self, phase: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.eq_ignore_ascii_case(phase))
    }

    pub fn is_known(&self, phase: &str) -> bool {
        self.position(phase).is_some()
    }

    pub fn phases(&self) -> &[String] {
        &self.phases
    }
}

impl Default for PhaseOrder {
    fn default() -> Self {
        Self::new(CANONICAL_PHASES)
    }
}

/// A recorded decision or finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    /// Content-derived ID, see [`generate_id`].
    pub id: String,
    pub session_id: String,
    pub phase: String,
    #[serde(rename = "type")]
    pub kind: CapsuleType,
    pub status: Status,
    pub question: String,
    pub choice: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub commits: Vec<String>,
    /// The prior capsule that unlocked this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_by: Option<String>,
    /// Inverse of `enabled_by` across all capsules.
    #[serde(default)]
    pub enables: Vec<String>,
    #[serde(default)]
    pub constrains: Vec<String>,
    #[serde(default)]
    pub supersedes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned: Option<String>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    /// A `Challenges` line that did not parse, kept verbatim so rewrites do
    /// not drop it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unparsed_challenges: Option<String>,
}

impl Capsule {
    /// A new active capsule stamped with the current time.
    ///
    /// The type is `decision`; switch to [`CapsuleType::Finding`] for
    /// observations with no alternatives.
    pub fn new(session_id: &str, phase: &str, question: &str, choice: &str) -> Self {
        Self {
            id: generate_id(session_id, phase, question),
            session_id: session_id.to_string(),
            phase: phase.to_string(),
            kind: CapsuleType::Decision,
            status: Status::Active,
            question: question.to_string(),
            choice: choice.to_string(),
            rationale: String::new(),
            alternatives: Vec::new(),
            tags: Vec::new(),
            repos: Vec::new(),
            commits: Vec::new(),
            enabled_by: None,
            enables: Vec::new(),
            constrains: Vec::new(),
            supersedes: Vec::new(),
            superseded_by: None,
            origin: Origin::Agent,
            confirmation: None,
            created_at: Some(Utc::now()),
            invalidated_at: None,
            invalidation_reason: None,
            learned: None,
            challenges: Vec::new(),
            unparsed_challenges: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Check the model invariants that can be verified on a single record.
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question must not be empty".into());
        }
        if self.phase.trim().is_empty() {
            return Err("phase must not be empty".into());
        }
        if self.phase.contains(['\n', '\r']) || self.phase.trim() != self.phase {
            return Err("phase must be a single line without surrounding whitespace".into());
        }
        if self.status == Status::Invalidated && self.invalidation_reason.is_none() {
            return Err("invalidated capsule must carry an invalidation reason".into());
        }
        if !self.alternatives.is_empty() && self.kind != CapsuleType::Decision {
            return Err("a capsule with alternatives must be a decision".into());
        }
        if self.superseded_by.as_deref() == Some(self.id.as_str())
            || self.supersedes.iter().any(|s| s == &self.id)
        {
            return Err("a capsule cannot supersede itself".into());
        }
        Ok(())
    }

    /// First 80 characters of the question, for compact listings.
    pub fn preview(&self) -> String {
        truncate_preview(&self.question, 80)
    }
}

/// Truncate content to `max_chars`, appending "..." if truncated.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_id_is_deterministic() {
        let a = generate_id("s1", "plan", "Which database?");
        let b = generate_id("s1", "plan", "Which database?");
        assert_eq!(a, b);
        assert!(a.starts_with("s1-plan-"));
        assert_eq!(a.len(), "s1-plan-".len() + ID_HASH_LEN);
    }

    #[test]
    fn generate_id_changes_with_inputs() {
        let base = generate_id("s1", "plan", "Which database?");
        assert_ne!(base, generate_id("s1", "plan", "Which cache?"));
        assert_ne!(base, generate_id("s1", "execute", "Which database?"));
        assert_ne!(base, generate_id("s2", "plan", "Which database?"));
    }

    #[test]
    fn phase_rank_orders_canonical_phases() {
        let order = PhaseOrder::default();
        assert!(order.rank("ask") < order.rank("investigate"));
        assert!(order.rank("investigate") < order.rank("plan"));
        assert!(order.rank("verify") < order.rank("record"));
        assert_eq!(order.rank("brainstorm"), 0);
        assert_eq!(order.rank("PLAN"), order.rank("plan"));
    }

    #[test]
    fn custom_phase_order() {
        let order = PhaseOrder::new(["draft", "final"]);
        assert_eq!(order.rank("draft"), 1);
        assert_eq!(order.rank("final"), 2);
        assert_eq!(order.rank("plan"), 0);
    }

    #[test]
    fn validate_rejects_invalidated_without_reason() {
        let mut c = Capsule::new("s1", "plan", "Q?", "A");
        c.status = Status::Invalidated;
        assert!(c.validate().unwrap_err().contains("invalidation reason"));
        c.invalidation_reason = Some("wrong".into());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validate_rejects_finding_with_alternatives() {
        let mut c = Capsule::new("s1", "plan", "Q?", "A");
        c.kind = CapsuleType::Finding;
        c.alternatives = vec!["B".into()];
        assert!(c.validate().unwrap_err().contains("must be a decision"));
    }

    #[test]
    fn validate_rejects_self_supersession() {
        let mut c = Capsule::new("s1", "plan", "Q?", "A");
        c.supersedes = vec![c.id.clone()];
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_unusable_phase() {
        for phase in ["", " ", "plan\nexecute", " plan"] {
            let c = Capsule::new("s1", phase, "Q?", "A");
            assert!(c.validate().unwrap_err().contains("phase"), "phase {phase:?}");
        }
        assert!(Capsule::new("s1", "brainstorm", "Q?", "A").validate().is_ok());
    }

    #[test]
    fn parse_enums() {
        assert_eq!("Decision".parse::<CapsuleType>().unwrap(), CapsuleType::Decision);
        assert_eq!("finding".parse::<CapsuleType>().unwrap(), CapsuleType::Finding);
        assert_eq!("".parse::<Status>().unwrap(), Status::Active);
        assert_eq!("invalidated".parse::<Status>().unwrap(), Status::Invalidated);
        assert_eq!("human".parse::<Origin>().unwrap(), Origin::Human);
        assert_eq!("implicit".parse::<Confirmation>().unwrap(), Confirmation::Implicit);
        assert!("maybe".parse::<Status>().is_err());
    }

    #[test]
    fn truncate_preview_handles_multibyte() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("héllo wörld", 5), "héllo...");
    }
}
