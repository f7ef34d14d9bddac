//! Lexical duplicate and contradiction detection.
//!
//! Pairwise and synchronous: every check is a linear scan over the candidate
//! capsules using keyword-set Jaccard similarity. No index, no embeddings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::capsule::types::Capsule;

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by", "can",
    "could", "did", "do", "does", "each", "for", "from", "had", "has", "have", "how", "if", "in",
    "into", "is", "it", "its", "more", "most", "not", "of", "on", "or", "our", "per", "should",
    "so", "some", "such", "than", "that", "the", "their", "then", "there", "these", "they",
    "this", "those", "to", "us", "use", "used", "using", "via", "vs", "was", "we", "were", "what",
    "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Similarity cut-offs. All values are Jaccard scores in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Question similarity at which a capsule counts as a duplicate.
    pub duplicate: f64,
    /// Duplicate similarity at which confidence becomes high.
    pub high_confidence: f64,
    /// Minimum question similarity for a contradiction.
    pub contradiction_question: f64,
    /// Choice similarity below which the answers disagree.
    pub contradiction_choice: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            duplicate: 0.6,
            high_confidence: 0.8,
            contradiction_question: 0.5,
            contradiction_choice: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Medium,
    High,
}

/// One existing capsule flagged against a proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMatch {
    pub id: String,
    pub question: String,
    pub choice: String,
    /// Question keyword similarity.
    pub similarity: f64,
    pub confidence: MatchConfidence,
    /// Normalized questions are identical.
    pub exact: bool,
}

/// What the caller should do with the proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestedAction {
    Create,
    DuplicateOf(String),
    Supersedes(String),
}

impl SuggestedAction {
    fn precedence(&self) -> u8 {
        match self {
            Self::Create => 0,
            Self::DuplicateOf(_) => 1,
            Self::Supersedes(_) => 2,
        }
    }
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::DuplicateOf(id) => write!(f, "duplicate_of:{id}"),
            Self::Supersedes(id) => write!(f, "supersedes:{id}"),
        }
    }
}

impl Serialize for SuggestedAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub similar: Vec<SimilarMatch>,
    pub contradicting: Vec<SimilarMatch>,
    pub suggested_action: SuggestedAction,
}

/// The question/choice pair being checked before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub question: String,
    pub choice: String,
}

impl Proposal {
    pub fn new(question: impl Into<String>, choice: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            choice: choice.into(),
        }
    }
}

impl From<&Capsule> for Proposal {
    fn from(c: &Capsule) -> Self {
        Self::new(c.question.clone(), c.choice.clone())
    }
}

/// Lowercase, replace punctuation with spaces, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `|A∩B| / |A∪B|`, or 0 when both sets are empty.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Keyword extraction and the duplicate/contradiction checks.
#[derive(Debug, Clone)]
pub struct SimilarityChecker {
    stop_words: HashSet<String>,
    thresholds: Thresholds,
}

impl Default for SimilarityChecker {
    fn default() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            thresholds: Thresholds::default(),
        }
    }
}

impl SimilarityChecker {
    pub fn new<I, S>(stop_words: I, thresholds: Thresholds) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stop_words: stop_words.into_iter().map(|s| s.into().to_lowercase()).collect(),
            thresholds,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Lowercased tokens longer than two characters that are not stop words.
    pub fn extract_keywords(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 2 && !self.stop_words.contains(*t))
            .map(str::to_string)
            .collect()
    }

    fn keyword_similarity(&self, a: &str, b: &str) -> f64 {
        jaccard_similarity(&self.extract_keywords(a), &self.extract_keywords(b))
    }

    fn confidence(&self, similarity: f64) -> MatchConfidence {
        if similarity >= self.thresholds.high_confidence {
            MatchConfidence::High
        } else {
            MatchConfidence::Medium
        }
    }

    /// Flag active capsules asking the same question as the proposal.
    pub fn fast_similarity_check(
        &self,
        existing: &[Capsule],
        proposed: &Proposal,
    ) -> Option<SimilarityResult> {
        let normalized = normalize_text(&proposed.question);
        let keywords = self.extract_keywords(&proposed.question);

        let mut similar = Vec::new();
        for capsule in existing.iter().filter(|c| c.is_active()) {
            let exact = !normalized.is_empty() && normalize_text(&capsule.question) == normalized;
            let (similarity, confidence) = if exact {
                (1.0, MatchConfidence::High)
            } else {
                let s = jaccard_similarity(&keywords, &self.extract_keywords(&capsule.question));
                if s < self.thresholds.duplicate {
                    continue;
                }
                (s, self.confidence(s))
            };
            similar.push(SimilarMatch {
                id: capsule.id.clone(),
                question: capsule.question.clone(),
                choice: capsule.choice.clone(),
                similarity,
                confidence,
                exact,
            });
        }
        if similar.is_empty() {
            return None;
        }
        sort_strongest_first(&mut similar);

        let suggested_action = similar
            .iter()
            .find(|m| m.confidence == MatchConfidence::High)
            .map_or(SuggestedAction::Create, |m| {
                SuggestedAction::DuplicateOf(m.id.clone())
            });
        Some(SimilarityResult {
            similar,
            contradicting: Vec::new(),
            suggested_action,
        })
    }

    /// Flag active capsules with the same question but a different answer.
    pub fn fast_contradiction_check(
        &self,
        active: &[Capsule],
        proposed: &Proposal,
    ) -> Option<SimilarityResult> {
        let question_keywords = self.extract_keywords(&proposed.question);
        let choice_keywords = self.extract_keywords(&proposed.choice);
        let normalized_choice = normalize_text(&proposed.choice);

        let mut contradicting = Vec::new();
        for capsule in active.iter().filter(|c| c.is_active()) {
            let q_sim =
                jaccard_similarity(&question_keywords, &self.extract_keywords(&capsule.question));
            if q_sim < self.thresholds.contradiction_question {
                continue;
            }
            if normalize_text(&capsule.choice) == normalized_choice {
                continue;
            }
            let c_sim = jaccard_similarity(&choice_keywords, &self.extract_keywords(&capsule.choice));
            if c_sim >= self.thresholds.contradiction_choice {
                continue;
            }
            contradicting.push(SimilarMatch {
                id: capsule.id.clone(),
                question: capsule.question.clone(),
                choice: capsule.choice.clone(),
                similarity: q_sim,
                confidence: self.confidence(q_sim),
                exact: false,
            });
        }
        if contradicting.is_empty() {
            return None;
        }
        sort_strongest_first(&mut contradicting);
        let suggested_action = SuggestedAction::Supersedes(contradicting[0].id.clone());
        Some(SimilarityResult {
            similar: Vec::new(),
            contradicting,
            suggested_action,
        })
    }

    /// Run both checks and merge them.
    pub fn check(&self, existing: &[Capsule], proposed: &Proposal) -> Option<SimilarityResult> {
        merge_similarity_results(
            self.fast_similarity_check(existing, proposed),
            self.fast_contradiction_check(existing, proposed),
        )
    }

    /// Similarity between two free-text strings, for callers outside the checks.
    pub fn text_similarity(&self, a: &str, b: &str) -> f64 {
        self.keyword_similarity(a, b)
    }
}

fn sort_strongest_first(matches: &mut [SimilarMatch]) {
    matches.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Concatenate two results. The stronger action wins:
/// supersede > duplicate > create.
pub fn merge_similarity_results(
    a: Option<SimilarityResult>,
    b: Option<SimilarityResult>,
) -> Option<SimilarityResult> {
    match (a, b) {
        (None, None) => None,
        (Some(r), None) | (None, Some(r)) => Some(r),
        (Some(mut a), Some(b)) => {
            a.similar.extend(b.similar);
            a.contradicting.extend(b.contradicting);
            if b.suggested_action.precedence() > a.suggested_action.precedence() {
                a.suggested_action = b.suggested_action;
            }
            Some(a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(session: &str, question: &str, choice: &str) -> Capsule {
        Capsule::new(session, "plan", question, choice)
    }

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn normalize_text_strips_punctuation() {
        assert_eq!(normalize_text("  Which   DB?! (Postgres) "), "which db postgres");
        assert_eq!(normalize_text("..."), "");
    }

    #[test]
    fn extract_keywords_drops_short_and_stop_words() {
        let checker = SimilarityChecker::default();
        let kw = checker.extract_keywords("Which DB should we use for the event-log?");
        assert_eq!(kw, set(&["event", "log"]));
    }

    #[test]
    fn jaccard_boundaries() {
        assert_eq!(jaccard_similarity(&set(&[]), &set(&[])), 0.0);
        assert_eq!(jaccard_similarity(&set(&["a"]), &set(&["a"])), 1.0);
        let a = set(&["x", "y"]);
        let b = set(&["y", "z"]);
        assert_eq!(jaccard_similarity(&a, &b), jaccard_similarity(&b, &a));
        assert!((jaccard_similarity(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn exact_question_is_high_confidence_duplicate() {
        let checker = SimilarityChecker::default();
        let existing = vec![active("s1", "Which message broker?", "Kafka")];
        let result = checker
            .fast_similarity_check(&existing, &Proposal::new("which message-broker", "NATS"))
            .unwrap();
        assert!(result.similar[0].exact);
        assert_eq!(result.similar[0].confidence, MatchConfidence::High);
        assert_eq!(
            result.suggested_action,
            SuggestedAction::DuplicateOf(existing[0].id.clone())
        );
    }

    #[test]
    fn medium_similarity_suggests_create() {
        let checker = SimilarityChecker::default();
        // {retry, policy, outbound, webhooks} vs {retry, policy, outbound, calls}
        let existing = vec![active("s1", "Retry policy for outbound webhooks", "exponential")];
        let result = checker
            .fast_similarity_check(&existing, &Proposal::new("Retry policy for outbound calls", "x"))
            .unwrap();
        assert_eq!(result.similar[0].confidence, MatchConfidence::Medium);
        assert_eq!(result.suggested_action, SuggestedAction::Create);
        assert_eq!(result.suggested_action.to_string(), "create");
    }

    #[test]
    fn unrelated_or_invalidated_is_ignored() {
        let checker = SimilarityChecker::default();
        let mut gone = active("s1", "Which message broker?", "Kafka");
        gone.status = crate::capsule::types::Status::Invalidated;
        gone.invalidation_reason = Some("moved".into());
        let existing = vec![gone, active("s1", "Logging format", "json")];
        assert!(checker
            .fast_similarity_check(&existing, &Proposal::new("Which message broker?", "NATS"))
            .is_none());
    }

    #[test]
    fn contradiction_scenario() {
        let checker = SimilarityChecker::default();
        let a = active("s1", "Which auth?", "JWT");
        let result = checker
            .fast_contradiction_check(
                std::slice::from_ref(&a),
                &Proposal::new("Which auth approach?", "Sessions"),
            )
            .unwrap();
        assert_eq!(result.contradicting.len(), 1);
        assert_eq!(result.suggested_action, SuggestedAction::Supersedes(a.id.clone()));
        assert_eq!(result.suggested_action.to_string(), format!("supersedes:{}", a.id));
    }

    #[test]
    fn same_answer_is_not_a_contradiction() {
        let checker = SimilarityChecker::default();
        let a = active("s1", "Which auth?", "JWT");
        assert!(checker
            .fast_contradiction_check(&[a], &Proposal::new("Which auth approach?", "jwt"))
            .is_none());
    }

    #[test]
    fn merge_prefers_supersede() {
        let dup = SimilarityResult {
            similar: vec![],
            contradicting: vec![],
            suggested_action: SuggestedAction::DuplicateOf("a".into()),
        };
        let sup = SimilarityResult {
            similar: vec![],
            contradicting: vec![],
            suggested_action: SuggestedAction::Supersedes("b".into()),
        };
        let merged = merge_similarity_results(Some(dup.clone()), Some(sup.clone())).unwrap();
        assert_eq!(merged.suggested_action, SuggestedAction::Supersedes("b".into()));
        let merged = merge_similarity_results(Some(sup), Some(dup)).unwrap();
        assert_eq!(merged.suggested_action, SuggestedAction::Supersedes("b".into()));
        assert!(merge_similarity_results(None, None).is_none());
    }

    #[test]
    fn custom_stop_words_and_thresholds() {
        let checker = SimilarityChecker::new(["queue"], Thresholds {
            duplicate: 0.3,
            ..Thresholds::default()
        });
        assert_eq!(checker.extract_keywords("which queue"), set(&["which"]));
        assert_eq!(checker.thresholds().duplicate, 0.3);
    }

    #[test]
    fn suggested_action_serializes_as_string() {
        let json = serde_json::to_string(&SuggestedAction::DuplicateOf("x".into())).unwrap();
        assert_eq!(json, "\"duplicate_of:x\"");
    }
}
