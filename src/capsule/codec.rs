//! Consolidated session file codec.
//!
//! A session file is YAML front matter followed by a markdown body:
//!
//! ```text
//! ---
//! session: <id>
//! type: capsules
//! ---
//!
//! # Decision Capsules
//!
//! **Session:** [[<id>]]
//!
//! ## <phase>
//!
//! ### Decision: <question>
//! - **ID:** <id>
//! - **Choice:** <choice>
//! ```
//!
//! Field lines are optional and order-independent. [`encode_session`] and
//! [`decode_session`] are inverses for any capsule set whose text fields are
//! single-line.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::capsule::types::{generate_id, Capsule, CapsuleType, Challenge, PhaseOrder, Status};

const FRONT_MATTER_DELIMITER: &str = "---";
const FILE_TYPE: &str = "capsules";

static PHASE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+(\S.*?)\s*$").expect("static regex: phase heading"));

static CAPSULE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^###\s+(?:Decision|Finding):\s*(.*?)\s*$").expect("static regex: capsule heading")
});

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-*]\s+\*\*([A-Za-z]+):\*\*\s?(.*?)\s*$").expect("static regex: field line")
});

#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    session: String,
    #[serde(rename = "type", default)]
    file_type: Option<String>,
}

/// Decoded contents of one consolidated session file.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDocument {
    pub session_id: String,
    pub capsules: Vec<Capsule>,
}

/// Serialize a session's capsules, grouped by phase.
///
/// Known phases come first in canonical order; custom phases follow in order of
/// first appearance. Within a phase, capsules keep their input order.
pub fn encode_session(session_id: &str, capsules: &[Capsule], phases: &PhaseOrder) -> String {
    let mut out = String::new();
    out.push_str(FRONT_MATTER_DELIMITER);
    out.push('\n');
    out.push_str(&format!("session: {}\n", yaml_scalar(session_id)));
    out.push_str(&format!("type: {FILE_TYPE}\n"));
    out.push_str(FRONT_MATTER_DELIMITER);
    out.push_str("\n\n# Decision Capsules\n\n");
    out.push_str(&format!("**Session:** [[{session_id}]]\n"));

    for phase in phase_sections(capsules, phases) {
        out.push_str(&format!("\n## {}\n", one_line(&phase)));
        for capsule in capsules.iter().filter(|c| c.phase == phase) {
            out.push('\n');
            encode_capsule(&mut out, capsule);
        }
    }
    out
}

/// Phase names present in `capsules`, in file order.
fn phase_sections(capsules: &[Capsule], phases: &PhaseOrder) -> Vec<String> {
    let mut known: Vec<(usize, String)> = Vec::new();
    let mut custom: Vec<String> = Vec::new();
    for capsule in capsules {
        match phases.position(&capsule.phase) {
            Some(pos) => {
                if !known.iter().any(|(_, p)| p == &capsule.phase) {
                    known.push((pos, capsule.phase.clone()));
                }
            }
            None => {
                if !custom.contains(&capsule.phase) {
                    custom.push(capsule.phase.clone());
                }
            }
        }
    }
    known.sort_by_key(|(pos, _)| *pos);
    known.into_iter().map(|(_, p)| p).chain(custom).collect()
}

fn encode_capsule(out: &mut String, c: &Capsule) {
    out.push_str(&format!("### Decision: {}\n", one_line(&c.question)));
    field(out, "ID", &c.id);
    field(out, "Choice", &c.choice);
    list_field(out, "Alternatives", &c.alternatives);
    field(out, "Rationale", &c.rationale);
    field(out, "Origin", c.origin.as_str());
    if let Some(confirmation) = c.confirmation {
        field(out, "Confirmation", confirmation.as_str());
    }
    if c.status == Status::Invalidated {
        field(out, "Status", c.status.as_str());
    }
    field(out, "Type", c.kind.as_str());
    list_field(out, "Tags", &c.tags);
    if let Some(ts) = c.created_at {
        field(out, "CreatedAt", &ts.to_rfc3339());
    }
    if let Some(ts) = c.invalidated_at {
        field(out, "InvalidatedAt", &ts.to_rfc3339());
    }
    list_field(out, "Repos", &c.repos);
    list_field(out, "Commits", &c.commits);
    if let Some(ref parent) = c.enabled_by {
        field(out, "EnabledBy", parent);
    }
    list_field(out, "Enables", &c.enables);
    list_field(out, "Constrains", &c.constrains);
    if let Some(ref newer) = c.superseded_by {
        field(out, "SupersededBy", newer);
    }
    list_field(out, "Supersedes", &c.supersedes);
    if let Some(ref reason) = c.invalidation_reason {
        field(out, "InvalidationReason", reason);
    }
    if let Some(ref learned) = c.learned {
        field(out, "Learned", learned);
    }
    if !c.challenges.is_empty() {
        // Challenge entries are structured; one JSON line keeps them inside the field grammar.
        if let Ok(json) = serde_json::to_string(&c.challenges) {
            field(out, "Challenges", &json);
        }
    }
    if let Some(ref raw) = c.unparsed_challenges {
        field(out, "UnparsedChallenges", raw);
    }
}

fn field(out: &mut String, name: &str, value: &str) {
    let value = one_line(value);
    if value.is_empty() {
        return;
    }
    out.push_str(&format!("- **{name}:** {value}\n"));
}

fn list_field(out: &mut String, name: &str, values: &[String]) {
    let joined = values
        .iter()
        .map(|v| one_line(v))
        .filter(|v| !v.is_empty())
        .map(|v| escape_list_item(&v))
        .collect::<Vec<_>>()
        .join(", ");
    field(out, name, &joined);
}

/// Backslash-escape `\` and `,` so an item survives [`split_list`].
fn escape_list_item(item: &str) -> String {
    item.replace('\\', "\\\\").replace(',', "\\,")
}

/// Collapse line breaks so a value stays on its field line.
fn one_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn yaml_scalar(value: &str) -> String {
    serde_yaml_ng::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{value:?}"))
}

/// Parse a consolidated session file.
///
/// Fails only when the front matter is missing or unparseable. Unknown field
/// lines are ignored; a missing ID is regenerated from (session, phase,
/// question); a missing type is inferred from the alternatives.
pub fn decode_session(content: &str) -> Result<SessionDocument, String> {
    let (front, body) = split_front_matter(content)?;
    let front: FrontMatter =
        serde_yaml_ng::from_str(front).map_err(|e| format!("invalid YAML front matter: {e}"))?;
    if front.session.trim().is_empty() {
        return Err("front matter has an empty session".into());
    }
    if let Some(ref t) = front.file_type {
        if t != FILE_TYPE {
            return Err(format!("unexpected file type: {t}"));
        }
    }
    let session_id = front.session.trim().to_string();

    let mut capsules = Vec::new();
    let mut phase: Option<String> = None;
    let mut current: Option<Draft> = None;

    for line in body.lines() {
        let line = line.trim_end();
        if let Some(caps) = CAPSULE_HEADING.captures(line) {
            if let Some(draft) = current.take() {
                capsules.push(draft.finish(&session_id));
            }
            current = Some(Draft::new(
                phase.clone().unwrap_or_else(|| "unknown".to_string()),
                caps[1].to_string(),
            ));
        } else if let Some(caps) = PHASE_HEADING.captures(line) {
            if let Some(draft) = current.take() {
                capsules.push(draft.finish(&session_id));
            }
            phase = Some(caps[1].to_string());
        } else if let Some(caps) = FIELD_LINE.captures(line) {
            if let Some(ref mut draft) = current {
                draft.set(&caps[1], &caps[2]);
            }
        }
    }
    if let Some(draft) = current.take() {
        capsules.push(draft.finish(&session_id));
    }

    Ok(SessionDocument {
        session_id,
        capsules,
    })
}

fn split_front_matter(content: &str) -> Result<(&str, &str), String> {
    let content = content.trim_start_matches('\u{feff}').trim_start();
    let rest = content
        .strip_prefix(FRONT_MATTER_DELIMITER)
        .ok_or_else(|| "missing front matter".to_string())?;
    let rest = rest.trim_start_matches(['\r', '\n']);
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            return Ok((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err("front matter missing closing delimiter".into())
}

/// A capsule under construction while its field lines are read.
struct Draft {
    capsule: Capsule,
    has_id: bool,
    has_type: bool,
    bad_challenges: Option<String>,
}

impl Draft {
    fn new(phase: String, question: String) -> Self {
        let mut capsule = Capsule::new("", &phase, &question, "");
        capsule.created_at = None;
        Self {
            capsule,
            has_id: false,
            has_type: false,
            bad_challenges: None,
        }
    }

    fn set(&mut self, name: &str, value: &str) {
        let c = &mut self.capsule;
        let value = value.trim();
        match name {
            "ID" => {
                if !value.is_empty() {
                    c.id = value.to_string();
                    self.has_id = true;
                }
            }
            "Choice" => c.choice = value.to_string(),
            "Alternatives" => c.alternatives = split_list(value),
            "Rationale" => c.rationale = value.to_string(),
            "Origin" => {
                if let Ok(origin) = value.parse() {
                    c.origin = origin;
                }
            }
            "Confirmation" => c.confirmation = value.parse().ok(),
            "Status" => c.status = value.parse().unwrap_or(Status::Active),
            "Type" => {
                if let Ok(kind) = value.parse() {
                    c.kind = kind;
                    self.has_type = true;
                }
            }
            "Tags" => c.tags = split_list(value),
            "CreatedAt" => c.created_at = parse_time(value),
            "InvalidatedAt" => c.invalidated_at = parse_time(value),
            "Repos" => c.repos = split_list(value),
            "Commits" => c.commits = split_list(value),
            "EnabledBy" => c.enabled_by = non_empty(value),
            "Enables" => c.enables = split_list(value),
            "Constrains" => c.constrains = split_list(value),
            "SupersededBy" => c.superseded_by = non_empty(value),
            "Supersedes" => c.supersedes = split_list(value),
            "InvalidationReason" => c.invalidation_reason = non_empty(value),
            "Learned" => c.learned = non_empty(value),
            "Challenges" => match serde_json::from_str::<Vec<Challenge>>(value) {
                Ok(challenges) => c.challenges = challenges,
                Err(e) => {
                    tracing::trace!(error = %e, "challenge history did not parse");
                    self.bad_challenges = non_empty(value);
                }
            },
            "UnparsedChallenges" => c.unparsed_challenges = non_empty(value),
            other => tracing::trace!(field = other, "ignoring unknown capsule field"),
        }
    }

    fn finish(self, session_id: &str) -> Capsule {
        let mut capsule = self.capsule;
        capsule.session_id = session_id.to_string();
        if !self.has_id {
            capsule.id = generate_id(session_id, &capsule.phase, &capsule.question);
        }
        if let Some(raw) = self.bad_challenges {
            tracing::warn!(
                id = %capsule.id,
                session = session_id,
                "unparseable challenge history kept verbatim"
            );
            capsule.unparsed_challenges = Some(match capsule.unparsed_challenges.take() {
                Some(earlier) => format!("{earlier} {raw}"),
                None => raw,
            });
        }
        if !self.has_type {
            capsule.kind = if capsule.alternatives.is_empty() {
                CapsuleType::Finding
            } else {
                CapsuleType::Decision
            };
        }
        capsule
    }
}

/// Split a comma-separated field, honouring `\,` and `\\` escapes.
fn split_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut item = String::new();
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next @ (',' | '\\')) => item.push(next),
                Some(other) => {
                    item.push('\\');
                    item.push(other);
                }
                None => item.push('\\'),
            },
            ',' => items.push(std::mem::take(&mut item)),
            _ => item.push(ch),
        }
    }
    items.push(item);
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
