//! MCP `store_capsule` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `store_capsule` MCP tool.
///
/// Re-storing the same question in the same phase and session replaces the
/// existing capsule.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreCapsuleParams {
    #[schemars(description = "Work session this capsule belongs to")]
    pub session: String,

    #[schemars(
        description = "Phase: ask, investigate, plan, review, execute, verify, simplify, record (custom phases allowed)"
    )]
    pub phase: String,

    #[schemars(description = "The question being decided or investigated")]
    pub question: String,

    #[schemars(description = "The choice made, or the observation for a finding")]
    pub choice: String,

    #[schemars(description = "Why this choice was made")]
    pub rationale: Option<String>,

    #[schemars(description = "Alternatives that were considered. Only valid for decisions.")]
    pub alternatives: Option<Vec<String>>,

    #[schemars(
        description = "Tags. Unprefixed tags get file:, table:, service:, api: or concept: inferred."
    )]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Repository IDs this capsule applies to")]
    pub repos: Option<Vec<String>>,

    #[schemars(description = "Capsule type: 'decision' (default) or 'finding'")]
    pub r#type: Option<String>,

    #[schemars(description = "Who produced it: 'human' or 'agent' (default)")]
    pub origin: Option<String>,

    #[schemars(description = "Confirmation: 'explicit' or 'implicit'")]
    pub confirmation: Option<String>,

    #[schemars(description = "ID of the capsule that made this one possible")]
    pub enabled_by: Option<String>,

    #[schemars(description = "IDs of capsules this one constrains")]
    pub constrains: Option<Vec<String>>,

    #[schemars(
        description = "IDs of capsules this one replaces. Their superseded_by will be set to the new ID."
    )]
    pub supersedes: Option<Vec<String>>,

    #[schemars(
        description = "If true (default), report similar or contradicting capsules alongside the result"
    )]
    pub check_similarity: Option<bool>,
}
