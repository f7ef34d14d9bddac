//! MCP `recall_capsules` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recall_capsules` MCP tool.
///
/// With no filters at all, the most recent capsules are returned.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct RecallCapsulesParams {
    #[schemars(description = "File paths being worked on. Strongest signal after git history.")]
    pub files: Option<Vec<String>>,

    #[schemars(description = "Tag queries, synonym-aware")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Case-insensitive text to find in question, choice or rationale")]
    pub text: Option<String>,

    #[schemars(description = "Repository ID. On its own, lists that repo's capsules.")]
    pub repo: Option<String>,

    #[schemars(description = "Maximum number of results. Defaults to 20.")]
    pub limit: Option<usize>,

    #[schemars(
        description = "'json' (default) for structured hits, or 'context' for budgeted markdown"
    )]
    pub format: Option<String>,

    #[schemars(description = "Token budget for 'context' format. Defaults to 4000.")]
    pub token_budget: Option<usize>,
}
