//! MCP `list_capsules` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `list_capsules` MCP tool. Every filter is optional and
/// they compose with AND.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListCapsulesParams {
    #[schemars(description = "Only capsules from this session")]
    pub session: Option<String>,

    #[schemars(description = "Only capsules for this repository ID")]
    pub repo: Option<String>,

    #[schemars(description = "Only capsules recorded in this phase")]
    pub phase: Option<String>,

    #[schemars(description = "Tag query, e.g. 'auth' or 'file:src/auth'. Synonyms are expanded.")]
    pub tag: Option<String>,

    #[schemars(description = "Only capsules tagged with this file or a directory containing it")]
    pub file_path: Option<String>,

    #[schemars(description = "Filter by status: 'active' or 'invalidated'")]
    pub status: Option<String>,

    #[schemars(description = "Filter by type: 'decision' or 'finding'")]
    pub r#type: Option<String>,

    #[schemars(description = "Include invalidated capsules. Defaults to false.")]
    pub include_invalidated: Option<bool>,

    #[schemars(
        description = "Show every phase revision of a question instead of only the latest. Defaults to false."
    )]
    pub show_evolution: Option<bool>,

    #[schemars(description = "Maximum number of capsules to return. Defaults to 50.")]
    pub limit: Option<usize>,
}
