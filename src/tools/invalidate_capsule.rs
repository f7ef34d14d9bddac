use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateCapsuleParams {
    #[schemars(description = "ID of the capsule to invalidate")]
    pub id: String,

    #[schemars(description = "Why the capsule no longer holds")]
    pub reason: String,

    #[schemars(description = "What was learned from getting it wrong")]
    pub learned: Option<String>,

    #[schemars(description = "ID of the capsule that replaces this one")]
    pub superseded_by: Option<String>,
}
