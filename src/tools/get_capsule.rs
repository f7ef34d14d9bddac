use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetCapsuleParams {
    #[schemars(description = "ID of the capsule to fetch")]
    pub id: String,

    #[schemars(
        description = "If true, also resolve the capsules it supersedes and the one that superseded it"
    )]
    pub include_chain: Option<bool>,
}
