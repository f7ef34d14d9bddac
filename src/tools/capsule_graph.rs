use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CapsuleGraphParams {
    #[schemars(description = "ID of the capsule to start from")]
    pub id: String,

    #[schemars(description = "Maximum hops from the root. Defaults to 2.")]
    pub depth: Option<usize>,

    #[schemars(
        description = "'up' (what led to this), 'down' (what this led to) or 'both' (default)"
    )]
    pub direction: Option<String>,
}
