use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Provide exactly one of `id` or `session`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LinkCommitsParams {
    #[schemars(description = "Capsule to attach the commits to")]
    pub id: Option<String>,

    #[schemars(description = "Attach the commits to every active capsule of this session")]
    pub session: Option<String>,

    #[schemars(description = "Git commit SHAs")]
    pub commits: Vec<String>,
}
