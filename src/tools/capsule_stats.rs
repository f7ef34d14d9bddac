use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CapsuleStatsParams {
    #[schemars(description = "Optional session to limit statistics to")]
    pub session: Option<String>,
}
