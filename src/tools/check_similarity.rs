use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CheckSimilarityParams {
    #[schemars(description = "Question of the proposed capsule")]
    pub question: String,

    #[schemars(description = "Choice of the proposed capsule")]
    pub choice: String,

    #[schemars(description = "Only compare against this session's capsules")]
    pub session: Option<String>,
}
