use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListTagsParams {
    #[schemars(description = "Only tags with this prefix: file, table, service, concept or api")]
    pub prefix: Option<String>,
}
