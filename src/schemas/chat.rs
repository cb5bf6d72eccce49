use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ParentChatRequest {
    #[serde(default)]
    #[validate(length(max = 2000, message = "question must be at most 2000 characters"))]
    pub(crate) question: String,
    #[serde(default)]
    #[validate(length(max = 8000, message = "kb_hit must be at most 8000 characters"))]
    pub(crate) kb_hit: Option<String>,
}
