use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::letter_match::MatchResult;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AlphabetMasteryRequest {
    #[serde(default)]
    pub(crate) canvas_input: String,
    #[serde(default)]
    #[validate(length(max = 16, message = "expected_letter is too long"))]
    pub(crate) expected_letter: String,
    #[serde(default)]
    pub(crate) is_capital: String,
    #[serde(default)]
    pub(crate) level: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AlphabetMasteryResponse {
    pub(crate) status: &'static str,
    #[serde(flatten)]
    pub(crate) result: MatchResult,
}
