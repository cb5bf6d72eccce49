use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Myth;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LevelRequest {
    #[serde(default)]
    #[validate(length(max = 64, message = "level is too long"))]
    pub(crate) level: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MythBatchResponse {
    pub(crate) status: &'static str,
    pub(crate) count: usize,
    pub(crate) data: Vec<Myth>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageLabelingItem {
    pub(crate) image_id: i32,
    pub(crate) image_label: String,
    pub(crate) image_base64: String,
    pub(crate) options: Vec<String>,
    pub(crate) arpabet: String,
}
