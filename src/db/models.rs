use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Sentence {
    pub(crate) sentence_id: i32,
    pub(crate) original_sentence: String,
    pub(crate) jumbled_sentence: String,
    pub(crate) difficulty_level: String,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct LabeledImage {
    pub(crate) image_id: i32,
    pub(crate) image_byte: Vec<u8>,
    pub(crate) image_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Myth {
    pub(crate) id: i32,
    pub(crate) myth: String,
    pub(crate) truth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ReadingPassage {
    pub(crate) id: i32,
    pub(crate) text: String,
    pub(crate) level: String,
    pub(crate) word_count: Option<i32>,
}
