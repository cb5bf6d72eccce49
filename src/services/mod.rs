pub(crate) mod canvas_preprocess;
pub(crate) mod image_labels;
pub(crate) mod letter_match;
pub(crate) mod parent_chat;
pub(crate) mod vision_ocr;
