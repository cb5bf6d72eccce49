pub(crate) mod content_cursors;
pub(crate) mod health;
pub(crate) mod pronunciations;
