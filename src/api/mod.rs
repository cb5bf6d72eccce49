pub(crate) mod alphabet;
pub(crate) mod chat;
pub(crate) mod content;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod router;
