use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod alphabet;
pub(crate) mod chat;
pub(crate) mod content;

pub(crate) const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
}

/// `{"status": "success", "data": ...}`
#[derive(Debug, Serialize)]
pub(crate) struct DataEnvelope<T> {
    pub(crate) status: &'static str,
    pub(crate) data: T,
}

impl<T> DataEnvelope<T> {
    pub(crate) fn success(data: T) -> Self {
        Self { status: STATUS_SUCCESS, data }
    }
}
