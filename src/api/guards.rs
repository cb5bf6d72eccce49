use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::api::errors::ApiError;
use crate::core::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Passes when basic auth is disabled, or when the request carries the admin
/// username and password.
pub(crate) struct AdminBasicAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminBasicAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = state.settings().admin();
        if !admin.basic_auth_enabled {
            return Ok(AdminBasicAuth);
        }

        let (Some(expected_username), Some(expected_password)) =
            (admin.username.as_deref(), admin.password.as_deref())
        else {
            return Err(ApiError::Internal("Admin credentials not configured".to_string()));
        };

        let (username, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(decode_basic)
            .ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))?;

        let username_ok = digest(&username) == digest(expected_username);
        let password_ok = digest(&password) == digest(expected_password);
        if username_ok && password_ok {
            Ok(AdminBasicAuth)
        } else {
            tracing::warn!(uri = %parts.uri, "rejected basic auth credentials");
            Err(ApiError::Unauthorized(INVALID_CREDENTIALS))
        }
    }
}

fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}
