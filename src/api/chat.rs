use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::chat::ParentChatRequest;
use crate::schemas::DataEnvelope;
use crate::services::parent_chat::{ChatError, ParentAnswer};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/parent_chat", post(parent_chat))
}

async fn parent_chat(
    State(state): State<AppState>,
    Json(payload): Json<ParentChatRequest>,
) -> Result<Json<DataEnvelope<ParentAnswer>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question is required".to_string()));
    }

    let answer =
        state.chat().answer(question, payload.kb_hit.as_deref()).await.map_err(chat_error)?;

    Ok(Json(DataEnvelope::success(answer)))
}

fn chat_error(err: ChatError) -> ApiError {
    match err {
        ChatError::MissingApiKey => ApiError::Internal(err.to_string()),
        ChatError::Upstream(_) | ChatError::Transport(_) => ApiError::BadGateway(err.to_string()),
    }
}
