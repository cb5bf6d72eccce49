use axum::{extract::State, routing::post, Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::{metrics, state::AppState};
use crate::db::models::{LabeledImage, Myth, ReadingPassage, Sentence};
use crate::repositories;
use crate::repositories::content_cursors::{
    LABELED_IMAGES, MYTHS, READING_PASSAGES, SENTENCES, SINGLETON,
};
use crate::schemas::content::{ImageLabelingItem, LevelRequest, MythBatchResponse};
use crate::schemas::{DataEnvelope, STATUS_SUCCESS};
use crate::services::image_labels;

const READING_LEVELS: [&str; 3] = ["Easy", "Medium", "Hard"];

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/sentence/next", post(next_sentence))
        .route("/image_labeling/next", post(next_labeled_image))
        .route("/myth/next", post(next_myths))
        .route("/reading_speed", post(next_reading_passage))
}

async fn next_sentence(
    State(state): State<AppState>,
    Json(payload): Json<LevelRequest>,
) -> Result<Json<DataEnvelope<Sentence>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let level = payload.level.trim();
    if level.is_empty() {
        return Err(ApiError::BadRequest("level is required".to_string()));
    }

    let sentence =
        repositories::content_cursors::next_row::<Sentence>(state.db(), &SENTENCES, level)
            .await
            .map_err(ApiError::database)?
            .ok_or_else(|| ApiError::NotFound(format!("No rows found for level '{level}'")))?;

    metrics::record_content_served(SENTENCES.name, 1);
    Ok(Json(DataEnvelope::success(sentence)))
}

async fn next_labeled_image(
    State(state): State<AppState>,
) -> Result<Json<DataEnvelope<ImageLabelingItem>>, ApiError> {
    let image = repositories::content_cursors::next_row::<LabeledImage>(
        state.db(),
        &LABELED_IMAGES,
        SINGLETON,
    )
    .await
    .map_err(ApiError::database)?
    .ok_or_else(|| ApiError::NotFound("No image_labeling rows found".to_string()))?;

    let label = image_labels::format_label(&image.image_label);
    let words = image_labels::label_words(&label);
    let pronunciations = repositories::pronunciations::lookup(state.db(), &words)
        .await
        .map_err(ApiError::database)?;

    let options = {
        let mut rng = rand::thread_rng();
        let decoys = image_labels::decoy_labels(
            &label,
            state.settings().content().image_label_decoys,
            &mut rng,
        );
        image_labels::answer_options(&label, decoys, &mut rng)
    };

    metrics::record_content_served(LABELED_IMAGES.name, 1);
    Ok(Json(DataEnvelope::success(ImageLabelingItem {
        image_id: image.image_id,
        arpabet: image_labels::arpabet_for(&words, &pronunciations),
        image_base64: STANDARD.encode(&image.image_byte),
        image_label: label,
        options,
    })))
}

async fn next_myths(State(state): State<AppState>) -> Result<Json<MythBatchResponse>, ApiError> {
    let batch_size = i64::from(state.settings().content().myth_batch_size);
    let myths =
        repositories::content_cursors::next_rows::<Myth>(state.db(), &MYTHS, SINGLETON, batch_size)
            .await
            .map_err(ApiError::database)?;

    if myths.is_empty() {
        return Err(ApiError::NotFound("No myth rows found".to_string()));
    }

    metrics::record_content_served(MYTHS.name, myths.len());
    Ok(Json(MythBatchResponse { status: STATUS_SUCCESS, count: myths.len(), data: myths }))
}

async fn next_reading_passage(
    State(state): State<AppState>,
    Json(payload): Json<LevelRequest>,
) -> Result<Json<DataEnvelope<ReadingPassage>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let level = capitalize(payload.level.trim());
    if !READING_LEVELS.contains(&level.as_str()) {
        return Err(ApiError::BadRequest("Level must be Easy, Medium, or Hard".to_string()));
    }

    let passage = repositories::content_cursors::next_row::<ReadingPassage>(
        state.db(),
        &READING_PASSAGES,
        &level,
    )
    .await
    .map_err(ApiError::database)?
    .ok_or_else(|| ApiError::NotFound(format!("No passage found for level '{level}'")))?;

    metrics::record_content_served(READING_PASSAGES.name, 1);
    Ok(Json(DataEnvelope::success(passage)))
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
