use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::VisionSettings;
use crate::core::metrics;
use crate::services::canvas_preprocess;
use crate::services::letter_match::DetectedSymbol;

const DOCUMENT_TEXT_DETECTION: &str = "DOCUMENT_TEXT_DETECTION";
const TEXT_DETECTION: &str = "TEXT_DETECTION";
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Error)]
pub(crate) enum OcrError {
    #[error("Empty base64 image")]
    EmptyImage,
    #[error("Invalid base64 image")]
    InvalidBase64,
    #[error("Invalid canvas image: {0}")]
    InvalidImage(String),
    #[error("Missing GCV_API_KEY configuration")]
    MissingApiKey,
    #[error("Vision API error: {0}")]
    Upstream(String),
    #[error("Vision API request failed: {0}")]
    Transport(String),
}

impl OcrError {
    pub(crate) fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyImage | Self::InvalidBase64 | Self::InvalidImage(_))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VisionOcrService {
    client: Client,
    api_key: String,
    base_url: String,
    fallback_text_detection: bool,
    preprocess_size: Option<u32>,
}

impl VisionOcrService {
    pub(crate) fn from_settings(settings: &VisionSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to build Vision HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            fallback_text_detection: settings.fallback_text_detection,
            preprocess_size: settings.preprocess.then_some(settings.preprocess_size),
        })
    }

    pub(crate) fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Run handwriting recognition on a base64 or data-URL canvas and return
    /// the single ASCII letters found, in reading order.
    pub(crate) async fn recognize(
        &self,
        canvas_input: &str,
    ) -> Result<Vec<DetectedSymbol>, OcrError> {
        let (mut content, bytes) = normalize_base64(canvas_input)?;
        if !self.is_configured() {
            return Err(OcrError::MissingApiKey);
        }

        if let Some(target_size) = self.preprocess_size {
            let prepared = canvas_preprocess::prepare_canvas(&bytes, target_size)
                .map_err(|err| OcrError::InvalidImage(err.to_string()))?;
            content = STANDARD.encode(prepared);
        }

        let mut response = self.annotate(&content, DOCUMENT_TEXT_DETECTION).await?;
        if self.fallback_text_detection && !has_text(&response) {
            tracing::debug!("document detection found no text, retrying with text detection");
            response = self.annotate(&content, TEXT_DETECTION).await?;
        }

        let symbols = extract_symbols(&response);
        metrics::record_ocr_request(if symbols.is_empty() { "empty" } else { "ok" });
        tracing::info!(symbols = symbols.len(), "Vision OCR completed");
        Ok(symbols)
    }

    async fn annotate(&self, content: &str, feature: &str) -> Result<Value, OcrError> {
        let endpoint = format!("{}/images:annotate", self.base_url);
        let payload = json!({
            "requests": [{
                "image": {"content": content},
                "features": [{"type": feature}],
                "imageContext": {"languageHints": ["en"]},
            }]
        });

        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let err = err.without_url();
                metrics::record_ocr_request("transport_error");
                tracing::warn!(error = %err, feature, "Vision API request failed");
                OcrError::Transport(err.to_string())
            })?;

        let status = response.status();
        let raw_body = response.text().await.map_err(|err| {
            metrics::record_ocr_request("transport_error");
            OcrError::Transport(err.without_url().to_string())
        })?;

        if !status.is_success() {
            metrics::record_ocr_request("upstream_error");
            tracing::warn!(
                status = status.as_u16(),
                feature,
                "Vision API returned an error status"
            );
            return Err(OcrError::Upstream(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&raw_body, MAX_ERROR_BODY_CHARS)
            )));
        }

        let parsed: Value = serde_json::from_str(&raw_body).map_err(|err| {
            metrics::record_ocr_request("upstream_error");
            OcrError::Upstream(format!("non-JSON response body: {err}"))
        })?;

        let first = first_response(&parsed);
        if let Some(error) = first.get("error") {
            metrics::record_ocr_request("upstream_error");
            let message =
                error.get("message").and_then(Value::as_str).unwrap_or("Vision API error");
            tracing::warn!(error = message, feature, "Vision API reported an error");
            return Err(OcrError::Upstream(message.to_string()));
        }

        Ok(first.clone())
    }
}

/// Strip a data-URL header and whitespace, then check the payload decodes.
/// Returns the cleaned base64 text and the decoded bytes.
pub(crate) fn normalize_base64(input: &str) -> Result<(String, Vec<u8>), OcrError> {
    let payload = match input.split_once(',') {
        Some((_, data)) => data,
        None => input,
    };
    let cleaned: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(OcrError::EmptyImage);
    }

    let bytes = STANDARD.decode(cleaned.as_bytes()).map_err(|_| OcrError::InvalidBase64)?;
    Ok((cleaned, bytes))
}

fn first_response(payload: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    payload
        .get("responses")
        .and_then(Value::as_array)
        .and_then(|responses| responses.first())
        .unwrap_or(&EMPTY)
}

fn has_text(response: &Value) -> bool {
    let has_document = response.get("fullTextAnnotation").is_some_and(|doc| !doc.is_null());
    let has_annotations = response
        .get("textAnnotations")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty());
    has_document || has_annotations
}

/// Walk pages, blocks, paragraphs, words and symbols, keeping symbols that are
/// a single ASCII letter.
pub(crate) fn extract_symbols(response: &Value) -> Vec<DetectedSymbol> {
    let Some(document) = response.get("fullTextAnnotation") else {
        return Vec::new();
    };

    let mut symbols = Vec::new();
    for page in children(document, "pages") {
        for block in children(page, "blocks") {
            for paragraph in children(block, "paragraphs") {
                for word in children(paragraph, "words") {
                    for symbol in children(word, "symbols") {
                        let text = symbol.get("text").and_then(Value::as_str).unwrap_or("");
                        let mut chars = text.chars();
                        let (Some(character), None) = (chars.next(), chars.next()) else {
                            continue;
                        };
                        if !character.is_ascii_alphabetic() {
                            continue;
                        }
                        let confidence =
                            symbol.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
                        symbols.push(DetectedSymbol::new(character, confidence));
                    }
                }
            }
        }
    }
    symbols
}

fn children<'a>(node: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    node.get(key).and_then(Value::as_array).into_iter().flatten()
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
