use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::ChatSettings;

pub(crate) const DISCLAIMER: &str = "This is general information, not medical advice.";
const MAX_ERROR_BODY_CHARS: usize = 300;

const PERSONA_PROMPT: &str = "\
You are 'Parent Help', a warm, factual assistant for parents of school-aged children with dyslexia.
- If the question is related to dyslexia:
  • Answer only dyslexia-related questions.
  • Never diagnose.
  • Be empathetic, concise, and encouraging.
  • Always cite sources when available.
- If the question is about treatment suggestions:
  → Respond only with:
    'Sorry, I'm not supposed to provide medical suggestions. Please seek advice from a registered psychologist.'
- If the question is unrelated to dyslexia:
  → Respond only with:
    'Sorry, I can't answer this question.'
- Follow this response format:
    Answer: <Main answer>
    1. <Point 1>
       <Summary>
       <Citation>
    2. <Point 2>
       <Summary>
       <Citation>
";

#[derive(Debug, Error)]
pub(crate) enum ChatError {
    #[error("Missing GCV_API_KEY configuration")]
    MissingApiKey,
    #[error("Chat model error: {0}")]
    Upstream(String),
    #[error("Chat model request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Source {
    pub(crate) title: String,
    pub(crate) url: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ParentAnswer {
    pub(crate) answer: String,
    pub(crate) sources: Vec<Source>,
    pub(crate) suggestions: Vec<String>,
    pub(crate) disclaimer: &'static str,
}

#[derive(Debug, Clone)]
pub(crate) struct ParentChatService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl ParentChatService {
    pub(crate) fn from_settings(settings: &ChatSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to build chat HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    pub(crate) async fn answer(
        &self,
        question: &str,
        kb_hit: Option<&str>,
    ) -> Result<ParentAnswer, ChatError> {
        if self.api_key.is_empty() {
            return Err(ChatError::MissingApiKey);
        }

        let payload = json!({
            "contents": [{"role": "user", "parts": [{"text": build_prompt(question, kb_hit)}]}],
            "tools": [{"google_search": {}}],
            "generationConfig": {"temperature": self.temperature},
        });
        let endpoint = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ChatError::Transport(err.without_url().to_string()))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|err| ChatError::Transport(err.without_url().to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&raw_body)
                .ok()
                .and_then(|body| body.pointer("/error/message")?.as_str().map(str::to_string))
                .unwrap_or_else(|| raw_body.chars().take(MAX_ERROR_BODY_CHARS).collect());
            tracing::warn!(
                status = status.as_u16(),
                error = %message,
                "chat model request rejected"
            );
            return Err(ChatError::Upstream(format!("HTTP {}: {message}", status.as_u16())));
        }

        let body: Value = serde_json::from_str(&raw_body)
            .map_err(|err| ChatError::Upstream(format!("non-JSON response body: {err}")))?;
        if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
            return Err(ChatError::Upstream(message.to_string()));
        }

        let candidate = body
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .ok_or_else(|| ChatError::Upstream("model returned no candidates".to_string()))?;

        let answer = extract_answer_text(candidate);
        if answer.is_empty() {
            let finish_reason =
                candidate.get("finishReason").and_then(Value::as_str).unwrap_or("UNKNOWN");
            return Err(ChatError::Upstream(format!(
                "model returned no answer text (finish reason {finish_reason})"
            )));
        }

        let sources = extract_sources(candidate);
        let suggestions = extract_suggestions(candidate);
        tracing::info!(
            model = %self.model,
            sources = sources.len(),
            suggestions = suggestions.len(),
            "parent chat answered"
        );

        Ok(ParentAnswer { answer, sources, suggestions, disclaimer: DISCLAIMER })
    }
}

pub(crate) fn build_prompt(question: &str, kb_hit: Option<&str>) -> String {
    let context = kb_hit.map(str::trim).filter(|value| !value.is_empty()).unwrap_or("N/A");
    format!(
        "{PERSONA_PROMPT}\n\nQuestion: {}\nContext from our knowledge base:\n{context}",
        question.trim()
    )
}

fn extract_answer_text(candidate: &Value) -> String {
    candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Distinct (title, url) pairs from grounding chunks, in first-seen order.
fn extract_sources(candidate: &Value) -> Vec<Source> {
    let Some(chunks) =
        candidate.pointer("/groundingMetadata/groundingChunks").and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut sources: Vec<Source> = Vec::new();
    for chunk in chunks {
        for kind in ["web", "retrievedContext"] {
            let Some(source) = chunk.get(kind) else {
                continue;
            };
            let url = ["uri", "url", "sourceUri"]
                .iter()
                .find_map(|key| source.get(*key).and_then(Value::as_str))
                .filter(|value| !value.is_empty());
            let Some(url) = url else {
                continue;
            };
            let title = source
                .get("title")
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .unwrap_or("Source");

            let entry = Source { title: title.to_string(), url: url.to_string() };
            if !sources.contains(&entry) {
                sources.push(entry);
            }
        }
    }
    sources
}

fn extract_suggestions(candidate: &Value) -> Vec<String> {
    let Some(metadata) = candidate.get("groundingMetadata") else {
        return Vec::new();
    };

    let from_entry_point = metadata.get("searchEntryPoint").and_then(|entry| {
        ["suggestedQueries", "suggestedQuestions", "suggestions"]
            .iter()
            .find_map(|key| entry.get(*key).and_then(Value::as_array))
    });

    from_entry_point
        .or_else(|| metadata.get("webSearchQueries").and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .map(|item| match item.as_str() {
                    Some(text) => text.to_string(),
                    None => item.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}
