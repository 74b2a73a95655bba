use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::retry::{Backoff, is_throttled, retry_after};
use super::{
    GenerationOptions, ProviderFuture, TextGenerator, classify_status, format_error_parts,
};
use crate::error::{StudioError, StudioResult};

pub(crate) const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub(crate) const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct Gemini {
    key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Gemini {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }
}

impl TextGenerator for Gemini {
    fn generate_text(&self, prompt: String, options: GenerationOptions) -> ProviderFuture<String> {
        let this = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}:generateContent", this.base_url, this.model);
            let body = json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": options.temperature,
                    "topK": options.top_k,
                    "topP": options.top_p,
                    "maxOutputTokens": options.max_tokens
                }
            });
            debug!(
                "gemini request: model={}, prompt_chars={}, max_tokens={}",
                this.model,
                prompt.chars().count(),
                options.max_tokens
            );

            let mut backoff = Backoff::new("Gemini");
            while backoff.next_attempt() {
                let response = this
                    .client
                    .post(&url)
                    .header("x-goog-api-key", this.key.as_str())
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                let hint = retry_after(response.headers());
                let text = response.text().await.unwrap_or_default();
                debug!("gemini response status: {}", status);
                if status.is_success() {
                    return extract_text(&text);
                }
                if is_throttled(status, &text) && backoff.can_retry() {
                    backoff.wait(hint).await;
                    continue;
                }
                let message = extract_gemini_error(&text).unwrap_or(text);
                return Err(classify_status("gemini", status.as_u16(), message));
            }
            Err(StudioError::Transport(
                "gemini: retry budget exhausted".to_string(),
            ))
        })
    }
}

/// Pulls the reply text out of a generateContent payload. A reply cut off
/// by the output limit is returned as-is.
pub(crate) fn extract_text(body: &str) -> StudioResult<String> {
    let payload: GeminiResponse = serde_json::from_str(body)
        .map_err(|err| StudioError::MalformedResponse(format!("gemini: {}", err)))?;
    let candidate = payload
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| StudioError::MalformedResponse("gemini: no candidates".to_string()))?;

    if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        warn!("gemini reply truncated at the token limit; returning partial text");
    }

    let content = candidate
        .content
        .ok_or_else(|| StudioError::MalformedResponse("gemini: candidate has no content".to_string()))?;
    if let Some(text) = content.parts.into_iter().find_map(|part| part.text) {
        return Ok(text);
    }
    content
        .text
        .ok_or_else(|| StudioError::MalformedResponse("gemini: candidate has no text".to_string()))
}

pub(crate) fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    struct GeminiError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i32>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(
        error.message,
        error.status,
        error.code.map(|value| value.to_string()),
    ))
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}
