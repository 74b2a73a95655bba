use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::gemini::{BASE_URL, extract_gemini_error};
use super::retry::{Backoff, is_throttled, retry_after};
use super::{
    GeneratedImage, ImageGenerator, ImageSize, ImageStyle, ProviderFuture, classify_status,
};
use crate::error::{StudioError, StudioResult};

pub(crate) const DEFAULT_MODEL: &str = "imagen-3.0-generate-001";
const QUALITY_SUFFIX: &str = "high resolution, professional quality";
const NEGATIVE_PROMPT: &str = "low quality, blurry, distorted";

/// Image generation through the Imagen `predict` endpoint. Uses the same key
/// as text generation.
#[derive(Debug, Clone)]
pub struct Imagen {
    key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Imagen {
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

pub fn enhance_prompt(prompt: &str, style: ImageStyle) -> String {
    format!("{}, {}, {}", prompt, style.enhancement(), QUALITY_SUFFIX)
}

impl ImageGenerator for Imagen {
    fn generate_image(
        &self,
        prompt: String,
        style: ImageStyle,
        size: ImageSize,
    ) -> ProviderFuture<GeneratedImage> {
        let this = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}:predict", this.base_url, this.model);
            let enhanced = enhance_prompt(&prompt, style);
            let body = json!({
                "instances": [{ "prompt": enhanced }],
                "parameters": {
                    "sampleCount": 1,
                    "aspectRatio": size.aspect_ratio(),
                    "negativePrompt": NEGATIVE_PROMPT,
                    "safetyFilterLevel": "block_some",
                    "personGeneration": "allow_adult"
                }
            });
            debug!(
                "imagen request: model={}, aspect_ratio={}",
                this.model,
                size.aspect_ratio()
            );

            let mut backoff = Backoff::new("Imagen");
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
                debug!("imagen response status: {}", status);
                if status.is_success() {
                    let data_uri = extract_image(&text)?;
                    return Ok(GeneratedImage {
                        data_uri,
                        revised_prompt: enhanced,
                    });
                }
                if is_throttled(status, &text) && backoff.can_retry() {
                    backoff.wait(hint).await;
                    continue;
                }
                let message = extract_gemini_error(&text).unwrap_or(text);
                return Err(classify_status("imagen", status.as_u16(), message));
            }
            Err(StudioError::Transport(
                "imagen: retry budget exhausted".to_string(),
            ))
        })
    }
}

pub(crate) fn extract_image(body: &str) -> StudioResult<String> {
    #[derive(Deserialize)]
    struct PredictResponse {
        #[serde(default)]
        predictions: Vec<Prediction>,
    }

    #[derive(Deserialize)]
    struct Prediction {
        #[serde(rename = "bytesBase64Encoded")]
        bytes: Option<String>,
        #[serde(rename = "mimeType")]
        mime: Option<String>,
    }

    let payload: PredictResponse = serde_json::from_str(body)
        .map_err(|err| StudioError::MalformedResponse(format!("imagen: {}", err)))?;
    let prediction = payload
        .predictions
        .into_iter()
        .find(|prediction| prediction.bytes.is_some())
        .ok_or_else(|| StudioError::MalformedResponse("imagen: no predictions".to_string()))?;
    let mime = prediction.mime.unwrap_or_else(|| "image/png".to_string());
    Ok(format!(
        "data:{};base64,{}",
        mime,
        prediction.bytes.unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_gets_style_and_quality_suffix() {
        assert_eq!(
            enhance_prompt("a tent by a lake", ImageStyle::Minimal),
            "a tent by a lake, minimalist design, clean, simple, modern aesthetic, high resolution, professional quality"
        );
    }

    #[test]
    fn prediction_becomes_data_uri() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/imagen_predict_response.json"
        ));
        let uri = extract_image(payload).unwrap();
        assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn filtered_output_is_malformed() {
        let err = extract_image(r#"{"predictions":[]}"#).unwrap_err();
        assert!(matches!(err, StudioError::MalformedResponse(_)));
        assert!(extract_image(r#"{}"#).is_err());
    }
}
