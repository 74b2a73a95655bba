use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::error::{Credential, StudioError, StudioResult};

mod gemini;
mod imagen;
mod naver;
mod retry;

pub use gemini::Gemini;
pub use imagen::Imagen;
pub use naver::NaverSearch;

pub type ProviderFuture<T> = Pin<Box<dyn Future<Output = StudioResult<T>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_tokens: 8192,
        }
    }
}

impl GenerationOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        if max_tokens > 0 {
            self.max_tokens = max_tokens;
        }
        self
    }
}

/// Generative-text collaborator. A reply cut short by the token limit is
/// still returned as text.
pub trait TextGenerator: Send + Sync {
    fn generate_text(&self, prompt: String, options: GenerationOptions) -> ProviderFuture<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Realistic,
    Illustration,
    Minimal,
    Artistic,
    Cartoon,
}

impl ImageStyle {
    /// Unknown names fall back to realistic.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "illustration" => ImageStyle::Illustration,
            "minimal" => ImageStyle::Minimal,
            "artistic" => ImageStyle::Artistic,
            "cartoon" => ImageStyle::Cartoon,
            _ => ImageStyle::Realistic,
        }
    }

    pub fn enhancement(&self) -> &'static str {
        match self {
            ImageStyle::Realistic => {
                "photorealistic, high quality, detailed, professional photography"
            }
            ImageStyle::Illustration => {
                "digital illustration, artistic, colorful, creative design"
            }
            ImageStyle::Minimal => "minimalist design, clean, simple, modern aesthetic",
            ImageStyle::Artistic => "artistic style, creative interpretation, expressive, unique",
            ImageStyle::Cartoon => "cartoon style, fun, playful, vibrant colors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    /// Unknown sizes fall back to square.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "1792x1024" => ImageSize::Landscape,
            "1024x1792" => ImageSize::Portrait,
            _ => ImageSize::Square,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1792x1024",
            ImageSize::Portrait => "1024x1792",
        }
    }

    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            ImageSize::Square => "1:1",
            ImageSize::Landscape => "16:9",
            ImageSize::Portrait => "9:16",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub data_uri: String,
    pub revised_prompt: String,
}

pub trait ImageGenerator: Send + Sync {
    fn generate_image(
        &self,
        prompt: String,
        style: ImageStyle,
        size: ImageSize,
    ) -> ProviderFuture<GeneratedImage>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

pub trait KeywordSearch: Send + Sync {
    fn search(&self, term: &str) -> ProviderFuture<SearchResult>;
}

/// Placeholder for a collaborator whose credential is not available yet.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub Credential);

impl Unconfigured {
    fn fail<T: Send + 'static>(&self) -> ProviderFuture<T> {
        let credential = self.0;
        Box::pin(async move { Err(StudioError::MissingCredential(credential)) })
    }
}

impl TextGenerator for Unconfigured {
    fn generate_text(&self, _prompt: String, _options: GenerationOptions) -> ProviderFuture<String> {
        self.fail()
    }
}

impl ImageGenerator for Unconfigured {
    fn generate_image(
        &self,
        _prompt: String,
        _style: ImageStyle,
        _size: ImageSize,
    ) -> ProviderFuture<GeneratedImage> {
        self.fail()
    }
}

impl KeywordSearch for Unconfigured {
    fn search(&self, _term: &str) -> ProviderFuture<SearchResult> {
        self.fail()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naver_secret: Option<String>,
}

impl Credentials {
    /// Fields set in `other` win.
    pub fn merge(&mut self, other: Credentials) {
        if other.gemini.is_some() {
            self.gemini = other.gemini;
        }
        if other.naver_id.is_some() {
            self.naver_id = other.naver_id;
        }
        if other.naver_secret.is_some() {
            self.naver_secret = other.naver_secret;
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "gemini: {}, naver: {}",
            presence(self.gemini.as_deref()),
            presence(self.naver_id.as_deref().and(self.naver_secret.as_deref()))
        )
    }
}

fn presence(value: Option<&str>) -> &'static str {
    if value.is_some() { "set" } else { "missing" }
}

/// Explicit override, then environment, then stored credentials.
pub fn resolve_gemini_key(override_key: Option<&str>, stored: &Credentials) -> StudioResult<String> {
    non_empty(override_key)
        .or_else(|| get_env("GEMINI_API_KEY"))
        .or_else(|| get_env("GOOGLE_API_KEY"))
        .or_else(|| non_empty(stored.gemini.as_deref()))
        .ok_or(StudioError::MissingCredential(Credential::Gemini))
}

pub fn resolve_naver_keys(stored: &Credentials) -> StudioResult<(String, String)> {
    let id = get_env("NAVER_CLIENT_ID").or_else(|| non_empty(stored.naver_id.as_deref()));
    let secret =
        get_env("NAVER_CLIENT_SECRET").or_else(|| non_empty(stored.naver_secret.as_deref()));
    id.zip(secret)
        .ok_or(StudioError::MissingCredential(Credential::Naver))
}

pub(crate) fn classify_status(service: &str, status: u16, message: String) -> StudioError {
    match status {
        401 => StudioError::Unauthorized(format!("{}: {}", service, message)),
        403 => StudioError::Forbidden(format!("{}: {}", service, message)),
        _ => StudioError::Api { status, message },
    }
}

pub(crate) fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = code
        && !code.trim().is_empty()
    {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
