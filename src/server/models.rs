use serde::{Deserialize, Serialize};

use crate::prompts::{BlogImageKind, TopicKind};
use crate::providers::{ImageSize, ImageStyle};

#[derive(Debug, Deserialize)]
pub(crate) struct TopicsRequest {
    pub(crate) kind: TopicKind,
    pub(crate) input: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeywordRequest {
    pub(crate) keyword: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct SnsRequest {
    pub(crate) title: Option<String>,
    pub(crate) summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageRequest {
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) style: ImageStyle,
    #[serde(default)]
    pub(crate) size: ImageSize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlogImageRequest {
    pub(crate) topic: String,
    pub(crate) kind: BlogImageKind,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackgroundRequest {
    pub(crate) description: String,
}

/// Every field is optional; unset fields keep the compositor's current value.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ThumbnailRequest {
    pub(crate) text: Option<String>,
    pub(crate) ratio: Option<String>,
    pub(crate) font: Option<String>,
    pub(crate) font_size: Option<u32>,
    pub(crate) fill_color: Option<String>,
    pub(crate) stroke_color: Option<String>,
    pub(crate) stroke_width: Option<u32>,
    pub(crate) background_base64: Option<String>,
    pub(crate) use_latest_image: bool,
    pub(crate) mime: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ThumbnailResponse {
    pub(crate) mime: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) data_base64: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct HistoryQuery {
    pub(crate) kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThemeRequest {
    pub(crate) theme: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
