use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::layout::{FontFamily, Placeholder, TextStyle};
use crate::paths;
use crate::providers::GenerationOptions;
use crate::thumbnail::AspectRatio;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub history_limit: usize,
    pub generation: GenerationSettings,
    pub thumbnail: ThumbnailSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub image_model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub post_max_tokens: u32,
    pub tags_max_tokens: u32,
}

impl GenerationSettings {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }

    pub fn post_options(&self) -> GenerationOptions {
        self.options().with_max_tokens(self.post_max_tokens)
    }

    pub fn tags_options(&self) -> GenerationOptions {
        self.options().with_max_tokens(self.tags_max_tokens)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailSettings {
    pub ratio: AspectRatio,
    pub font: FontFamily,
    pub font_size: u32,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    pub placeholder_message: String,
    pub placeholder_fill_color: String,
    pub placeholder_text_color: String,
}

impl ThumbnailSettings {
    pub fn text_style(&self) -> TextStyle {
        TextStyle {
            font: self.font,
            font_size: self.font_size,
            fill_color: self.fill_color.clone(),
            stroke_color: self.stroke_color.clone(),
            stroke_width: self.stroke_width,
        }
    }

    pub fn placeholder(&self) -> Placeholder {
        Placeholder {
            fill_color: self.placeholder_fill_color.clone(),
            text_color: self.placeholder_text_color.clone(),
            message: self.placeholder_message.clone(),
            ..Placeholder::default()
        }
    }
}

/// Endpoint overrides; unset means the provider's public endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiSettings {
    pub gemini: Option<String>,
    pub naver: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let style = TextStyle::default();
        let placeholder = Placeholder::default();
        let options = GenerationOptions::default();
        Self {
            history_limit: 100,
            generation: GenerationSettings {
                model: "gemini-1.5-flash".to_string(),
                image_model: "imagen-3.0-generate-001".to_string(),
                temperature: options.temperature,
                top_k: options.top_k,
                top_p: options.top_p,
                max_tokens: options.max_tokens,
                post_max_tokens: 4096,
                tags_max_tokens: 200,
            },
            thumbnail: ThumbnailSettings {
                ratio: AspectRatio::Wide,
                font: style.font,
                font_size: style.font_size,
                fill_color: style.fill_color,
                stroke_color: style.stroke_color,
                stroke_width: style.stroke_width,
                placeholder_message: placeholder.message,
                placeholder_fill_color: placeholder.fill_color,
                placeholder_text_color: placeholder.text_color,
            },
            api: ApiSettings::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    system: Option<SystemSection>,
    generation: Option<GenerationSection>,
    thumbnail: Option<ThumbnailSection>,
    api: Option<ApiSection>,
}

#[derive(Debug, Default, Deserialize)]
struct SystemSection {
    histories: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerationSection {
    model: Option<String>,
    image_model: Option<String>,
    temperature: Option<f32>,
    top_k: Option<u32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
    post_max_tokens: Option<u32>,
    tags_max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ThumbnailSection {
    ratio: Option<String>,
    font: Option<String>,
    font_size: Option<u32>,
    fill_color: Option<String>,
    stroke_color: Option<String>,
    stroke_width: Option<u32>,
    placeholder_message: Option<String>,
    placeholder_fill_color: Option<String>,
    placeholder_text_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSection {
    gemini: Option<String>,
    naver: Option<String>,
}

/// Embedded defaults, then `./settings.toml`, `./settings.local.toml`, the
/// data dir copies, and finally `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge_str(DEFAULT_SETTINGS_TOML, "embedded defaults")?;
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(dir) = paths::data_dir() {
        ordered_paths.push(dir.join("settings.toml"));
        ordered_paths.push(dir.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content, &path.display().to_string())?;
        }
    }
    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str, origin: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)
            .with_context(|| format!("failed to parse settings: {}", origin))?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(system) = incoming.system
            && let Some(limit) = system.histories
            && limit > 0
        {
            self.history_limit = limit;
        }
        if let Some(generation) = incoming.generation {
            self.merge_generation(generation);
        }
        if let Some(thumbnail) = incoming.thumbnail {
            self.merge_thumbnail(thumbnail);
        }
        if let Some(api) = incoming.api {
            if let Some(url) = non_empty(api.gemini) {
                self.api.gemini = Some(url);
            }
            if let Some(url) = non_empty(api.naver) {
                self.api.naver = Some(url);
            }
        }
    }

    fn merge_generation(&mut self, incoming: GenerationSection) {
        let generation = &mut self.generation;
        if let Some(model) = non_empty(incoming.model) {
            generation.model = model;
        }
        if let Some(model) = non_empty(incoming.image_model) {
            generation.image_model = model;
        }
        if let Some(value) = incoming.temperature.filter(|value| *value >= 0.0) {
            generation.temperature = value;
        }
        if let Some(value) = incoming.top_k.filter(|value| *value > 0) {
            generation.top_k = value;
        }
        if let Some(value) = incoming.top_p.filter(|value| *value > 0.0 && *value <= 1.0) {
            generation.top_p = value;
        }
        if let Some(value) = incoming.max_tokens.filter(|value| *value > 0) {
            generation.max_tokens = value;
        }
        if let Some(value) = incoming.post_max_tokens.filter(|value| *value > 0) {
            generation.post_max_tokens = value;
        }
        if let Some(value) = incoming.tags_max_tokens.filter(|value| *value > 0) {
            generation.tags_max_tokens = value;
        }
    }

    fn merge_thumbnail(&mut self, incoming: ThumbnailSection) {
        let thumbnail = &mut self.thumbnail;
        if let Some(value) = non_empty(incoming.ratio) {
            match AspectRatio::parse(&value) {
                Some(ratio) => thumbnail.ratio = ratio,
                None => warn!("unknown thumbnail ratio in settings: {}", value),
            }
        }
        if let Some(value) = non_empty(incoming.font) {
            match FontFamily::parse(&value) {
                Some(font) => thumbnail.font = font,
                None => warn!("unknown thumbnail font in settings: {}", value),
            }
        }
        if let Some(size) = incoming.font_size.filter(|size| *size > 0) {
            thumbnail.font_size = size;
        }
        if let Some(color) = non_empty(incoming.fill_color) {
            thumbnail.fill_color = color;
        }
        if let Some(color) = non_empty(incoming.stroke_color) {
            thumbnail.stroke_color = color;
        }
        if let Some(width) = incoming.stroke_width {
            thumbnail.stroke_width = width;
        }
        if let Some(message) = non_empty(incoming.placeholder_message) {
            thumbnail.placeholder_message = message;
        }
        if let Some(color) = non_empty(incoming.placeholder_fill_color) {
            thumbnail.placeholder_fill_color = color;
        }
        if let Some(color) = non_empty(incoming.placeholder_text_color) {
            thumbnail.placeholder_text_color = color;
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(dir) = paths::data_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create settings directory: {}", dir.display()))?;
    let path = dir.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
