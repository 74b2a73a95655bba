use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::canvas::{Background, Frame, image_format_from_mime, render_svg_bytes};
use crate::error::{StudioError, StudioResult};
use crate::layout::{self, FontFamily, Placeholder, TextStyle};
use crate::settings::ThumbnailSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Classic,
    /// Follow the background image's own size.
    #[serde(rename = "original")]
    Original,
}

impl AspectRatio {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "16:9" => Some(AspectRatio::Wide),
            "1:1" => Some(AspectRatio::Square),
            "4:3" => Some(AspectRatio::Classic),
            "original" => Some(AspectRatio::Original),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Wide => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Classic => "4:3",
            AspectRatio::Original => "original",
        }
    }

    pub fn preset_size(&self) -> Option<(u32, u32)> {
        match self {
            AspectRatio::Wide => Some((1920, 1080)),
            AspectRatio::Square => Some((1080, 1080)),
            AspectRatio::Classic => Some((1440, 1080)),
            AspectRatio::Original => None,
        }
    }
}

/// A batch of control changes. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThumbnailEdit {
    pub text: Option<String>,
    pub ratio: Option<AspectRatio>,
    pub font: Option<FontFamily>,
    pub font_size: Option<u32>,
    pub fill_color: Option<String>,
    pub stroke_color: Option<String>,
    pub stroke_width: Option<u32>,
}

impl ThumbnailEdit {
    /// Builds an edit from user-facing labels, rejecting unknown ones.
    pub fn parse(ratio: Option<&str>, font: Option<&str>) -> StudioResult<Self> {
        let ratio = ratio
            .map(|value| {
                AspectRatio::parse(value).ok_or_else(|| {
                    StudioError::InvalidInput(format!("unknown aspect ratio: {}", value))
                })
            })
            .transpose()?;
        let font = font
            .map(|value| {
                FontFamily::parse(value)
                    .ok_or_else(|| StudioError::InvalidInput(format!("unknown font: {}", value)))
            })
            .transpose()?;
        Ok(Self {
            ratio,
            font,
            ..Self::default()
        })
    }
}

/// A frame detached from its compositor, ready to rasterize off the lock.
#[derive(Debug, Clone)]
pub struct ExportJob {
    svg: String,
    mime: String,
}

impl ExportJob {
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn render(&self) -> StudioResult<Vec<u8>> {
        render_svg_bytes(&self.svg, &self.mime)
            .map_err(|err| StudioError::Image(format!("{:#}", err)))
    }
}

/// Owns the thumbnail surface and redraws it after every change.
#[derive(Debug, Clone)]
pub struct ThumbnailCompositor {
    ratio: AspectRatio,
    background: Option<Background>,
    style: TextStyle,
    text: String,
    placeholder: Placeholder,
    frame: Frame,
}

impl Default for ThumbnailCompositor {
    fn default() -> Self {
        Self::new(
            TextStyle::default(),
            AspectRatio::Wide,
            Placeholder::default(),
        )
    }
}

impl ThumbnailCompositor {
    pub fn new(style: TextStyle, ratio: AspectRatio, placeholder: Placeholder) -> Self {
        let mut compositor = Self {
            ratio,
            background: None,
            style,
            text: String::new(),
            placeholder,
            frame: Frame::new(0, 0),
        };
        compositor.redraw();
        compositor
    }

    pub fn from_settings(settings: &ThumbnailSettings) -> Self {
        Self::new(
            settings.text_style(),
            settings.ratio,
            settings.placeholder(),
        )
    }

    pub fn size(&self) -> (u32, u32) {
        if let Some(size) = self.ratio.preset_size() {
            return size;
        }
        self.background
            .as_ref()
            .map(|background| (background.width, background.height))
            .or_else(|| AspectRatio::Wide.preset_size())
            .unwrap_or((1920, 1080))
    }

    pub fn ratio(&self) -> AspectRatio {
        self.ratio
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_background(&self) -> bool {
        self.background.is_some()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn set_ratio(&mut self, ratio: AspectRatio) {
        self.ratio = ratio;
        self.redraw();
    }

    /// Replaces the background wholesale. On a decode failure the previous
    /// background stays in place.
    pub fn set_background_bytes(&mut self, bytes: &[u8]) -> StudioResult<()> {
        let background =
            Background::from_bytes(bytes).map_err(|err| StudioError::Image(format!("{:#}", err)))?;
        self.install_background(background);
        Ok(())
    }

    pub fn set_background_data_uri(&mut self, uri: &str) -> StudioResult<()> {
        let background = Background::from_data_uri(uri)
            .map_err(|err| StudioError::Image(format!("{:#}", err)))?;
        self.install_background(background);
        Ok(())
    }

    pub fn set_background_file(&mut self, path: &Path) -> StudioResult<()> {
        let bytes = std::fs::read(path).map_err(|err| {
            StudioError::Image(format!("failed to read {}: {}", path.display(), err))
        })?;
        self.set_background_bytes(&bytes)
    }

    pub fn clear_background(&mut self) {
        self.background = None;
        self.redraw();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.redraw();
    }

    pub fn set_font(&mut self, font: FontFamily) {
        self.style.font = font;
        self.redraw();
    }

    pub fn set_font_size(&mut self, size: u32) -> StudioResult<()> {
        if size == 0 {
            return Err(StudioError::InvalidInput(
                "font size must be positive".to_string(),
            ));
        }
        self.style.font_size = size;
        self.redraw();
        Ok(())
    }

    pub fn set_fill_color(&mut self, color: impl Into<String>) {
        self.style.fill_color = color.into();
        self.redraw();
    }

    pub fn set_stroke_color(&mut self, color: impl Into<String>) {
        self.style.stroke_color = color.into();
        self.redraw();
    }

    pub fn set_stroke_width(&mut self, width: u32) {
        self.style.stroke_width = width;
        self.redraw();
    }

    pub fn set_style(&mut self, style: TextStyle) -> StudioResult<()> {
        if style.font_size == 0 {
            return Err(StudioError::InvalidInput(
                "font size must be positive".to_string(),
            ));
        }
        self.style = style;
        self.redraw();
        Ok(())
    }

    /// Applies every set field and redraws once. A rejected edit changes
    /// nothing.
    pub fn apply(&mut self, edit: ThumbnailEdit) -> StudioResult<()> {
        let mut style = self.style.clone();
        if let Some(font) = edit.font {
            style.font = font;
        }
        if let Some(size) = edit.font_size {
            style.font_size = size;
        }
        if let Some(color) = edit.fill_color {
            style.fill_color = color;
        }
        if let Some(color) = edit.stroke_color {
            style.stroke_color = color;
        }
        if let Some(width) = edit.stroke_width {
            style.stroke_width = width;
        }
        if style.font_size == 0 {
            return Err(StudioError::InvalidInput(
                "font size must be positive".to_string(),
            ));
        }
        self.style = style;
        if let Some(ratio) = edit.ratio {
            self.ratio = ratio;
        }
        if let Some(text) = edit.text {
            self.text = text;
        }
        self.redraw();
        Ok(())
    }

    pub fn to_svg(&self) -> String {
        self.frame.to_svg()
    }

    /// Snapshots the current frame for rasterizing. A thumbnail without a
    /// background is never exported.
    pub fn export_job(&self, mime: &str) -> StudioResult<ExportJob> {
        if self.background.is_none() {
            return Err(StudioError::NoBackground);
        }
        if image_format_from_mime(mime).is_none() {
            return Err(StudioError::InvalidInput(format!(
                "unsupported export format: {}",
                mime
            )));
        }
        Ok(ExportJob {
            svg: self.to_svg(),
            mime: mime.to_string(),
        })
    }

    pub fn export(&self, mime: &str) -> StudioResult<Vec<u8>> {
        self.export_job(mime)?.render()
    }

    fn install_background(&mut self, background: Background) {
        debug!(
            "thumbnail background set ({}x{} {})",
            background.width, background.height, background.mime
        );
        self.background = Some(background);
        self.redraw();
    }

    fn redraw(&mut self) {
        let (width, height) = self.size();
        self.frame = layout::compose(
            width,
            height,
            self.background.as_ref(),
            &self.style,
            &self.text,
            &self.placeholder,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawOp, png_fixture};

    #[test]
    fn presets_drive_surface_size() {
        let mut compositor = ThumbnailCompositor::default();
        assert_eq!(compositor.size(), (1920, 1080));
        compositor.set_ratio(AspectRatio::Square);
        assert_eq!(compositor.size(), (1080, 1080));
        assert_eq!((compositor.frame().width, compositor.frame().height), (1080, 1080));
        compositor.set_ratio(AspectRatio::Classic);
        assert_eq!(compositor.size(), (1440, 1080));
    }

    #[test]
    fn original_ratio_follows_background() {
        let mut compositor = ThumbnailCompositor::default();
        compositor.set_ratio(AspectRatio::Original);
        assert_eq!(compositor.size(), (1920, 1080));
        compositor.set_background_bytes(&png_fixture(64, 48)).unwrap();
        assert_eq!(compositor.size(), (64, 48));
    }

    #[test]
    fn redraws_on_every_change() {
        let mut compositor = ThumbnailCompositor::default();
        compositor.set_text("Hello/World");
        assert_eq!(compositor.frame().text_ops().count(), 1);

        compositor.set_background_bytes(&png_fixture(16, 9)).unwrap();
        assert_eq!(compositor.frame().text_ops().count(), 4);

        compositor.set_stroke_width(0);
        assert_eq!(compositor.frame().text_ops().count(), 2);

        compositor.set_fill_color("#ff0000");
        let colors = compositor
            .frame()
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::FillText { color, .. } => Some(color.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(colors, vec!["#ff0000", "#ff0000"]);
    }

    #[test]
    fn failed_upload_keeps_previous_background() {
        let mut compositor = ThumbnailCompositor::default();
        compositor.set_background_bytes(&png_fixture(10, 10)).unwrap();
        let before = compositor.frame().clone();
        let err = compositor.set_background_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, StudioError::Image(_)));
        assert!(compositor.has_background());
        assert_eq!(compositor.frame(), &before);
    }

    #[test]
    fn export_requires_background() {
        let compositor = ThumbnailCompositor::default();
        assert!(matches!(
            compositor.export("image/png"),
            Err(StudioError::NoBackground)
        ));
    }

    #[test]
    fn export_job_renders_detached_snapshot() {
        let mut compositor = ThumbnailCompositor::default();
        compositor.set_ratio(AspectRatio::Original);
        compositor.set_background_bytes(&png_fixture(12, 8)).unwrap();
        assert!(matches!(
            compositor.export_job("image/x-unknown"),
            Err(StudioError::InvalidInput(_))
        ));

        let job = compositor.export_job("image/png").unwrap();
        compositor.clear_background();
        let decoded = image::load_from_memory(&job.render().unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 8));
        assert_eq!(job.mime(), "image/png");
    }

    #[test]
    fn rendering_is_idempotent() {
        let mut compositor = ThumbnailCompositor::default();
        compositor.set_ratio(AspectRatio::Original);
        compositor.set_background_bytes(&png_fixture(40, 30)).unwrap();
        compositor.set_font_size(8).unwrap();
        compositor.set_text("Same/Output");

        let first_svg = compositor.to_svg();
        let first_png = compositor.export("image/png").unwrap();
        compositor.set_text("Same/Output");
        assert_eq!(compositor.to_svg(), first_svg);
        assert_eq!(compositor.export("image/png").unwrap(), first_png);
    }

    #[test]
    fn zero_font_size_is_rejected() {
        let mut compositor = ThumbnailCompositor::default();
        assert!(compositor.set_font_size(0).is_err());
        assert_eq!(compositor.style().font_size, TextStyle::default().font_size);
    }

    #[test]
    fn batch_edit_is_all_or_nothing() {
        let mut compositor = ThumbnailCompositor::default();
        let mut edit = ThumbnailEdit::parse(Some("1:1"), Some("jua")).unwrap();
        edit.text = Some("가을/캠핑".to_string());
        edit.font_size = Some(0);
        assert!(compositor.apply(edit.clone()).is_err());
        assert_eq!(compositor.ratio(), AspectRatio::Wide);
        assert_eq!(compositor.text(), "");

        edit.font_size = Some(60);
        compositor.apply(edit).unwrap();
        assert_eq!(compositor.size(), (1080, 1080));
        assert_eq!(compositor.style().font, FontFamily::Jua);
        assert_eq!(compositor.text(), "가을/캠핑");
    }

    #[test]
    fn unknown_labels_are_rejected() {
        assert!(ThumbnailEdit::parse(Some("21:9"), None).is_err());
        assert!(ThumbnailEdit::parse(None, Some("Comic Sans")).is_err());
        assert_eq!(ThumbnailEdit::parse(None, None).unwrap(), ThumbnailEdit::default());
    }

    #[test]
    fn ratio_parses_labels() {
        assert_eq!(AspectRatio::parse("16:9"), Some(AspectRatio::Wide));
        assert_eq!(AspectRatio::parse(" Original "), Some(AspectRatio::Original));
        assert_eq!(AspectRatio::parse("21:9"), None);
    }
}
