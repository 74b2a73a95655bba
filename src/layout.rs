//! Text block layout for thumbnails.
//!
//! The raw text is split on `/` into lines that are stacked top to bottom,
//! centered horizontally, and centered vertically as one block. Every call
//! produces a complete [`Frame`]; nothing is carried over from earlier calls.

use serde::{Deserialize, Serialize};

use crate::canvas::{Background, DrawOp, FontSpec, Frame};

pub const LINE_SEPARATOR: char = '/';
pub const LINE_HEIGHT_FACTOR: f32 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    NotoSansKr,
    NanumGothic,
    NanumMyeongjo,
    BlackHanSans,
    DoHyeon,
    Jua,
}

impl FontFamily {
    pub const ALL: [FontFamily; 6] = [
        FontFamily::NotoSansKr,
        FontFamily::NanumGothic,
        FontFamily::NanumMyeongjo,
        FontFamily::BlackHanSans,
        FontFamily::DoHyeon,
        FontFamily::Jua,
    ];

    pub fn family_name(&self) -> &'static str {
        match self {
            FontFamily::NotoSansKr => "Noto Sans KR",
            FontFamily::NanumGothic => "Nanum Gothic",
            FontFamily::NanumMyeongjo => "Nanum Myeongjo",
            FontFamily::BlackHanSans => "Black Han Sans",
            FontFamily::DoHyeon => "Do Hyeon",
            FontFamily::Jua => "Jua",
        }
    }

    /// Accepts either the family name or its kebab-case key.
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_lowercase().replace(['-', '_'], " ");
        Self::ALL
            .into_iter()
            .find(|family| family.family_name().to_lowercase() == wanted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font: FontFamily,
    pub font_size: u32,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontFamily::NotoSansKr,
            font_size: 80,
            fill_color: "#ffffff".to_string(),
            stroke_color: "#000000".to_string(),
            stroke_width: 8,
        }
    }
}

/// What is drawn while no background has been chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub fill_color: String,
    pub text_color: String,
    pub message: String,
    pub font_size: u32,
}

impl Default for Placeholder {
    fn default() -> Self {
        Self {
            fill_color: "#334155".to_string(),
            text_color: "#64748b".to_string(),
            message: "Upload a background image".to_string(),
            font_size: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub lines: Vec<PlacedLine>,
    pub line_height: f32,
    /// Top edge of the block; the block spans `top..top + height`.
    pub top: f32,
    pub height: f32,
}

pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(LINE_SEPARATOR)
        .map(|line| line.trim().to_string())
        .collect()
}

pub fn line_height(font_size: u32) -> f32 {
    font_size as f32 * LINE_HEIGHT_FACTOR
}

/// Lines are anchored at their vertical middle.
pub fn place_lines(text: &str, width: u32, height: u32, font_size: u32) -> TextBlock {
    let lines = split_lines(text);
    let line_height = line_height(font_size);
    let block_height = line_height * lines.len() as f32;
    let top = (height as f32 - block_height) / 2.0;
    let start_y = top + font_size as f32 / 2.0;
    let center_x = width as f32 / 2.0;

    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(idx, text)| PlacedLine {
            text,
            x: center_x,
            y: start_y + idx as f32 * line_height,
        })
        .collect();

    TextBlock {
        lines,
        line_height,
        top,
        height: block_height,
    }
}

pub fn compose(
    width: u32,
    height: u32,
    background: Option<&Background>,
    style: &TextStyle,
    text: &str,
    placeholder: &Placeholder,
) -> Frame {
    let mut frame = Frame::new(width, height);

    let Some(background) = background else {
        frame.push(DrawOp::FillRect {
            color: placeholder.fill_color.clone(),
        });
        frame.push(DrawOp::FillText {
            text: placeholder.message.clone(),
            x: width as f32 / 2.0,
            y: height as f32 / 2.0,
            font: FontSpec {
                family: FontFamily::NotoSansKr.family_name().to_string(),
                size: placeholder.font_size as f32,
                bold: false,
            },
            color: placeholder.text_color.clone(),
        });
        return frame;
    };

    frame.push(DrawOp::DrawImage {
        href: background.data_uri().to_string(),
        width,
        height,
    });

    let block = place_lines(text, width, height, style.font_size);
    let font = FontSpec {
        family: style.font.family_name().to_string(),
        size: style.font_size as f32,
        bold: true,
    };
    for line in block.lines {
        if style.stroke_width > 0 {
            frame.push(DrawOp::StrokeText {
                text: line.text.clone(),
                x: line.x,
                y: line.y,
                font: font.clone(),
                color: style.stroke_color.clone(),
                line_width: style.stroke_width as f32,
            });
        }
        frame.push(DrawOp::FillText {
            text: line.text,
            x: line.x,
            y: line.y,
            font: font.clone(),
            color: style.fill_color.clone(),
        });
    }
    frame
}
