use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

const EMBEDDABLE_MIMES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Decoded background bitmap, kept as a data URI so every frame can embed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    pub mime: String,
    pub width: u32,
    pub height: u32,
    data_uri: String,
}

impl Background {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mime = infer::get(bytes)
            .map(|kind| kind.mime_type().to_string())
            .filter(|mime| mime.starts_with("image/"))
            .ok_or_else(|| anyhow!("background is not a recognized image"))?;
        let decoded =
            image::load_from_memory(bytes).with_context(|| "failed to decode background image")?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(anyhow!("background image has no pixels"));
        }
        // resvg only draws these; anything else is embedded as PNG.
        let (mime, payload) = if EMBEDDABLE_MIMES.contains(&mime.as_str()) {
            (mime, BASE64.encode(bytes))
        } else {
            let mut png = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .with_context(|| format!("failed to convert {} background to PNG", mime))?;
            ("image/png".to_string(), BASE64.encode(&png))
        };
        Ok(Self {
            data_uri: format!("data:{};base64,{}", mime, payload),
            mime,
            width,
            height,
        })
    }

    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let payload = uri
            .trim()
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(_, data)| data)
            .ok_or_else(|| anyhow!("expected a base64 data URI"))?;
        let bytes = BASE64
            .decode(payload.trim())
            .with_context(|| "failed to decode data URI payload")?;
        Self::from_bytes(&bytes)
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
    pub bold: bool,
}

/// One drawing step. A frame is always drawn from scratch, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    FillRect {
        color: String,
    },
    DrawImage {
        #[serde(skip)]
        href: String,
        width: u32,
        height: u32,
    },
    StrokeText {
        text: String,
        x: f32,
        y: f32,
        font: FontSpec,
        color: String,
        line_width: f32,
    },
    FillText {
        text: String,
        x: f32,
        y: f32,
        font: FontSpec,
        color: String,
    },
}

impl DrawOp {
    pub fn is_text(&self) -> bool {
        matches!(self, DrawOp::StrokeText { .. } | DrawOp::FillText { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn text_ops(&self) -> impl Iterator<Item = &DrawOp> {
        self.ops.iter().filter(|op| op.is_text())
    }

    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        ));
        for op in &self.ops {
            match op {
                DrawOp::FillRect { color } => {
                    svg.push_str(&format!(
                        r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{fill}"/>"#,
                        w = self.width,
                        h = self.height,
                        fill = escape_xml(color)
                    ));
                }
                DrawOp::DrawImage {
                    href,
                    width,
                    height,
                } => {
                    svg.push_str(&format!(
                        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
                        uri = href,
                        w = width,
                        h = height
                    ));
                }
                DrawOp::StrokeText {
                    text,
                    x,
                    y,
                    font,
                    color,
                    line_width,
                } => {
                    svg.push_str(&format!(
                        r#"<text x="{x}" y="{y}" {font} fill="none" stroke="{color}" stroke-width="{width}">{text}</text>"#,
                        x = x,
                        y = y,
                        font = font_attrs(font),
                        color = escape_xml(color),
                        width = line_width,
                        text = escape_xml(text)
                    ));
                }
                DrawOp::FillText {
                    text,
                    x,
                    y,
                    font,
                    color,
                } => {
                    svg.push_str(&format!(
                        r#"<text x="{x}" y="{y}" {font} fill="{color}">{text}</text>"#,
                        x = x,
                        y = y,
                        font = font_attrs(font),
                        color = escape_xml(color),
                        text = escape_xml(text)
                    ));
                }
            }
        }
        svg.push_str("</svg>");
        svg
    }
}

fn font_attrs(font: &FontSpec) -> String {
    format!(
        r#"font-family="{family}" font-size="{size}" font-weight="{weight}" text-anchor="middle" dominant-baseline="middle""#,
        family = escape_xml(&font.family),
        size = font.size,
        weight = if font.bold { "bold" } else { "normal" }
    )
}

pub fn render_svg_bytes(svg: &str, output_mime: &str) -> Result<Vec<u8>> {
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let image = match format {
        // JPEG has no alpha channel.
        image::ImageFormat::Jpeg => {
            image::DynamicImage::ImageRgb8(image::DynamicImage::ImageRgba8(image).to_rgb8())
        }
        _ => image::DynamicImage::ImageRgba8(image),
    };
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

pub fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" => Some(image::ImageFormat::Jpeg),
        "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        _ => None,
    }
}

pub(crate) fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 90, 160, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png fixture");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_reads_dimensions_and_mime() {
        let background = Background::from_bytes(&png_fixture(8, 4)).unwrap();
        assert_eq!(background.mime, "image/png");
        assert_eq!((background.width, background.height), (8, 4));
        assert!(background.data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn background_round_trips_through_data_uri() {
        let original = Background::from_bytes(&png_fixture(3, 3)).unwrap();
        let reloaded = Background::from_data_uri(original.data_uri()).unwrap();
        assert_eq!(original, reloaded);
    }

    #[test]
    fn bmp_background_is_embedded_as_png_and_drawn() {
        let red = image::RgbImage::from_pixel(40, 30, image::Rgb([200, 20, 20]));
        let mut bmp = Vec::new();
        image::DynamicImage::ImageRgb8(red)
            .write_to(&mut Cursor::new(&mut bmp), image::ImageFormat::Bmp)
            .unwrap();
        let background = Background::from_bytes(&bmp).unwrap();
        assert_eq!(background.mime, "image/png");
        assert_eq!((background.width, background.height), (40, 30));
        assert!(background.data_uri().starts_with("data:image/png;base64,"));

        let mut frame = Frame::new(40, 30);
        frame.push(DrawOp::DrawImage {
            href: background.data_uri().to_string(),
            width: 40,
            height: 30,
        });
        let bytes = render_svg_bytes(&frame.to_svg(), "image/png").unwrap();
        let exported = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(exported.get_pixel(0, 0), &image::Rgba([200, 20, 20, 255]));
    }

    #[test]
    fn background_rejects_non_images() {
        assert!(Background::from_bytes(b"plain text, not pixels").is_err());
        assert!(Background::from_data_uri("https://example.com/a.png").is_err());
    }

    #[test]
    fn svg_escapes_text_content() {
        let mut frame = Frame::new(10, 10);
        frame.push(DrawOp::FillText {
            text: "Tom & <Jerry>".to_string(),
            x: 5.0,
            y: 5.0,
            font: FontSpec {
                family: "Noto Sans KR".to_string(),
                size: 4.0,
                bold: true,
            },
            color: "#fff".to_string(),
        });
        let svg = frame.to_svg();
        assert!(svg.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains(r#"font-weight="bold""#));
    }

    #[test]
    fn rasterizes_frame_to_png() {
        let mut frame = Frame::new(6, 4);
        frame.push(DrawOp::FillRect {
            color: "#334155".to_string(),
        });
        let bytes = render_svg_bytes(&frame.to_svg(), "image/png").unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[test]
    fn unknown_output_mime_is_rejected() {
        let frame = Frame::new(2, 2);
        assert!(render_svg_bytes(&frame.to_svg(), "image/x-unknown").is_err());
    }
}
