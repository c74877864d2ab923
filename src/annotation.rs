//! Annotation records and the validated annotation model.
//!
//! Annotations arrive as flat wire records ([`AnnotationRecord`]), the JSON
//! shape produced by the authoring surface and distributed verbatim by the
//! collaboration channel's full-list replace message. Before the engine draws
//! anything, each record is validated into the [`Annotation`] sum type, one
//! variant per shape, each carrying only its own required fields. A record
//! that fails validation is rejected with a [`Rejection`] reason; rejection is
//! isolated to that record and never aborts a batch.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::geometry::Point;
use crate::path_data::{parse_path_data, PathCommand, PathDataError};
use crate::surface::RasterFormat;

/// Default font size for text annotations.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Default stroke width for path annotations.
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;

/// Fixed fill opacity for rect annotations (highlighter affordance).
pub const RECT_OPACITY: f32 = 0.4;

/// The annotation shape discriminator as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// A text run
    Text,
    /// A filled rectangle
    Rect,
    /// An embedded raster image
    Image,
    /// A stroked freehand path
    Path,
}

/// One annotation as delivered by the authoring surface.
///
/// All shape-specific fields are optional at this level; [`Annotation::from_record`]
/// checks that the fields required by `kind` are actually present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    /// Caller-assigned unique identifier, never reused.
    pub id: String,
    /// Shape discriminator (`"type"` on the wire).
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// 1-based page number against the original page numbering.
    pub page: i64,
    /// Viewport-space x of the top-left anchor.
    pub x: f32,
    /// Viewport-space y of the top-left anchor.
    pub y: f32,
    /// Text content (text annotations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Font size in document units (text annotations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    /// Box width (rect and image annotations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Box height (rect and image annotations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// Base64 raster payload, with or without a `data:` URI prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Path data string (path annotations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Stroke width (path annotations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f32>,
    /// `#RRGGBB` color string (all shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl AnnotationRecord {
    fn bare(id: &str, kind: AnnotationKind, page: i64, x: f32, y: f32) -> Self {
        Self {
            id: id.to_string(),
            kind,
            page,
            x,
            y,
            text: None,
            font_size: None,
            width: None,
            height: None,
            image: None,
            path: None,
            stroke_width: None,
            color: None,
        }
    }

    /// Build a text record with defaults for the optional fields.
    pub fn text(id: &str, page: i64, x: f32, y: f32, text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::bare(id, AnnotationKind::Text, page, x, y)
        }
    }

    /// Build a rect record with defaults for the optional fields.
    pub fn rect(id: &str, page: i64, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::bare(id, AnnotationKind::Rect, page, x, y)
        }
    }

    /// Build an image record with defaults for the optional fields.
    pub fn image(id: &str, page: i64, x: f32, y: f32, width: f32, height: f32, image: &str) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            image: Some(image.to_string()),
            ..Self::bare(id, AnnotationKind::Image, page, x, y)
        }
    }

    /// Build a path record with defaults for the optional fields.
    pub fn path(id: &str, page: i64, x: f32, y: f32, path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            ..Self::bare(id, AnnotationKind::Path, page, x, y)
        }
    }

    /// Set the color string, builder style.
    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }
}

/// Reasons a record fails validation. Isolated tier: logged, the record is
/// dropped, the batch continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// Page numbers are 1-based; zero and negatives are malformed.
    #[error("page number {0} is below 1")]
    InvalidPage(i64),

    /// A text annotation without non-empty text.
    #[error("text annotation has no text")]
    EmptyText,

    /// A rect or image annotation without positive width and height.
    #[error("missing or non-positive box dimensions")]
    BadDimensions,

    /// An image annotation whose payload is absent or not valid base64.
    #[error("image payload is missing or not valid base64")]
    BadImagePayload,

    /// A path annotation whose path data does not parse.
    #[error("path data rejected: {0}")]
    BadPathData(#[from] PathDataError),
}

/// A validated annotation, ready for dispatch to a draw primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// A text run
    Text(TextAnnotation),
    /// A translucent filled rectangle
    Rect(RectAnnotation),
    /// An embedded raster image
    Image(ImageAnnotation),
    /// A stroked freehand path
    Path(PathAnnotation),
}

/// A validated text annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnnotation {
    /// 1-based page number
    pub page: u32,
    /// Viewport-space anchor
    pub at: Point,
    /// Non-empty text content
    pub text: String,
    /// Font size in document units
    pub font_size: f32,
    /// Resolved text color
    pub color: Color,
}

/// A validated rect annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct RectAnnotation {
    /// 1-based page number
    pub page: u32,
    /// Viewport-space top-left corner
    pub at: Point,
    /// Box width, positive
    pub width: f32,
    /// Box height, positive
    pub height: f32,
    /// Resolved fill color
    pub color: Color,
}

/// A validated image annotation with its payload already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnnotation {
    /// 1-based page number
    pub page: u32,
    /// Viewport-space top-left corner
    pub at: Point,
    /// Box width, positive
    pub width: f32,
    /// Box height, positive
    pub height: f32,
    /// Decoded raster bytes
    pub data: Vec<u8>,
    /// Format hint from the payload's encoding prefix
    pub format: RasterFormat,
}

/// A validated path annotation with its commands already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct PathAnnotation {
    /// 1-based page number
    pub page: u32,
    /// Viewport-space origin the commands are relative to
    pub at: Point,
    /// Normalized absolute path commands
    pub commands: Vec<PathCommand>,
    /// Resolved stroke color
    pub color: Color,
    /// Stroke width in document units
    pub stroke_width: f32,
}

impl Annotation {
    /// Validate a wire record into an annotation, or explain why not.
    pub fn from_record(record: &AnnotationRecord) -> Result<Annotation, Rejection> {
        if record.page < 1 {
            return Err(Rejection::InvalidPage(record.page));
        }
        let page = record.page.min(u32::MAX as i64) as u32;
        let at = Point::new(record.x, record.y);

        match record.kind {
            AnnotationKind::Text => {
                let text = match record.text.as_deref() {
                    Some(t) if !t.is_empty() => t.to_string(),
                    _ => return Err(Rejection::EmptyText),
                };
                Ok(Annotation::Text(TextAnnotation {
                    page,
                    at,
                    text,
                    font_size: positive_or(record.font_size, DEFAULT_FONT_SIZE),
                    color: resolve_color(record.color.as_deref(), Color::BLACK),
                }))
            }
            AnnotationKind::Rect => {
                let (width, height) = box_dimensions(record)?;
                Ok(Annotation::Rect(RectAnnotation {
                    page,
                    at,
                    width,
                    height,
                    color: resolve_color(record.color.as_deref(), Color::HIGHLIGHT_YELLOW),
                }))
            }
            AnnotationKind::Image => {
                let (width, height) = box_dimensions(record)?;
                let payload = record.image.as_deref().ok_or(Rejection::BadImagePayload)?;
                let (data, format) = decode_image_payload(payload)?;
                Ok(Annotation::Image(ImageAnnotation {
                    page,
                    at,
                    width,
                    height,
                    data,
                    format,
                }))
            }
            AnnotationKind::Path => {
                let data = record.path.as_deref().ok_or(PathDataError::Empty)?;
                let commands = parse_path_data(data)?;
                Ok(Annotation::Path(PathAnnotation {
                    page,
                    at,
                    commands,
                    color: resolve_color(record.color.as_deref(), Color::BLACK),
                    stroke_width: positive_or(record.stroke_width, DEFAULT_STROKE_WIDTH),
                }))
            }
        }
    }

    /// The 1-based page number, interpreted against the original numbering.
    pub fn page(&self) -> u32 {
        match self {
            Annotation::Text(t) => t.page,
            Annotation::Rect(r) => r.page,
            Annotation::Image(i) => i.page,
            Annotation::Path(p) => p.page,
        }
    }
}

fn positive_or(value: Option<f32>, default: f32) -> f32 {
    value.filter(|v| *v > 0.0).unwrap_or(default)
}

fn resolve_color(hex: Option<&str>, default: Color) -> Color {
    match hex {
        Some(s) => Color::from_hex(s, default),
        None => default,
    }
}

fn box_dimensions(record: &AnnotationRecord) -> Result<(f32, f32), Rejection> {
    match (record.width, record.height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Ok((w, h)),
        _ => Err(Rejection::BadDimensions),
    }
}

/// Decode a base64 image payload, honoring an optional `data:` URI prefix.
///
/// The prefix decides the format hint: `data:image/png` means PNG, any other
/// data URI means JPEG. Bare base64 falls back to magic-byte sniffing, and to
/// JPEG when the bytes match nothing known (the embed step will report it).
fn decode_image_payload(payload: &str) -> Result<(Vec<u8>, RasterFormat), Rejection> {
    if payload.starts_with("data:") {
        let (prefix, body) = payload
            .split_once(',')
            .ok_or(Rejection::BadImagePayload)?;
        let data = BASE64
            .decode(body.trim())
            .map_err(|_| Rejection::BadImagePayload)?;
        let format = if prefix.starts_with("data:image/png") {
            RasterFormat::Png
        } else {
            RasterFormat::Jpeg
        };
        Ok((data, format))
    } else {
        let data = BASE64
            .decode(payload.trim())
            .map_err(|_| Rejection::BadImagePayload)?;
        let format = match image::guess_format(&data) {
            Ok(image::ImageFormat::Png) => RasterFormat::Png,
            _ => RasterFormat::Jpeg,
        };
        Ok((data, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 PNG, red pixel.
    const TINY_PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAIAAACQd1PeAAAADElEQVR4nGP4z8AAAAMBAQDJ/pLvAAAAAElFTkSuQmCC";

    #[test]
    fn test_valid_text_record() {
        let record = AnnotationRecord::text("a1", 1, 50.0, 100.0, "hello");
        let ann = Annotation::from_record(&record).unwrap();
        match ann {
            Annotation::Text(t) => {
                assert_eq!(t.text, "hello");
                assert_eq!(t.font_size, DEFAULT_FONT_SIZE);
                assert_eq!(t.color, Color::BLACK);
                assert_eq!(t.at, Point::new(50.0, 100.0));
            }
            other => panic!("expected text annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_text_without_text_rejected() {
        let mut record = AnnotationRecord::text("a1", 1, 0.0, 0.0, "");
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::EmptyText)
        );
        record.text = None;
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::EmptyText)
        );
    }

    #[test]
    fn test_page_below_one_rejected() {
        let record = AnnotationRecord::text("a1", 0, 0.0, 0.0, "x");
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::InvalidPage(0))
        );
        let record = AnnotationRecord::text("a1", -3, 0.0, 0.0, "x");
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::InvalidPage(-3))
        );
    }

    #[test]
    fn test_rect_defaults_to_highlight_yellow() {
        let record = AnnotationRecord::rect("r1", 1, 10.0, 10.0, 50.0, 20.0);
        match Annotation::from_record(&record).unwrap() {
            Annotation::Rect(r) => assert_eq!(r.color, Color::HIGHLIGHT_YELLOW),
            other => panic!("expected rect annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_rect_with_zero_dimension_rejected() {
        let record = AnnotationRecord::rect("r1", 1, 0.0, 0.0, 0.0, 20.0);
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::BadDimensions)
        );
        let record = AnnotationRecord::rect("r1", 1, 0.0, 0.0, 20.0, -1.0);
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::BadDimensions)
        );
    }

    #[test]
    fn test_malformed_color_degrades_not_rejects() {
        let record = AnnotationRecord::rect("r1", 1, 0.0, 0.0, 10.0, 10.0).with_color("notahex");
        match Annotation::from_record(&record).unwrap() {
            Annotation::Rect(r) => assert_eq!(r.color, Color::BLACK),
            other => panic!("expected rect annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_image_data_uri_png() {
        let payload = format!("data:image/png;base64,{}", TINY_PNG_B64);
        let record = AnnotationRecord::image("i1", 1, 0.0, 0.0, 10.0, 10.0, &payload);
        match Annotation::from_record(&record).unwrap() {
            Annotation::Image(i) => {
                assert_eq!(i.format, RasterFormat::Png);
                assert_eq!(&i.data[1..4], b"PNG");
            }
            other => panic!("expected image annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_image_non_png_uri_hints_jpeg() {
        let payload = format!("data:image/jpeg;base64,{}", TINY_PNG_B64);
        let record = AnnotationRecord::image("i1", 1, 0.0, 0.0, 10.0, 10.0, &payload);
        match Annotation::from_record(&record).unwrap() {
            Annotation::Image(i) => assert_eq!(i.format, RasterFormat::Jpeg),
            other => panic!("expected image annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_base64_sniffs_png() {
        let record = AnnotationRecord::image("i1", 1, 0.0, 0.0, 10.0, 10.0, TINY_PNG_B64);
        match Annotation::from_record(&record).unwrap() {
            Annotation::Image(i) => assert_eq!(i.format, RasterFormat::Png),
            other => panic!("expected image annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_image_bad_base64_rejected() {
        let record = AnnotationRecord::image("i1", 1, 0.0, 0.0, 10.0, 10.0, "!!!not-base64!!!");
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::BadImagePayload)
        );
    }

    #[test]
    fn test_path_parsed_at_validation_time() {
        let record = AnnotationRecord::path("p1", 2, 5.0, 5.0, "M 0 0 L 10 10");
        match Annotation::from_record(&record).unwrap() {
            Annotation::Path(p) => {
                assert_eq!(p.commands.len(), 2);
                assert_eq!(p.stroke_width, DEFAULT_STROKE_WIDTH);
                assert_eq!(p.page, 2);
            }
            other => panic!("expected path annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_path_data_rejected() {
        let record = AnnotationRecord::path("p1", 1, 0.0, 0.0, "L 10 10");
        assert_eq!(
            Annotation::from_record(&record),
            Err(Rejection::BadPathData(PathDataError::MissingMoveTo))
        );
    }

    #[test]
    fn test_wire_format_field_names() {
        let json = r##"{
            "id": "a1", "type": "text", "page": 1, "x": 10.5, "y": 20.0,
            "text": "note", "fontSize": 18, "color": "#ff0000"
        }"##;
        let record: AnnotationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, AnnotationKind::Text);
        assert_eq!(record.font_size, Some(18.0));

        let json = r#"{
            "id": "p1", "type": "path", "page": 2, "x": 0, "y": 0,
            "path": "M 0 0 L 5 5", "strokeWidth": 3
        }"#;
        let record: AnnotationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, AnnotationKind::Path);
        assert_eq!(record.stroke_width, Some(3.0));
    }

    #[test]
    fn test_wire_round_trip() {
        let record = AnnotationRecord::rect("r9", 3, 1.0, 2.0, 30.0, 40.0).with_color("#00ff00");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"rect\""));
        let back: AnnotationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.page, 3);
        assert_eq!(back.width, Some(30.0));
        assert_eq!(back.color.as_deref(), Some("#00ff00"));
    }
}
