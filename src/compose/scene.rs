use std::path::PathBuf;

use crate::foundation::color::Rgb8;
use crate::foundation::error::{PosterError, PosterResult};

/// Complete description of one poster render request.
///
/// Coordinates inside the scene are normalized (0-1) against either the
/// editing canvas (text boxes, line endpoints) or the source frame
/// (selection rectangle); `canvas_width`/`canvas_height` carry the editing
/// surface's size so linear measurements (font sizes, stroke widths) can be
/// rescaled to the output resolution.
///
/// The JSON form uses camelCase field names, matching the generation request
/// surface (`backgroundMode`, `textLayers`, `selectionCoords`, ...).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosterScene {
    pub background_mode: Background,
    #[serde(default = "black")]
    pub background_color: Rgb8,
    #[serde(default = "default_gradient")]
    pub gradient_colors: [Rgb8; 2],
    #[serde(default)]
    pub gradient_direction: GradientDirection,
    /// Source video for image mode, already resolved to a real path by the
    /// request layer.
    #[serde(default)]
    pub video_path: Option<PathBuf>,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub selection_coords: SelectionRect,
    /// Blur magnitude in editing-preview units; 0 disables.
    #[serde(default)]
    pub blur: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
    #[serde(default)]
    pub text_layers: Vec<TextLayer>,
    #[serde(default)]
    pub line_elements: Vec<LineElement>,
    /// Requested output base name; sanitized and deduplicated on persist.
    pub filename: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    Image,
    Gradient,
    Solid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    Horizontal,
    #[default]
    Vertical,
    Diagonal,
}

/// Crop rectangle, normalized 0-1 against the source frame's own dimensions.
///
/// Out-of-range values are accepted and clamped at render time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for SelectionRect {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

/// One styled, possibly multi-line text block.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    /// Text content; explicit `\n` breaks lines.
    pub content: String,
    /// Bounding-box left, normalized 0-1 against the canvas.
    pub left: f64,
    /// Bounding-box top, normalized 0-1 against the canvas.
    pub top: f64,
    #[serde(default = "default_family")]
    pub font_family: String,
    /// Font size in editing-canvas units.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "white")]
    pub fill: Rgb8,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub font_style: FontStyle,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub text_align: TextAlign,
    /// Rotation in degrees. Carried for fidelity with the editing surface
    /// but not applied to glyph placement.
    #[serde(default)]
    pub angle: f64,
    /// Horizontal scale. Carried but not applied to glyph placement.
    #[serde(default = "one")]
    pub scale_x: f64,
    /// Vertical scale; multiplies into the effective font size.
    #[serde(default = "one")]
    pub scale_y: f64,
    /// Bounding-box width, normalized 0-1. Defaults to half the canvas.
    #[serde(default)]
    pub width: Option<f64>,
    /// Bounding-box height, normalized 0-1. Currently unused by layout.
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// One straight stroke between two normalized endpoints.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineElement {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default = "white")]
    pub stroke: Rgb8,
    /// Stroke width in editing-canvas units.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
}

fn black() -> Rgb8 {
    Rgb8::BLACK
}

fn white() -> Rgb8 {
    Rgb8::WHITE
}

fn default_gradient() -> [Rgb8; 2] {
    [Rgb8::BLACK, Rgb8::new(51, 51, 51)]
}

fn default_family() -> String {
    "Arial".to_string()
}

fn default_font_size() -> f64 {
    32.0
}

fn default_stroke_width() -> f64 {
    2.0
}

fn one() -> f64 {
    1.0
}

impl PosterScene {
    /// Reject scenes the compositor cannot render meaningfully.
    ///
    /// Line endpoints are deliberately not range-checked; the renderer clamps
    /// or clips them. Selection coordinates are clamped at crop time.
    pub fn validate(&self) -> PosterResult<()> {
        if !self.canvas_width.is_finite()
            || !self.canvas_height.is_finite()
            || self.canvas_width <= 0.0
            || self.canvas_height <= 0.0
        {
            return Err(PosterError::validation(
                "canvasWidth/canvasHeight must be finite and > 0",
            ));
        }
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(PosterError::validation("timestamp must be >= 0"));
        }
        if !self.blur.is_finite() || self.blur < 0.0 {
            return Err(PosterError::validation("blur must be >= 0"));
        }

        for (i, layer) in self.text_layers.iter().enumerate() {
            if !(0.0..=1.0).contains(&layer.left) || !(0.0..=1.0).contains(&layer.top) {
                return Err(PosterError::validation(format!(
                    "text layer {i}: left/top must be normalized to [0, 1]"
                )));
            }
            for (name, v) in [("width", layer.width), ("height", layer.height)] {
                if let Some(v) = v
                    && (!v.is_finite() || v < 0.0)
                {
                    return Err(PosterError::validation(format!(
                        "text layer {i}: {name} must be >= 0"
                    )));
                }
            }
            if !layer.font_size.is_finite() || layer.font_size <= 0.0 {
                return Err(PosterError::validation(format!(
                    "text layer {i}: fontSize must be > 0"
                )));
            }
        }
        Ok(())
    }
}
