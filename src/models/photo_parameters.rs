//! Typed ID-photo request.
//!
//! Mirrors the controls of the photo form (size, background, beauty
//! adjustments, watermark, output constraints) so callers can build a
//! [`ParameterBundle`] without hand-writing keys. The orchestrator itself
//! only ever sees the bundle.

use serde::{Deserialize, Serialize};

use super::parameters::ParameterBundle;

pub const DEFAULT_MATTING_MODEL: &str = "modnet_photographic_portrait_matting";
pub const DEFAULT_FACE_DETECT_MODEL: &str = "retinaface-resnet50";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhotoMode {
    /// Standard ID photo plus the HD variant
    #[default]
    IdPhoto,
    /// Only remove the background, keep the original framing
    MattingOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhotoSize {
    /// Named preset such as "one_inch"
    Preset { name: String },
    Pixels { height: u32, width: u32 },
    Millimetres { height: f64, width: f64 },
    /// Keep the input resolution
    OnlyChangeBackground,
}

impl Default for PhotoSize {
    fn default() -> Self {
        Self::Pixels {
            height: 413,
            width: 295,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Solid,
    UpDownGradient,
    CenterGradient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    /// Hex colour, e.g. "#ffffff"
    pub color: String,
    pub size: u32,
    pub opacity: f64,
    pub angle: i32,
    pub space: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoParameters {
    pub mode: PhotoMode,
    pub size: PhotoSize,
    /// Background colour as hex, e.g. "#628bce"
    pub background_color: String,
    pub render_mode: RenderMode,
    pub matting_model: String,
    pub face_detect_model: String,
    pub head_measure_ratio: f64,
    pub top_distance: f64,
    pub whitening_strength: u32,
    pub brightness_strength: i32,
    pub contrast_strength: i32,
    pub sharpen_strength: u32,
    pub saturation_strength: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
    /// Target file size for the compressed output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_kb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
    /// Also render a printable layout sheet
    #[serde(default)]
    pub layout_sheet: bool,
}

impl Default for PhotoParameters {
    fn default() -> Self {
        Self {
            mode: PhotoMode::default(),
            size: PhotoSize::default(),
            background_color: "#628bce".to_string(),
            render_mode: RenderMode::default(),
            matting_model: DEFAULT_MATTING_MODEL.to_string(),
            face_detect_model: DEFAULT_FACE_DETECT_MODEL.to_string(),
            head_measure_ratio: 0.2,
            top_distance: 0.12,
            whitening_strength: 2,
            brightness_strength: 0,
            contrast_strength: 0,
            sharpen_strength: 0,
            saturation_strength: 0,
            watermark: None,
            target_kb: None,
            dpi: None,
            layout_sheet: true,
        }
    }
}

impl PhotoParameters {
    pub fn to_bundle(&self) -> Result<ParameterBundle, serde_json::Error> {
        ParameterBundle::from_serializable(self)
    }

    pub fn from_bundle(bundle: &ParameterBundle) -> Result<Self, serde_json::Error> {
        bundle.decode()
    }
}
