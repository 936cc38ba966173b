//! Post-render telemetry consumed by the QA engine

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::BoundingBox;
use crate::layers::LayerTier;
use crate::scene::{ElementKind, TimeWindow};

/// One element as it appeared in one rendered frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSample {
    pub id: String,
    #[serde(default)]
    pub kind: ElementKind,
    pub bounds: BoundingBox,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub tier: Option<LayerTier>,
    #[serde(default)]
    pub font_size: Option<f64>,
    /// WCAG contrast ratio against what lies behind the element
    #[serde(default)]
    pub contrast_ratio: Option<f64>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl ElementSample {
    pub fn new(id: impl Into<String>, kind: ElementKind, bounds: BoundingBox) -> Self {
        Self {
            id: id.into(),
            kind,
            bounds,
            z_index: 0,
            tier: None,
            font_size: None,
            contrast_ratio: None,
            opacity: 1.0,
            visible: true,
        }
    }

    pub fn with_layer(mut self, tier: LayerTier, z_index: i32) -> Self {
        self.tier = Some(tier);
        self.z_index = z_index;
        self
    }

    pub fn with_text(mut self, font_size: f64, contrast_ratio: f64) -> Self {
        self.font_size = Some(font_size);
        self.contrast_ratio = Some(contrast_ratio);
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Drawn and not fully transparent
    pub fn is_shown(&self) -> bool {
        self.visible && self.opacity > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTelemetry {
    pub index: usize,
    /// Timestamp in seconds
    pub time: f64,
    pub elements: Vec<ElementSample>,
}

/// When a text was on screen versus when the narration spoke it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTiming {
    pub element: String,
    pub display: TimeWindow,
    pub narration: TimeWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub frames: Vec<FrameTelemetry>,
    #[serde(default)]
    pub text_timings: Vec<TextTiming>,
}

impl Telemetry {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}
