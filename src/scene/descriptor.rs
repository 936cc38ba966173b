//! Serialized scene input and auto-sizing of elements without explicit size

use serde::{Deserialize, Serialize};

use super::types::{Canvas, Element, ElementId, ElementKind, ElementStyle, TimeWindow};
use crate::geometry::{BoundingBox, Point};
use crate::layout::constraints::Constraint;

/// Default element sizes, in canvas units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Advance width of one character at `reference_font_size`
    pub char_width: f64,
    /// Advance width of one equation source character
    pub equation_char_width: f64,
    /// Height of one text line at `reference_font_size`
    pub line_height: f64,
    pub reference_font_size: f64,
    pub shape_size: (f64, f64),
    pub graph_size: (f64, f64),
    pub image_size: (f64, f64),
    /// Smallest width or height an auto-sized element gets
    pub min_size: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            char_width: 0.22,
            equation_char_width: 0.18,
            line_height: 0.5,
            reference_font_size: 24.0,
            shape_size: (1.0, 1.0),
            graph_size: (4.0, 3.0),
            image_size: (3.0, 2.0),
            min_size: 0.2,
        }
    }
}

impl SizingConfig {
    /// Size an element from its kind, content and font size
    pub fn auto_size(
        &self,
        kind: ElementKind,
        content: Option<&str>,
        font_size: Option<f64>,
        canvas: &Canvas,
    ) -> (f64, f64) {
        let scale = font_size.unwrap_or(self.reference_font_size) / self.reference_font_size;
        let (width, height) = match kind {
            ElementKind::Background => return (canvas.width, canvas.height),
            ElementKind::Shape => self.shape_size,
            ElementKind::Graph => self.graph_size,
            ElementKind::Image => self.image_size,
            ElementKind::Text | ElementKind::Label | ElementKind::Annotation => {
                let text = content.unwrap_or("");
                let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                let lines = text.lines().count().max(1);
                (
                    longest as f64 * self.char_width * scale,
                    lines as f64 * self.line_height * scale,
                )
            }
            ElementKind::Equation => {
                let chars = content.map(|c| c.chars().filter(|ch| !ch.is_whitespace()).count());
                (
                    chars.unwrap_or(0) as f64 * self.equation_char_width * scale,
                    self.line_height * 1.6 * scale,
                )
            }
        };
        (
            width.max(self.min_size).min(canvas.width),
            height.max(self.min_size).min(canvas.height),
        )
    }
}

/// One element as produced by the upstream content step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: String,
    #[serde(default)]
    pub kind: ElementKind,
    #[serde(default)]
    pub content: Option<String>,
    /// Explicit center; defaults to the canvas center
    #[serde(default)]
    pub position: Option<[f64; 2]>,
    /// Explicit width and height; auto-sized when absent
    #[serde(default)]
    pub size: Option<[f64; 2]>,
    #[serde(default)]
    pub style: ElementStyle,
    #[serde(default)]
    pub timing: Option<TimeWindow>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub priority: i32,
}

impl ElementDescriptor {
    pub fn into_element(self, canvas: &Canvas, sizing: &SizingConfig) -> Element {
        let (width, height) = match self.size {
            Some([w, h]) => (w, h),
            None => sizing.auto_size(
                self.kind,
                self.content.as_deref(),
                self.style.font_size,
                canvas,
            ),
        };
        let center = self
            .position
            .map(|[x, y]| Point::new(x, y))
            .unwrap_or(canvas.center);

        Element {
            id: ElementId::new(self.id),
            kind: self.kind,
            bounds: BoundingBox::from_center(center, width, height),
            locked: self.locked,
            dependencies: self.depends_on.into_iter().map(ElementId::new).collect(),
            priority: self.priority,
            timing: self.timing,
            content: self.content,
            style: self.style,
        }
    }
}

/// A whole scene as read from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub canvas: Option<Canvas>,
    pub elements: Vec<ElementDescriptor>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// Several independent scenes, e.g. every scene of one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneBatch {
    pub scenes: Vec<SceneDescriptor>,
}
