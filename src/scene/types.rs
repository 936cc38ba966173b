//! Core types describing the elements of a scene

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// Unique identifier of an element within a scene
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Resolved element positions (element center), ordered by id
pub type PositionMap = BTreeMap<ElementId, Point>;

/// Category of visual content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Background,
    #[default]
    Shape,
    Graph,
    Image,
    Text,
    Equation,
    Label,
    Annotation,
}

impl ElementKind {
    /// Backgrounds sit behind everything and never count as collisions
    pub fn collidable(self) -> bool {
        !matches!(self, ElementKind::Background)
    }

    /// Kinds whose size is driven by rendered text
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ElementKind::Text | ElementKind::Equation | ElementKind::Label | ElementKind::Annotation
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Background => "background",
            ElementKind::Shape => "shape",
            ElementKind::Graph => "graph",
            ElementKind::Image => "image",
            ElementKind::Text => "text",
            ElementKind::Equation => "equation",
            ElementKind::Label => "label",
            ElementKind::Annotation => "annotation",
        }
    }
}

/// Half-open visibility window `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// True when both windows are on screen at some instant
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.end > self.start
    }
}

/// Two optional windows; a missing window means "visible for the whole scene"
pub fn windows_overlap(a: Option<&TimeWindow>, b: Option<&TimeWindow>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.overlaps(b),
        _ => true,
    }
}

/// Presentation hints that influence sizing and QA
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementStyle {
    pub font_size: Option<f64>,
    pub opacity: Option<f64>,
    pub color: Option<String>,
}

/// A positioned element as handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub bounds: BoundingBox,
    /// Locked elements are never moved by any strategy
    pub locked: bool,
    /// Elements that must be positioned and visible before this one
    pub dependencies: BTreeSet<ElementId>,
    /// Higher priority wins placement and layering conflicts
    pub priority: i32,
    pub timing: Option<TimeWindow>,
    pub content: Option<String>,
    pub style: ElementStyle,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, kind: ElementKind, bounds: BoundingBox) -> Self {
        Self {
            id: id.into(),
            kind,
            bounds,
            locked: false,
            dependencies: BTreeSet::new(),
            priority: 0,
            timing: None,
            content: None,
            style: ElementStyle::default(),
        }
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependency(mut self, id: impl Into<ElementId>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    pub fn with_timing(mut self, start: f64, end: f64) -> Self {
        self.timing = Some(TimeWindow::new(start, end));
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_style(mut self, style: ElementStyle) -> Self {
        self.style = style;
        self
    }

    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    /// Bounds of this element if its center moved to `center`
    pub fn bounds_at(&self, center: Point) -> BoundingBox {
        self.bounds.with_center(center)
    }
}

/// The drawable area shared by every element of a scene.
///
/// Coordinates follow the renderer's convention: origin at the canvas center
/// and y growing upward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub center: Point,
    /// Inset kept free of content on every side
    pub safe_margin: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 14.0,
            height: 8.0,
            center: Point::zero(),
            safe_margin: 0.2,
        }
    }
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_safe_margin(mut self, margin: f64) -> Self {
        self.safe_margin = margin;
        self
    }

    /// Full canvas extent
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_center(self.center, self.width, self.height)
    }

    /// Canvas extent minus the safe margin
    pub fn safe_bounds(&self) -> BoundingBox {
        let margin = self
            .safe_margin
            .max(0.0)
            .min(self.width / 4.0)
            .min(self.height / 4.0);
        self.bounds().inflate(-margin)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn diagonal(&self) -> f64 {
        (self.width * self.width + self.height * self.height).sqrt()
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
            && self.center.is_finite()
            && self.safe_margin.is_finite()
    }
}
