//! Geometry kernel: points, axis-aligned bounding boxes and overlap math
//!
//! Every function here is pure. Degenerate boxes (zero or NaN area) never
//! collide with anything, so callers never divide by a zero area.

pub mod collision;
pub mod quadtree;

use serde::{Deserialize, Serialize};

pub use collision::{Collision, CollisionConfig, CollisionDetector, CollisionItem};
pub use quadtree::{QuadTree, QuadTreeConfig};

/// Tolerance for touching and degenerate-size checks
pub const EPSILON: f64 = 1e-9;

/// Share of the smaller box that must be covered to count as contained
pub const CONTAINED_THRESHOLD: f64 = 0.95;

/// A 2D point (or displacement vector) in canvas units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Length when the point is read as a vector
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn add(&self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(&self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(&self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    /// Shrink the vector to at most `max_len`, keeping its direction
    pub fn clamp_length(&self, max_len: f64) -> Point {
        let len = self.length();
        if len > max_len && len > EPSILON {
            self.scale(max_len / len)
        } else {
            *self
        }
    }
}

/// Axis-aligned bounding box stored as its extreme coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Box of the given size centered on `center`
    pub fn from_center(center: Point, width: f64, height: f64) -> Self {
        bounds(center, width, height, 0.0)
    }

    /// Create a zero-sized box at the origin
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Area, or 0 for inverted boxes
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }

    /// True for boxes that cannot take part in collisions
    pub fn is_degenerate(&self) -> bool {
        !self.is_finite() || self.width() <= EPSILON || self.height() <= EPSILON
    }

    /// Check if this box contains a point (edges included)
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.xmin && point.x <= self.xmax && point.y >= self.ymin && point.y <= self.ymax
    }

    /// Check if `other` lies entirely inside this box (edges included)
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    /// Strict intersection with positive overlap area
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        intersects(self, other)
    }

    /// Intersection test that also accepts shared edges
    pub fn touches_or_intersects(&self, other: &BoundingBox) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    /// Overlapping region, if the boxes overlap with positive area
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !intersects(self, other) {
            return None;
        }
        Some(BoundingBox::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        ))
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
        )
    }

    /// Grow (or shrink, for negative padding) on every side
    pub fn inflate(&self, padding: f64) -> BoundingBox {
        BoundingBox::new(
            self.xmin - padding,
            self.ymin - padding,
            self.xmax + padding,
            self.ymax + padding,
        )
    }

    /// Same size, moved so its center is `center`
    pub fn with_center(&self, center: Point) -> BoundingBox {
        bounds(center, self.width(), self.height(), 0.0)
    }

    /// Separation between two boxes.
    ///
    /// Positive when the boxes are apart (the larger of the two axis gaps),
    /// zero when touching and negative when they overlap.
    pub fn gap(&self, other: &BoundingBox) -> f64 {
        let gap_x = (other.xmin - self.xmax).max(self.xmin - other.xmax);
        let gap_y = (other.ymin - self.ymax).max(self.ymin - other.ymax);
        gap_x.max(gap_y)
    }

    /// How far this box sticks out of `outer` on each side (left, right, bottom, top)
    pub fn overflow(&self, outer: &BoundingBox) -> [f64; 4] {
        [
            (outer.xmin - self.xmin).max(0.0),
            (self.xmax - outer.xmax).max(0.0),
            (outer.ymin - self.ymin).max(0.0),
            (self.ymax - outer.ymax).max(0.0),
        ]
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::zero()
    }
}

/// Relationship between two boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    None,
    Touching,
    Overlapping,
    Contained,
}

impl CollisionKind {
    /// True for kinds with positive shared area
    pub fn has_area(self) -> bool {
        matches!(self, CollisionKind::Overlapping | CollisionKind::Contained)
    }
}

/// Box of size `width` x `height` around `center`, grown by `padding` on every side
pub fn bounds(center: Point, width: f64, height: f64, padding: f64) -> BoundingBox {
    let half_w = width / 2.0 + padding;
    let half_h = height / 2.0 + padding;
    BoundingBox::new(
        center.x - half_w,
        center.y - half_h,
        center.x + half_w,
        center.y + half_h,
    )
}

/// True when the boxes share positive area. Degenerate boxes never intersect.
pub fn intersects(a: &BoundingBox, b: &BoundingBox) -> bool {
    if a.is_degenerate() || b.is_degenerate() {
        return false;
    }
    let (w, h) = overlap_extent(a, b);
    w > EPSILON && h > EPSILON
}

/// Shared area of two boxes, never negative
pub fn overlap_area(a: &BoundingBox, b: &BoundingBox) -> f64 {
    if !intersects(a, b) {
        return 0.0;
    }
    let (w, h) = overlap_extent(a, b);
    w * h
}

/// Classify two boxes with the default containment threshold
pub fn classify(a: &BoundingBox, b: &BoundingBox) -> CollisionKind {
    classify_with_threshold(a, b, CONTAINED_THRESHOLD)
}

/// Classify two boxes.
///
/// `Contained` means the overlap covers at least `threshold` of the smaller
/// box; `Touching` means the boxes share an edge or corner without area.
pub fn classify_with_threshold(a: &BoundingBox, b: &BoundingBox, threshold: f64) -> CollisionKind {
    if a.is_degenerate() || b.is_degenerate() {
        return CollisionKind::None;
    }
    let (w, h) = overlap_extent(a, b);
    if w > EPSILON && h > EPSILON {
        let smaller = a.area().min(b.area());
        if (w * h) / smaller >= threshold {
            CollisionKind::Contained
        } else {
            CollisionKind::Overlapping
        }
    } else if w >= -EPSILON && h >= -EPSILON {
        CollisionKind::Touching
    } else {
        CollisionKind::None
    }
}

/// Minimum translation of `b` that leaves at least `gap` between it and `a`.
///
/// `None` when the boxes are already `gap` apart on some axis. Of the four
/// directions the shortest wins; ties move `b` right or up, so identical
/// boxes still separate deterministically.
pub fn separation(a: &BoundingBox, b: &BoundingBox, gap: f64) -> Option<Point> {
    let right = a.xmax - b.xmin + gap;
    let left = b.xmax - a.xmin + gap;
    let up = a.ymax - b.ymin + gap;
    let down = b.ymax - a.ymin + gap;
    if right <= EPSILON || left <= EPSILON || up <= EPSILON || down <= EPSILON {
        return None;
    }

    let dx = if right <= left { right } else { -left };
    let dy = if up <= down { up } else { -down };
    if dx.abs() <= dy.abs() {
        Some(Point::new(dx, 0.0))
    } else {
        Some(Point::new(0.0, dy))
    }
}

/// Nearest center that keeps a `width` x `height` box inside `area`.
/// Boxes larger than the area are centered on it along that axis.
pub fn clamp_center(area: &BoundingBox, width: f64, height: f64, center: Point) -> Point {
    let mid = area.center();
    let x = if width >= area.width() {
        mid.x
    } else {
        center.x.clamp(area.xmin + width / 2.0, area.xmax - width / 2.0)
    };
    let y = if height >= area.height() {
        mid.y
    } else {
        center.y.clamp(area.ymin + height / 2.0, area.ymax - height / 2.0)
    };
    Point::new(x, y)
}

fn overlap_extent(a: &BoundingBox, b: &BoundingBox) -> (f64, f64) {
    (
        a.xmax.min(b.xmax) - a.xmin.max(b.xmin),
        a.ymax.min(b.ymax) - a.ymin.max(b.ymin),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_center_round_trip() {
        let center = Point::new(1.25, -3.5);
        let bbox = bounds(center, 2.0, 0.5, 0.0);
        let back = bbox.center();
        assert!((back.x - center.x).abs() < 1e-12);
        assert!((back.y - center.y).abs() < 1e-12);
        assert!((bbox.width() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_padding() {
        let bbox = bounds(Point::zero(), 1.0, 1.0, 0.25);
        assert_eq!(bbox, BoundingBox::new(-0.75, -0.75, 0.75, 0.75));
    }

    #[test]
    fn test_overlapping_boxes() {
        let a = BoundingBox::from_center(Point::new(0.0, 0.0), 0.5, 0.5);
        let b = BoundingBox::from_center(Point::new(0.3, 0.3), 0.5, 0.5);
        assert!(intersects(&a, &b));
        assert!((overlap_area(&a, &b) - 0.04).abs() < 1e-9);
        assert_eq!(classify(&a, &b), CollisionKind::Overlapping);
    }

    #[test]
    fn test_touching_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(1.0, 0.0, 2.0, 1.0);
        assert!(!intersects(&a, &b));
        assert_eq!(overlap_area(&a, &b), 0.0);
        assert_eq!(classify(&a, &b), CollisionKind::Touching);
    }

    #[test]
    fn test_separate_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(3.0, 3.0, 4.0, 4.0);
        assert_eq!(classify(&a, &b), CollisionKind::None);
        assert!((a.gap(&b) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_contained_box() {
        let outer = BoundingBox::new(0.0, 0.0, 4.0, 4.0);
        let inner = BoundingBox::new(1.0, 1.0, 2.0, 2.0);
        assert_eq!(classify(&outer, &inner), CollisionKind::Contained);
        assert!(outer.contains_box(&inner));
    }

    #[test]
    fn test_degenerate_boxes_never_collide() {
        let flat = BoundingBox::new(0.0, 0.0, 1.0, 0.0);
        let other = BoundingBox::new(-1.0, -1.0, 2.0, 2.0);
        assert!(!intersects(&flat, &other));
        assert_eq!(overlap_area(&flat, &other), 0.0);
        assert_eq!(classify(&flat, &other), CollisionKind::None);

        let nan = BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0);
        assert_eq!(classify(&nan, &other), CollisionKind::None);
    }

    #[test]
    fn test_gap_negative_when_overlapping() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let b = BoundingBox::new(1.0, 1.0, 3.0, 3.0);
        assert!(a.gap(&b) < 0.0);
    }

    #[test]
    fn test_overflow() {
        let outer = BoundingBox::new(-1.0, -1.0, 1.0, 1.0);
        let inner = BoundingBox::new(0.5, -1.5, 1.5, 0.0);
        assert_eq!(inner.overflow(&outer), [0.0, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_separation_picks_shortest_axis() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let b = BoundingBox::new(1.5, 0.5, 3.5, 2.5);
        let d = separation(&a, &b, 0.0).unwrap();
        assert!((d.x - 0.5).abs() < 1e-12);
        assert_eq!(d.y, 0.0);

        let moved = b.with_center(b.center().add(d));
        assert!(!intersects(&a, &moved));
        assert!(separation(&a, &moved, 0.0).is_none());
    }

    #[test]
    fn test_separation_respects_gap_and_nesting() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 1.0);
        let b = BoundingBox::new(4.0, 0.2, 6.0, 0.8);
        // leaving along x would take 6.0, along y only 0.8 + gap
        let d = separation(&a, &b, 0.1).unwrap();
        assert_eq!(d.x, 0.0);
        assert!((d.y - 0.9).abs() < 1e-12);

        let apart = BoundingBox::new(0.0, 1.05, 1.0, 2.0);
        assert!(separation(&a, &apart, 0.0).is_none());
        assert!(separation(&a, &apart, 0.1).is_some());
    }

    #[test]
    fn test_separation_of_identical_boxes_is_deterministic() {
        let a = BoundingBox::from_center(Point::zero(), 1.0, 1.0);
        assert_eq!(separation(&a, &a, 0.0), Some(Point::new(1.0, 0.0)));
    }

    #[test]
    fn test_clamp_center() {
        let area = BoundingBox::new(-5.0, -3.0, 5.0, 3.0);
        let c = clamp_center(&area, 2.0, 2.0, Point::new(9.0, -9.0));
        assert_eq!(c, Point::new(4.0, -2.0));
        let wide = clamp_center(&area, 12.0, 1.0, Point::new(3.0, 0.0));
        assert_eq!(wide, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_clamp_length() {
        let v = Point::new(3.0, 4.0).clamp_length(1.0);
        assert!((v.length() - 1.0).abs() < 1e-12);
        let small = Point::new(0.1, 0.0).clamp_length(1.0);
        assert_eq!(small, Point::new(0.1, 0.0));
    }
}
