//! Pairwise collision detection and classification
//!
//! Small element sets are checked pairwise. Above `index_threshold` elements
//! the candidates come from a quad-tree, and only those pairs get the exact
//! geometry check. Both paths return the same pairs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::quadtree::{QuadTree, QuadTreeConfig};
use super::{classify_with_threshold, overlap_area, BoundingBox, CollisionKind, CONTAINED_THRESHOLD};
use crate::error::SpatialIndexError;
use crate::scene::{windows_overlap, TimeWindow};

/// Collision detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Element count above which the quad-tree replaces pairwise checks
    pub index_threshold: usize,
    pub quadtree: QuadTreeConfig,
    /// Overlap share of the smaller box that classifies as contained
    pub contained_threshold: f64,
    /// Ignore pairs whose timing windows never coincide
    pub respect_timing: bool,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            index_threshold: 20,
            quadtree: QuadTreeConfig::default(),
            contained_threshold: CONTAINED_THRESHOLD,
            respect_timing: true,
        }
    }
}

/// One entry handed to the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionItem {
    pub bounds: BoundingBox,
    pub window: Option<TimeWindow>,
    pub collidable: bool,
}

impl CollisionItem {
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            window: None,
            collidable: true,
        }
    }

    pub fn with_window(mut self, window: Option<TimeWindow>) -> Self {
        self.window = window;
        self
    }

    pub fn with_collidable(mut self, collidable: bool) -> Self {
        self.collidable = collidable;
        self
    }

    fn eligible(&self) -> bool {
        self.collidable && !self.bounds.is_degenerate()
    }
}

/// A classified pair, indices refer to the input slice (`a < b`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Collision {
    pub a: usize,
    pub b: usize,
    pub kind: CollisionKind,
    pub area: f64,
}

pub struct CollisionDetector {
    config: CollisionConfig,
}

impl Default for CollisionDetector {
    fn default() -> Self {
        Self::new(CollisionConfig::default())
    }
}

impl CollisionDetector {
    pub fn new(config: CollisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// Whether a set of `count` elements is routed through the quad-tree
    pub fn uses_index(&self, count: usize) -> bool {
        count > self.config.index_threshold
    }

    /// Every pair whose boxes come within `margin` of each other
    pub fn candidate_pairs(&self, items: &[CollisionItem], margin: f64) -> Vec<(usize, usize)> {
        let pairs = if self.uses_index(items.len()) {
            match self.indexed_pairs(items, margin, self.config.quadtree) {
                Ok(pairs) => pairs,
                Err(err) => {
                    tracing::warn!(%err, "spatial index inconsistent, rebuilding without subdivision");
                    self.indexed_pairs(items, margin, self.config.quadtree.flat())
                        .unwrap_or_else(|err| {
                            tracing::warn!(%err, "index rebuild failed, using pairwise checks");
                            self.naive_pairs(items, margin)
                        })
                }
            }
        } else {
            self.naive_pairs(items, margin)
        };

        if !self.config.respect_timing {
            return pairs;
        }
        pairs
            .into_iter()
            .filter(|&(i, j)| windows_overlap(items[i].window.as_ref(), items[j].window.as_ref()))
            .collect()
    }

    /// All touching, overlapping and contained pairs
    pub fn detect(&self, items: &[CollisionItem]) -> Vec<Collision> {
        self.candidate_pairs(items, 0.0)
            .into_iter()
            .filter_map(|(a, b)| {
                let kind = classify_with_threshold(
                    &items[a].bounds,
                    &items[b].bounds,
                    self.config.contained_threshold,
                );
                if kind == CollisionKind::None {
                    return None;
                }
                Some(Collision {
                    a,
                    b,
                    kind,
                    area: overlap_area(&items[a].bounds, &items[b].bounds),
                })
            })
            .collect()
    }

    /// Pairs that share positive area
    pub fn overlaps(&self, items: &[CollisionItem]) -> Vec<Collision> {
        self.detect(items)
            .into_iter()
            .filter(|c| c.kind.has_area())
            .collect()
    }

    /// Sum of pairwise overlap areas
    pub fn total_overlap_area(&self, items: &[CollisionItem]) -> f64 {
        self.overlaps(items).iter().map(|c| c.area).sum()
    }

    /// Indices of elements involved in at least one overlap
    pub fn overlapping_elements(&self, items: &[CollisionItem]) -> BTreeSet<usize> {
        self.overlaps(items)
            .iter()
            .flat_map(|c| [c.a, c.b])
            .collect()
    }

    fn naive_pairs(&self, items: &[CollisionItem], margin: f64) -> Vec<(usize, usize)> {
        let half = margin.max(0.0) / 2.0;
        let mut pairs = Vec::new();
        for i in 0..items.len() {
            if !items[i].eligible() {
                continue;
            }
            let a = items[i].bounds.inflate(half);
            for j in (i + 1)..items.len() {
                if !items[j].eligible() {
                    continue;
                }
                if a.touches_or_intersects(&items[j].bounds.inflate(half)) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn indexed_pairs(
        &self,
        items: &[CollisionItem],
        margin: f64,
        config: QuadTreeConfig,
    ) -> Result<Vec<(usize, usize)>, SpatialIndexError> {
        let half = margin.max(0.0) / 2.0;
        let eligible: Vec<usize> = (0..items.len()).filter(|&i| items[i].eligible()).collect();
        let Some(region) = eligible
            .iter()
            .map(|&i| items[i].bounds.inflate(half))
            .reduce(|acc, b| acc.union(&b))
        else {
            return Ok(Vec::new());
        };

        let mut tree = QuadTree::new(region, config);
        for &i in &eligible {
            tree.insert(i, items[i].bounds.inflate(half))?;
        }
        tree.validate()?;

        let mut pairs = BTreeSet::new();
        for &i in &eligible {
            for j in tree.query_collisions(&items[i].bounds.inflate(half)) {
                if j > i {
                    pairs.insert((i, j));
                }
            }
        }
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn item(x: f64, y: f64, w: f64, h: f64) -> CollisionItem {
        CollisionItem::new(BoundingBox::from_center(Point::new(x, y), w, h))
    }

    #[test]
    fn test_detects_overlap() {
        let detector = CollisionDetector::default();
        let items = vec![item(0.0, 0.0, 0.5, 0.5), item(0.3, 0.3, 0.5, 0.5)];
        let collisions = detector.detect(&items);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].kind, CollisionKind::Overlapping);
        assert!(collisions[0].area > 0.0);
    }

    #[test]
    fn test_touching_is_not_overlap() {
        let detector = CollisionDetector::default();
        let items = vec![item(0.0, 0.0, 1.0, 1.0), item(1.0, 0.0, 1.0, 1.0)];
        assert_eq!(detector.detect(&items)[0].kind, CollisionKind::Touching);
        assert!(detector.overlaps(&items).is_empty());
        assert_eq!(detector.total_overlap_area(&items), 0.0);
    }

    #[test]
    fn test_indexed_and_naive_paths_agree() {
        let indexed = CollisionDetector::new(CollisionConfig {
            index_threshold: 0,
            ..CollisionConfig::default()
        });
        let naive = CollisionDetector::new(CollisionConfig {
            index_threshold: usize::MAX,
            ..CollisionConfig::default()
        });
        let items: Vec<CollisionItem> = (0..60)
            .map(|i| {
                let x = ((i * 37) % 23) as f64 * 0.5 - 5.5;
                let y = ((i * 11) % 13) as f64 * 0.5 - 3.0;
                item(x, y, 0.9, 0.7)
            })
            .collect();
        assert!(indexed.uses_index(items.len()));
        assert_eq!(indexed.detect(&items), naive.detect(&items));
        assert_eq!(
            indexed.candidate_pairs(&items, 0.3),
            naive.candidate_pairs(&items, 0.3)
        );
    }

    #[test]
    fn test_flat_rebuild_matches_pairwise() {
        let items: Vec<CollisionItem> = (0..40)
            .map(|i| item((i % 8) as f64 * 0.7 - 2.8, (i / 8) as f64 * 0.5 - 1.0, 0.8, 0.6))
            .collect();
        let detector = CollisionDetector::new(CollisionConfig {
            index_threshold: 0,
            ..CollisionConfig::default()
        });
        let flat = detector
            .indexed_pairs(&items, 0.2, QuadTreeConfig::default().flat())
            .unwrap();
        assert_eq!(flat, detector.naive_pairs(&items, 0.2));
    }

    #[test]
    fn test_disjoint_timing_is_ignored() {
        let detector = CollisionDetector::default();
        let items = vec![
            item(0.0, 0.0, 1.0, 1.0).with_window(Some(TimeWindow::new(0.0, 2.0))),
            item(0.2, 0.0, 1.0, 1.0).with_window(Some(TimeWindow::new(2.0, 5.0))),
        ];
        assert!(detector.detect(&items).is_empty());

        let timeless = CollisionDetector::new(CollisionConfig {
            respect_timing: false,
            ..CollisionConfig::default()
        });
        assert_eq!(timeless.overlaps(&items).len(), 1);
    }

    #[test]
    fn test_non_collidable_items_are_skipped() {
        let detector = CollisionDetector::default();
        let items = vec![
            item(0.0, 0.0, 14.0, 8.0).with_collidable(false),
            item(0.0, 0.0, 1.0, 1.0),
        ];
        assert!(detector.detect(&items).is_empty());
    }

    #[test]
    fn test_margin_widens_candidates() {
        let detector = CollisionDetector::default();
        let items = vec![item(0.0, 0.0, 1.0, 1.0), item(1.2, 0.0, 1.0, 1.0)];
        assert!(detector.candidate_pairs(&items, 0.0).is_empty());
        assert_eq!(detector.candidate_pairs(&items, 0.3), vec![(0, 1)]);
    }
}
