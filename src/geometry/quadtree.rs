//! Region quad-tree over bounding boxes
//!
//! Queries return *candidates*: every indexed box whose extent touches the
//! query box. Callers still run the exact geometry check on each candidate.

use std::collections::BTreeSet;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::BoundingBox;
use crate::error::SpatialIndexError;

/// Subdivision limits for the quad-tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadTreeConfig {
    /// Deepest level a node may be split to
    pub max_depth: usize,
    /// Items a leaf holds before it subdivides
    pub max_items_per_leaf: usize,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_items_per_leaf: 8,
        }
    }
}

impl QuadTreeConfig {
    /// Same limits without subdivision: one leaf holds everything
    pub fn flat(self) -> Self {
        Self { max_depth: 0, ..self }
    }
}

struct Node<K> {
    region: BoundingBox,
    depth: usize,
    /// Items that fit no single child stay at this level
    items: Vec<(K, BoundingBox)>,
    children: Option<Box<[Node<K>; 4]>>,
}

impl<K: Clone> Node<K> {
    fn new(region: BoundingBox, depth: usize) -> Self {
        Self {
            region,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, key: K, bbox: BoundingBox, config: &QuadTreeConfig) {
        if let Some(children) = self.children.as_mut() {
            if let Some(child) = children.iter_mut().find(|c| c.region.contains_box(&bbox)) {
                child.insert(key, bbox, config);
                return;
            }
            self.items.push((key, bbox));
            return;
        }

        self.items.push((key, bbox));
        if self.items.len() > config.max_items_per_leaf && self.depth < config.max_depth {
            self.split(config);
        }
    }

    fn split(&mut self, config: &QuadTreeConfig) {
        let c = self.region.center();
        let r = self.region;
        let depth = self.depth + 1;
        let mut children = Box::new([
            Node::new(BoundingBox::new(r.xmin, c.y, c.x, r.ymax), depth),
            Node::new(BoundingBox::new(c.x, c.y, r.xmax, r.ymax), depth),
            Node::new(BoundingBox::new(r.xmin, r.ymin, c.x, c.y), depth),
            Node::new(BoundingBox::new(c.x, r.ymin, r.xmax, c.y), depth),
        ]);

        let items = std::mem::take(&mut self.items);
        for (key, bbox) in items {
            match children.iter_mut().find(|child| child.region.contains_box(&bbox)) {
                Some(child) => child.insert(key, bbox, config),
                None => self.items.push((key, bbox)),
            }
        }
        self.children = Some(children);
    }

    fn query(&self, bbox: &BoundingBox, out: &mut Vec<K>) {
        if !self.region.touches_or_intersects(bbox) {
            return;
        }
        for (key, item) in &self.items {
            if item.touches_or_intersects(bbox) {
                out.push(key.clone());
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(bbox, out);
            }
        }
    }

    fn count(&self) -> usize {
        self.items.len()
            + self
                .children
                .as_ref()
                .map(|children| children.iter().map(Node::count).sum())
                .unwrap_or(0)
    }

    fn depth(&self) -> usize {
        self.children
            .as_ref()
            .map(|children| children.iter().map(Node::depth).max().unwrap_or(self.depth))
            .unwrap_or(self.depth)
    }
}

/// Quad-tree keyed by `K` (element index or id)
pub struct QuadTree<K> {
    root: Node<K>,
    /// Boxes not fully inside the root region
    overflow: Vec<(K, BoundingBox)>,
    keys: BTreeSet<K>,
    config: QuadTreeConfig,
}

impl<K: Clone + Ord + Debug> QuadTree<K> {
    pub fn new(region: BoundingBox, config: QuadTreeConfig) -> Self {
        Self {
            root: Node::new(region, 0),
            overflow: Vec::new(),
            keys: BTreeSet::new(),
            config,
        }
    }

    /// Index a box under `key`
    pub fn insert(&mut self, key: K, bbox: BoundingBox) -> Result<(), SpatialIndexError> {
        if !bbox.is_finite() {
            return Err(SpatialIndexError::InvalidBounds {
                key: format!("{:?}", key),
            });
        }
        if self.keys.contains(&key) {
            return Err(SpatialIndexError::DuplicateKey {
                key: format!("{:?}", key),
            });
        }
        self.keys.insert(key.clone());
        if self.root.region.contains_box(&bbox) {
            self.root.insert(key, bbox, &self.config);
        } else {
            self.overflow.push((key, bbox));
        }
        Ok(())
    }

    /// Keys of every indexed box that touches or intersects `bbox`
    pub fn query_collisions(&self, bbox: &BoundingBox) -> BTreeSet<K> {
        let mut out = Vec::new();
        self.root.query(bbox, &mut out);
        for (key, item) in &self.overflow {
            if item.touches_or_intersects(bbox) {
                out.push(key.clone());
            }
        }
        out.into_iter().collect()
    }

    /// Check that stored entries match the tracked key set
    pub fn validate(&self) -> Result<(), SpatialIndexError> {
        let found = self.root.count() + self.overflow.len();
        if found != self.keys.len() {
            return Err(SpatialIndexError::Inconsistent {
                expected: self.keys.len(),
                found,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Depth of the deepest node
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn clear(&mut self) {
        let region = self.root.region;
        self.root = Node::new(region, 0);
        self.overflow.clear();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn region() -> BoundingBox {
        BoundingBox::new(-8.0, -8.0, 8.0, 8.0)
    }

    #[test]
    fn test_query_finds_overlapping_candidates() {
        let mut tree = QuadTree::new(region(), QuadTreeConfig::default());
        tree.insert(0usize, BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        tree.insert(1usize, BoundingBox::new(5.0, 5.0, 6.0, 6.0)).unwrap();
        tree.insert(2usize, BoundingBox::new(0.5, 0.5, 1.5, 1.5)).unwrap();

        let hits = tree.query_collisions(&BoundingBox::new(0.2, 0.2, 0.8, 0.8));
        assert!(hits.contains(&0));
        assert!(hits.contains(&2));
        assert!(!hits.contains(&1));
    }

    #[test]
    fn test_subdivides_and_stays_complete() {
        let config = QuadTreeConfig {
            max_depth: 6,
            max_items_per_leaf: 2,
        };
        let mut tree = QuadTree::new(region(), config);
        let mut boxes = Vec::new();
        for i in 0..40 {
            let x = -7.0 + (i % 8) as f64 * 1.8;
            let y = -7.0 + (i / 8) as f64 * 2.5;
            let bbox = BoundingBox::from_center(Point::new(x, y), 0.8, 0.6);
            boxes.push(bbox);
            tree.insert(i, bbox).unwrap();
        }
        assert!(tree.depth() > 0);
        tree.validate().unwrap();

        // The index must never miss a pair that the naive check finds
        for (i, a) in boxes.iter().enumerate() {
            let hits = tree.query_collisions(a);
            for (j, b) in boxes.iter().enumerate() {
                if a.touches_or_intersects(b) {
                    assert!(hits.contains(&j), "missing candidate {} for {}", j, i);
                }
            }
        }
    }

    #[test]
    fn test_out_of_region_boxes_are_kept() {
        let mut tree = QuadTree::new(region(), QuadTreeConfig::default());
        tree.insert("far", BoundingBox::new(20.0, 20.0, 21.0, 21.0)).unwrap();
        let hits = tree.query_collisions(&BoundingBox::new(19.5, 19.5, 20.5, 20.5));
        assert!(hits.contains(&"far"));
        tree.validate().unwrap();
    }

    #[test]
    fn test_rejects_duplicate_and_nan() {
        let mut tree = QuadTree::new(region(), QuadTreeConfig::default());
        tree.insert(1usize, BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        assert!(matches!(
            tree.insert(1usize, BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            Err(SpatialIndexError::DuplicateKey { .. })
        ));
        assert!(matches!(
            tree.insert(2usize, BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0)),
            Err(SpatialIndexError::InvalidBounds { .. })
        ));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut tree = QuadTree::new(region(), QuadTreeConfig::default());
        tree.insert(1usize, BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.query_collisions(&region()).is_empty());
    }
}
