//! Multi-metric layout scoring
//!
//! Every score lies in `[0, 1]`, higher is better. The overall score blends
//! them with one [`EvaluationWeights`] table, overlap weighing most.

use serde::{Deserialize, Serialize};

use crate::geometry::{CollisionDetector, Point, EPSILON};
use crate::scene::Scene;

/// Relative weight of each score in the overall blend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationWeights {
    pub overlap: f64,
    pub boundary: f64,
    pub displacement: f64,
    pub spacing: f64,
    pub compactness: f64,
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        Self {
            overlap: 0.40,
            boundary: 0.20,
            displacement: 0.15,
            spacing: 0.15,
            compactness: 0.10,
        }
    }
}

impl EvaluationWeights {
    pub fn total(&self) -> f64 {
        self.overlap + self.boundary + self.displacement + self.spacing + self.compactness
    }

    pub fn validate(&self) -> Result<(), String> {
        let all = [
            self.overlap,
            self.boundary,
            self.displacement,
            self.spacing,
            self.compactness,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("weights must be finite and non-negative".to_string());
        }
        if self.total() <= 0.0 {
            return Err("at least one weight must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutScores {
    /// 1 - residual overlap area / total collidable area
    pub overlap: f64,
    /// 1 - mean movement / canvas diagonal
    pub displacement: f64,
    /// 1 - share of elements leaving the canvas
    pub boundary: f64,
    /// Smallest gap between on-screen neighbours over the target spacing
    pub spacing: f64,
    /// Element area over the area of their common bounding box
    pub compactness: f64,
    pub overall: f64,
    /// Summed pairwise overlap area
    pub residual_overlap: f64,
}

pub struct LayoutEvaluator {
    weights: EvaluationWeights,
    target_spacing: f64,
}

impl LayoutEvaluator {
    pub fn new(weights: EvaluationWeights, target_spacing: f64) -> Self {
        Self {
            weights,
            target_spacing,
        }
    }

    pub fn weights(&self) -> &EvaluationWeights {
        &self.weights
    }

    /// Score `centers` against the scene's input positions
    pub fn evaluate(&self, scene: &Scene, detector: &CollisionDetector, centers: &[Point]) -> LayoutScores {
        let elements = scene.elements();
        let items = scene.collision_items(centers);

        let residual_overlap = detector.total_overlap_area(&items);
        let total_area: f64 = items
            .iter()
            .filter(|item| item.collidable)
            .map(|item| item.bounds.area())
            .sum();
        let overlap = if total_area > EPSILON {
            (1.0 - residual_overlap / total_area).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let displacement = if elements.is_empty() {
            1.0
        } else {
            let mean = elements
                .iter()
                .zip(centers)
                .map(|(e, c)| e.center().distance(c))
                .sum::<f64>()
                / elements.len() as f64;
            (1.0 - mean / scene.canvas().diagonal()).clamp(0.0, 1.0)
        };

        let canvas = scene.canvas().bounds().inflate(EPSILON);
        let outside = items
            .iter()
            .filter(|item| !canvas.contains_box(&item.bounds))
            .count();
        let boundary = if items.is_empty() {
            1.0
        } else {
            1.0 - outside as f64 / items.len() as f64
        };

        let spacing = self.spacing_score(detector, &items);

        let footprint = items
            .iter()
            .filter(|item| item.collidable)
            .map(|item| item.bounds)
            .reduce(|acc, b| acc.union(&b));
        let compactness = match footprint {
            Some(extent) if extent.area() > EPSILON => (total_area / extent.area()).clamp(0.0, 1.0),
            _ => 1.0,
        };

        let w = &self.weights;
        let overall = (w.overlap * overlap
            + w.boundary * boundary
            + w.displacement * displacement
            + w.spacing * spacing
            + w.compactness * compactness)
            / w.total();

        LayoutScores {
            overlap,
            displacement,
            boundary,
            spacing,
            compactness,
            overall,
            residual_overlap,
        }
    }

    /// Only pairs within the target spacing can lower the score, so the
    /// detector's candidates are enough
    fn spacing_score(&self, detector: &CollisionDetector, items: &[crate::geometry::CollisionItem]) -> f64 {
        let candidates = detector.candidate_pairs(items, self.target_spacing);
        let min_gap = candidates
            .iter()
            .map(|&(i, j)| items[i].bounds.gap(&items[j].bounds))
            .fold(f64::INFINITY, f64::min);
        if !min_gap.is_finite() {
            return 1.0;
        }
        if self.target_spacing <= EPSILON {
            return if min_gap >= -EPSILON { 1.0 } else { 0.0 };
        }
        (min_gap / self.target_spacing).clamp(0.0, 1.0)
    }
}
