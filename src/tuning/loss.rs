//! Tuning loss
//!
//! Sign convention: every term is a cost, and quality enters as
//! `quality_weight * (1 - quality)`, so a better layout always lowers the
//! loss.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, EPSILON};
use crate::layout::SolveContext;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    pub overlap: f64,
    pub constraint: f64,
    pub boundary: f64,
    pub spacing: f64,
    pub quality: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            overlap: 4.0,
            constraint: 1.0,
            boundary: 1.0,
            spacing: 0.5,
            quality: 1.0,
        }
    }
}

impl LossWeights {
    pub fn validate(&self) -> Result<(), String> {
        let all = [
            ("overlap", self.overlap),
            ("constraint", self.constraint),
            ("boundary", self.boundary),
            ("spacing", self.spacing),
            ("quality", self.quality),
        ];
        for (name, value) in all {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("loss weight {} must be finite and non-negative", name));
            }
        }
        Ok(())
    }
}

/// Raw loss terms of one candidate layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossTerms {
    /// Residual overlap area over total collidable area
    pub overlap: f64,
    /// Positional constraint penalty
    pub constraint: f64,
    /// Summed distance by which movable elements leave the safe area
    pub boundary: f64,
    /// Mean shortfall of neighbour gaps below the target spacing, in units
    /// of the target spacing
    pub spacing: f64,
    /// Evaluator overall score in `[0, 1]`
    pub quality: f64,
}

impl LossTerms {
    pub fn measure(ctx: &SolveContext<'_>, centers: &[Point], quality: f64) -> Self {
        let scene = ctx.scene;
        let items = scene.collision_items(centers);

        let total_area: f64 = items
            .iter()
            .filter(|item| item.collidable)
            .map(|item| item.bounds.area())
            .sum();
        let overlap = if total_area > EPSILON {
            ctx.detector.total_overlap_area(&items) / total_area
        } else {
            0.0
        };

        let area = ctx.safe_area();
        let boundary = (0..scene.len())
            .filter(|&i| ctx.movable(i))
            .map(|i| items[i].bounds.overflow(&area).iter().sum::<f64>())
            .sum();

        let spacing = if ctx.spacing > EPSILON && !items.is_empty() {
            let shortfall: f64 = ctx
                .detector
                .candidate_pairs(&items, ctx.spacing)
                .into_iter()
                .map(|(i, j)| (ctx.spacing - items[i].bounds.gap(&items[j].bounds)).max(0.0))
                .sum();
            shortfall / ctx.spacing / items.len() as f64
        } else {
            0.0
        };

        Self {
            overlap,
            constraint: ctx.constraints.positional_penalty(scene.elements(), centers),
            boundary,
            spacing,
            quality: quality.clamp(0.0, 1.0),
        }
    }
}

pub fn loss(terms: &LossTerms, weights: &LossWeights) -> f64 {
    weights.overlap * terms.overlap
        + weights.constraint * terms.constraint
        + weights.boundary * terms.boundary
        + weights.spacing * terms.spacing
        + weights.quality * (1.0 - terms.quality)
}
