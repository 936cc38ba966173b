//! Scene complexity analysis and strategy recommendation

use serde::{Deserialize, Serialize};

use super::strategy::{PhysicsParams, StrategyKind};
use crate::geometry::CollisionDetector;
use crate::scene::Scene;
use crate::tuning::ComplexityBucket;

/// Thresholds of the recommendation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Scenes with at most this many elements are laid out on a grid
    pub grid_max_elements: usize,
    /// Share of overlapping elements that calls for aggressive repulsion
    pub overlap_threshold: f64,
    /// Largest scene a radial layout is used for
    pub radial_max_elements: usize,
    /// Multiplier applied to repulsion, temperature and step when aggressive
    pub aggressive_factor: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            grid_max_elements: 3,
            overlap_threshold: 0.30,
            radial_max_elements: 12,
            aggressive_factor: 2.0,
        }
    }
}

/// Measurements of one scene and the strategy they suggest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityProfile {
    pub element_count: usize,
    /// Elements per unit of canvas area
    pub density: f64,
    /// Collidable element area over canvas area
    pub area_coverage: f64,
    /// Share of collidable elements involved in at least one overlap
    pub overlap_fraction: f64,
    /// Summed pairwise overlap area of the input
    pub overlap_area: f64,
    pub has_dependencies: bool,
    pub constraint_count: usize,
    pub recommended: StrategyKind,
    pub physics: PhysicsParams,
}

impl ComplexityProfile {
    /// Coarse key under which tuned weights are cached
    pub fn bucket(&self) -> ComplexityBucket {
        ComplexityBucket::from_profile(self)
    }
}

pub struct ComplexityAnalyzer {
    config: AnalyzerConfig,
    base_physics: PhysicsParams,
}

impl ComplexityAnalyzer {
    pub fn new(config: AnalyzerConfig, base_physics: PhysicsParams) -> Self {
        Self {
            config,
            base_physics,
        }
    }

    pub fn analyze(&self, scene: &Scene, detector: &CollisionDetector) -> ComplexityProfile {
        let canvas_area = scene.canvas().area();
        let elements = scene.elements();
        let items = scene.collision_items(&scene.original_centers());

        let collidable = elements.iter().filter(|e| e.kind.collidable()).count();
        let coverage: f64 = elements
            .iter()
            .filter(|e| e.kind.collidable())
            .map(|e| e.bounds.area())
            .sum::<f64>()
            / canvas_area;
        let overlaps = detector.overlaps(&items);
        let involved = detector.overlapping_elements(&items).len();
        let overlap_fraction = if collidable == 0 {
            0.0
        } else {
            involved as f64 / collidable as f64
        };
        let overlap_area = overlaps.iter().map(|c| c.area).sum();
        let has_dependencies = scene.has_dependencies();

        let (recommended, aggressive) = self.recommend(scene, has_dependencies, overlap_fraction);
        let physics = if aggressive {
            self.base_physics.aggressive(self.config.aggressive_factor)
        } else {
            self.base_physics
        };

        let profile = ComplexityProfile {
            element_count: elements.len(),
            density: elements.len() as f64 / canvas_area,
            area_coverage: coverage,
            overlap_fraction,
            overlap_area,
            has_dependencies,
            constraint_count: scene.constraints().len(),
            recommended,
            physics,
        };
        tracing::debug!(
            elements = profile.element_count,
            overlap = profile.overlap_fraction,
            strategy = %profile.recommended,
            aggressive,
            "scene analyzed"
        );
        profile
    }

    /// First matching rule wins
    fn recommend(&self, scene: &Scene, has_dependencies: bool, overlap_fraction: f64) -> (StrategyKind, bool) {
        let count = scene.len();
        if has_dependencies {
            return (StrategyKind::Hierarchical, false);
        }
        if count <= self.config.grid_max_elements {
            return (StrategyKind::Grid, false);
        }
        if overlap_fraction >= self.config.overlap_threshold {
            return (StrategyKind::ForceDirected, true);
        }
        if count <= self.config.radial_max_elements && has_single_top_priority(scene) {
            return (StrategyKind::Radial, false);
        }
        (StrategyKind::ForceDirected, false)
    }
}

/// Exactly one collidable element holds the strictly highest priority
fn has_single_top_priority(scene: &Scene) -> bool {
    let priorities: Vec<i32> = scene
        .elements()
        .iter()
        .filter(|e| e.kind.collidable())
        .map(|e| e.priority)
        .collect();
    let Some(&top) = priorities.iter().max() else {
        return false;
    };
    priorities.iter().filter(|&&p| p == top).count() == 1
}
