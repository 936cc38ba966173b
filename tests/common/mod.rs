//! Helpers shared by the integration tests
#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use scene_layout::layout::ConstraintSystem;
use scene_layout::{
    BoundingBox, Canvas, EngineConfig, Element, ElementKind, LayoutEngine, Point, Scene,
};

/// Residual overlap still counted as none
pub const OVERLAP_TOLERANCE: f64 = 1e-9;

/// Slack on soft constraints after a solve
pub const CONSTRAINT_TOLERANCE: f64 = 1e-2;

/// Position drift allowed for layouts that should not move
pub const POSITION_TOLERANCE: f64 = 1e-9;

pub fn boxed(id: &str, x: f64, y: f64, w: f64, h: f64) -> Element {
    Element::new(
        id,
        ElementKind::Shape,
        BoundingBox::from_center(Point::new(x, y), w, h),
    )
}

pub fn scene(elements: Vec<Element>) -> Scene {
    Scene::new(Canvas::default(), elements, ConstraintSystem::new())
        .unwrap_or_else(|e| panic!("scene should be valid: {}", e))
}

pub fn constrained(elements: Vec<Element>, constraints: ConstraintSystem) -> Scene {
    Scene::new(Canvas::default(), elements, constraints)
        .unwrap_or_else(|e| panic!("scene should be valid: {}", e))
}

/// `n` overlapping shapes stacked near the canvas center
pub fn pile(n: usize) -> Vec<Element> {
    (0..n)
        .map(|i| {
            let offset = (i % 4) as f64 * 0.1;
            boxed(&format!("e{}", i), offset, offset * 0.5, 0.8, 0.6)
        })
        .collect()
}

/// `n` shapes of random size at random positions inside the default canvas
pub fn random_elements(n: usize, seed: u64) -> Vec<Element> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let w = rng.gen_range(0.3..0.9);
            let h = rng.gen_range(0.2..0.6);
            let x = rng.gen_range(-6.0..6.0);
            let y = rng.gen_range(-3.4..3.4);
            boxed(&format!("r{}", i), x, y, w, h)
        })
        .collect()
}

/// Engine without weight tuning, for tests that do not exercise it
pub fn quiet_engine() -> LayoutEngine {
    LayoutEngine::new(EngineConfig::default().with_tuning(false))
}

/// Summed overlap of `scene` laid out at `centers`, recomputed from scratch
pub fn recomputed_overlap(engine: &LayoutEngine, scene: &Scene, centers: &[Point]) -> f64 {
    let items = scene.collision_items(centers);
    engine.detector().total_overlap_area(&items)
}
