//! Uniform grid placement
//!
//! Movable elements fill a `⌈√n⌉`-column grid over the safe area in input
//! order, each centered in its cell. O(n) and fully deterministic.

use super::{finish_placement, LayoutStrategy, SolveContext, StrategyKind, StrategyOutput};
use crate::geometry::Point;

pub struct GridStrategy;

impl GridStrategy {
    /// Columns and rows for `n` cells
    pub fn dimensions(n: usize) -> (usize, usize) {
        if n == 0 {
            return (0, 0);
        }
        let cols = (n as f64).sqrt().ceil() as usize;
        let rows = n.div_ceil(cols);
        (cols, rows)
    }
}

impl LayoutStrategy for GridStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Grid
    }

    fn solve(&self, ctx: &SolveContext<'_>) -> StrategyOutput {
        let mut centers = ctx.initial.to_vec();
        let movable = ctx.movable_indices();
        let (cols, rows) = Self::dimensions(movable.len());

        if cols > 0 {
            let area = ctx.safe_area();
            let cell_w = area.width() / cols as f64;
            let cell_h = area.height() / rows as f64;
            for (slot, &i) in movable.iter().enumerate() {
                let (row, col) = (slot / cols, slot % cols);
                centers[i] = Point::new(
                    area.xmin + (col as f64 + 0.5) * cell_w,
                    area.ymax - (row as f64 + 0.5) * cell_h,
                );
            }
            tracing::debug!(cols, rows, cell_w, cell_h, "grid placement");
        }

        finish_placement(ctx, centers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, CollisionDetector};
    use crate::layout::constraints::{ConstraintSystem, ResolvedConstraints};
    use crate::scene::{Canvas, Element, ElementKind, Scene};

    #[test]
    fn test_dimensions() {
        assert_eq!(GridStrategy::dimensions(0), (0, 0));
        assert_eq!(GridStrategy::dimensions(1), (1, 1));
        assert_eq!(GridStrategy::dimensions(2), (2, 1));
        assert_eq!(GridStrategy::dimensions(5), (3, 2));
        assert_eq!(GridStrategy::dimensions(9), (3, 3));
        assert_eq!(GridStrategy::dimensions(10), (4, 3));
    }

    #[test]
    fn test_grid_separates_stacked_boxes() {
        let elements: Vec<Element> = (0..3)
            .map(|i| {
                Element::new(
                    format!("e{}", i),
                    ElementKind::Shape,
                    BoundingBox::from_center(Point::zero(), 1.0, 1.0),
                )
            })
            .collect();
        let scene = Scene::new(Canvas::default(), elements, ConstraintSystem::new()).unwrap();
        let constraints = ResolvedConstraints::default();
        let detector = CollisionDetector::default();
        let initial = scene.original_centers();
        let ctx = SolveContext::new(&scene, &constraints, &detector, &initial);

        let out = GridStrategy.solve(&ctx);
        assert!(out.converged);
        let items = scene.collision_items(&out.centers);
        assert!(detector.overlaps(&items).is_empty());
        // first row, left to right
        assert!(out.centers[0].x < out.centers[1].x);
        assert_eq!(out.centers[0].y, out.centers[1].y);
        assert!(out.centers[2].y < out.centers[0].y);

        let again = GridStrategy.solve(&ctx);
        assert_eq!(out, again);
    }
}
