//! Layered placement along dependency edges
//!
//! Each dependency level becomes a row, top to bottom, so every dependent
//! sits below what it depends on. Within a row elements are ordered by the
//! barycenter of their dependencies to keep edges short, and rows wider
//! than the safe area wrap. The finished arrangement is shifted back onto
//! the centroid of the input positions.

use std::cmp::Ordering;

use super::{finish_placement, LayoutStrategy, SolveContext, StrategyKind, StrategyOutput};
use crate::geometry::{BoundingBox, Point};
use crate::scene::Scene;

pub struct HierarchicalStrategy;

/// Dependency depth of every element; roots are level 0
pub fn dependency_levels(scene: &Scene) -> Vec<usize> {
    let mut levels = vec![0usize; scene.len()];
    for &i in scene.topological_order() {
        levels[i] = scene
            .dependency_indices(i)
            .map(|d| levels[d] + 1)
            .max()
            .unwrap_or(0);
    }
    levels
}

impl HierarchicalStrategy {
    fn order_row(ctx: &SolveContext<'_>, centers: &[Point], row: &mut [usize]) {
        let key = |i: usize| -> f64 {
            let xs: Vec<f64> = ctx.scene.dependency_indices(i).map(|d| centers[d].x).collect();
            if xs.is_empty() {
                ctx.initial[i].x
            } else {
                xs.iter().sum::<f64>() / xs.len() as f64
            }
        };
        row.sort_by(|&a, &b| {
            key(a)
                .partial_cmp(&key(b))
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });
    }

    /// Split a row into lines that fit `max_width`
    fn wrap(ctx: &SolveContext<'_>, row: &[usize], max_width: f64) -> Vec<Vec<usize>> {
        let elements = ctx.scene.elements();
        let mut lines: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut width = 0.0;
        for &i in row {
            let w = elements[i].width();
            let needed = if current.is_empty() { w } else { width + ctx.spacing + w };
            if !current.is_empty() && needed > max_width {
                lines.push(std::mem::take(&mut current));
                width = w;
            } else {
                width = needed;
            }
            current.push(i);
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// Shift the movable elements towards `target` without leaving `area`
    fn recenter(ctx: &SolveContext<'_>, centers: &mut [Point], movable: &[usize], area: &BoundingBox) {
        let n = movable.len() as f64;
        let target = movable
            .iter()
            .fold(Point::zero(), |acc, &i| acc.add(ctx.initial[i]))
            .scale(1.0 / n);
        let current = movable
            .iter()
            .fold(Point::zero(), |acc, &i| acc.add(centers[i]))
            .scale(1.0 / n);
        let Some(extent) = movable
            .iter()
            .map(|&i| ctx.scene.bounds_at(i, centers[i]))
            .reduce(|acc, b| acc.union(&b))
        else {
            return;
        };

        let clamp_shift = |shift: f64, low: f64, high: f64| {
            if low <= high {
                shift.clamp(low, high)
            } else {
                0.0
            }
        };
        let dx = clamp_shift(
            target.x - current.x,
            area.xmin - extent.xmin,
            area.xmax - extent.xmax,
        );
        let dy = clamp_shift(
            target.y - current.y,
            area.ymin - extent.ymin,
            area.ymax - extent.ymax,
        );
        let shift = Point::new(dx, dy);
        for &i in movable {
            centers[i] = centers[i].add(shift);
        }
    }
}

impl LayoutStrategy for HierarchicalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hierarchical
    }

    fn solve(&self, ctx: &SolveContext<'_>) -> StrategyOutput {
        let mut centers = ctx.initial.to_vec();
        let movable = ctx.movable_indices();
        if movable.is_empty() {
            return finish_placement(ctx, centers);
        }

        let levels = dependency_levels(ctx.scene);
        let depth = movable.iter().map(|&i| levels[i]).max().unwrap_or(0);
        let area = ctx.safe_area();
        let elements = ctx.scene.elements();

        let mut cursor = area.ymax;
        for level in 0..=depth {
            let mut row: Vec<usize> = ctx
                .scene
                .topological_order()
                .iter()
                .copied()
                .filter(|&i| levels[i] == level && ctx.movable(i))
                .collect();
            if row.is_empty() {
                continue;
            }
            Self::order_row(ctx, &centers, &mut row);

            for line in Self::wrap(ctx, &row, area.width()) {
                let width: f64 = line.iter().map(|&i| elements[i].width()).sum::<f64>()
                    + ctx.spacing * (line.len() - 1) as f64;
                let height = line
                    .iter()
                    .map(|&i| elements[i].height())
                    .fold(0.0, f64::max);
                let y = cursor - height / 2.0;
                let mut x = area.center().x - width / 2.0;
                for &i in &line {
                    let w = elements[i].width();
                    centers[i] = Point::new(x + w / 2.0, y);
                    x += w + ctx.spacing;
                }
                cursor -= height + ctx.spacing;
            }
        }
        tracing::debug!(levels = depth + 1, "hierarchical rows placed");

        Self::recenter(ctx, &mut centers, &movable, &area);
        finish_placement(ctx, centers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CollisionDetector;
    use crate::layout::constraints::{Constraint, ConstraintSystem};
    use crate::scene::{Canvas, Element, ElementKind};

    fn small(id: &str) -> Element {
        Element::new(
            id,
            ElementKind::Text,
            BoundingBox::from_center(Point::zero(), 0.4, 0.3),
        )
    }

    #[test]
    fn test_levels() {
        let scene = Scene::new(
            Canvas::default(),
            vec![
                small("a"),
                small("b").with_dependency("a"),
                small("c").with_dependency("b"),
                small("d").with_dependency("a"),
            ],
            ConstraintSystem::new(),
        )
        .unwrap();
        assert_eq!(dependency_levels(&scene), vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_dependents_sit_below() {
        let scene = Scene::new(
            Canvas::default(),
            vec![
                small("title"),
                small("body").with_dependency("title"),
                small("note").with_dependency("body"),
            ],
            ConstraintSystem::new(),
        )
        .unwrap();
        let constraints = scene.resolved_constraints().clone();
        let detector = CollisionDetector::default();
        let initial = scene.original_centers();
        let ctx = SolveContext::new(&scene, &constraints, &detector, &initial);

        let out = HierarchicalStrategy.solve(&ctx);
        assert!(out.converged);
        assert!(out.centers[1].y < out.centers[0].y);
        assert!(out.centers[2].y < out.centers[1].y);
        // re-centered on the shared input position
        let mean_y = out.centers.iter().map(|c| c.y).sum::<f64>() / 3.0;
        assert!(mean_y.abs() < 1e-9);
    }

    #[test]
    fn test_proximity_is_relaxed_towards_dependency() {
        let scene = Scene::new(
            Canvas::default(),
            vec![
                Element::new("a", ElementKind::Shape, BoundingBox::from_center(Point::zero(), 0.5, 0.5)),
                Element::new("b", ElementKind::Shape, BoundingBox::from_center(Point::zero(), 0.5, 0.5))
                    .with_dependency("a"),
            ],
            ConstraintSystem::new().with(Constraint::proximity("a", "b", 0.5)),
        )
        .unwrap();
        let constraints = scene.resolved_constraints().clone();
        let detector = CollisionDetector::default();
        let initial = scene.original_centers();
        let ctx = SolveContext::new(&scene, &constraints, &detector, &initial);

        let out = HierarchicalStrategy.solve(&ctx);
        assert!(out.centers[0].distance(&out.centers[1]) <= 0.5 + 1e-6);
        assert!(out.centers[1].y < out.centers[0].y);
        let items = scene.collision_items(&out.centers);
        assert!(detector.overlaps(&items).is_empty());
    }

    #[test]
    fn test_wide_rows_wrap() {
        let elements: Vec<Element> = (0..6)
            .map(|i| {
                Element::new(
                    format!("w{}", i),
                    ElementKind::Shape,
                    BoundingBox::from_center(Point::zero(), 4.0, 0.5),
                )
            })
            .collect();
        let scene = Scene::new(Canvas::default(), elements, ConstraintSystem::new()).unwrap();
        let constraints = scene.resolved_constraints().clone();
        let detector = CollisionDetector::default();
        let initial = scene.original_centers();
        let ctx = SolveContext::new(&scene, &constraints, &detector, &initial);

        let out = HierarchicalStrategy.solve(&ctx);
        let area = scene.canvas().safe_bounds();
        for (i, c) in out.centers.iter().enumerate() {
            assert!(area.contains_box(&scene.bounds_at(i, *c)));
        }
        assert!(out.converged);
    }
}
