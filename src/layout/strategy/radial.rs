//! Concentric placement by priority
//!
//! The highest-priority element takes the center of the safe area; the rest
//! fill rings outward in descending priority, so importance reads as
//! distance from the middle. Deterministic, starting at twelve o'clock and
//! going clockwise.

use std::f64::consts::{FRAC_PI_2, TAU};

use super::{finish_placement, LayoutStrategy, SolveContext, StrategyKind, StrategyOutput};
use crate::geometry::Point;

pub struct RadialStrategy;

impl RadialStrategy {
    /// Movable elements by descending priority, input order on ties
    fn by_priority(ctx: &SolveContext<'_>) -> Vec<usize> {
        let elements = ctx.scene.elements();
        let mut order = ctx.movable_indices();
        order.sort_by(|&a, &b| {
            elements[b]
                .priority
                .cmp(&elements[a].priority)
                .then(a.cmp(&b))
        });
        order
    }
}

impl LayoutStrategy for RadialStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Radial
    }

    fn solve(&self, ctx: &SolveContext<'_>) -> StrategyOutput {
        let mut centers = ctx.initial.to_vec();
        let order = Self::by_priority(ctx);
        let Some((&hub, rest)) = order.split_first() else {
            return finish_placement(ctx, centers);
        };

        let elements = ctx.scene.elements();
        // Half diagonal: the circle that encloses the box
        let half_extent = |i: usize| elements[i].width().hypot(elements[i].height()) / 2.0;
        let origin = ctx.safe_area().center();
        centers[hub] = origin;

        let r_max = rest.iter().map(|&i| half_extent(i)).fold(0.0, f64::max);
        let slot = 2.0 * r_max + ctx.spacing;
        let mut radius = half_extent(hub) + ctx.spacing + r_max;
        let mut remaining = rest;
        let mut rings = 0;
        while !remaining.is_empty() {
            let capacity = ((TAU * radius / slot).floor() as usize).max(1);
            let count = capacity.min(remaining.len());
            let (ring, tail) = remaining.split_at(count);
            for (k, &i) in ring.iter().enumerate() {
                let angle = FRAC_PI_2 - TAU * k as f64 / count as f64;
                centers[i] = Point::new(
                    origin.x + radius * angle.cos(),
                    origin.y + radius * angle.sin(),
                );
            }
            remaining = tail;
            radius += slot;
            rings += 1;
        }
        tracing::debug!(hub = %elements[hub].id, rings, "radial rings placed");

        finish_placement(ctx, centers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, CollisionDetector};
    use crate::layout::constraints::ConstraintSystem;
    use crate::scene::{Canvas, Element, ElementKind, Scene};

    fn scene_with_priorities(priorities: &[i32]) -> Scene {
        let elements = priorities
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                Element::new(
                    format!("e{}", i),
                    ElementKind::Shape,
                    BoundingBox::from_center(Point::new(i as f64 * 0.1, 0.0), 0.8, 0.6),
                )
                .with_priority(p)
            })
            .collect();
        Scene::new(Canvas::default(), elements, ConstraintSystem::new()).unwrap()
    }

    #[test]
    fn test_highest_priority_takes_center() {
        let scene = scene_with_priorities(&[1, 1, 9, 1, 1, 1, 1, 1]);
        let constraints = scene.resolved_constraints().clone();
        let detector = CollisionDetector::default();
        let initial = scene.original_centers();
        let ctx = SolveContext::new(&scene, &constraints, &detector, &initial);

        let out = RadialStrategy.solve(&ctx);
        let hub = out.centers[2].length();
        for (i, c) in out.centers.iter().enumerate() {
            if i != 2 {
                assert!(hub < c.length(), "element {} is closer to the center than the hub", i);
            }
        }
        assert!(out.converged);
        let items = scene.collision_items(&out.centers);
        assert!(detector.overlaps(&items).is_empty());
    }

    #[test]
    fn test_rings_follow_priority() {
        let scene = scene_with_priorities(&[10, 1, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5]);
        let constraints = scene.resolved_constraints().clone();
        let detector = CollisionDetector::default();
        let initial = scene.original_centers();
        let ctx = SolveContext::new(&scene, &constraints, &detector, &initial);

        let out = RadialStrategy.solve(&ctx);
        let hub = out.centers[0];
        let lowest = out.centers[1].distance(&hub);
        let inner = out.centers[2].distance(&hub);
        assert!(lowest > inner);
    }
}
