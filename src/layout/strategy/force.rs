//! Force-directed placement with thermal annealing
//!
//! Each iteration sums, per movable element:
//!
//! - repulsion: the minimum translation that restores the spacing gap to
//!   every neighbour (from the collision detector's candidate pairs)
//! - attraction: the constraint system's pull towards satisfaction
//! - boundary: the push back into the safe area
//! - jitter: a uniform random kick of the current temperature, only for
//!   elements that still overlap something
//!
//! The sum is capped at `max_step`, the temperature decays by
//! `cooling_rate`, and the loop stops on convergence (no overlap and no
//! movement) or at the hard iteration cap. Locked elements push others but
//! never move.
//!
//! Overlap left after the loop gets up to `CLEANUP_PASSES` nudge passes,
//! which are not counted as iterations. An exhausted time budget skips them.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{
    clamp_movable, nudge_apart, pin_fixed, push_shares, ConvergenceWarning, LayoutStrategy,
    SolveContext, StrategyKind, StrategyOutput,
};
use crate::geometry::{intersects, separation, Point, EPSILON};

/// Nudge passes that clean up what the simulation leaves behind
const CLEANUP_PASSES: usize = 50;

/// Weights and schedule of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParams {
    /// Share of the separating translation applied per iteration.
    ///
    /// Repulsion is a penetration model, not an inverse-distance field: a
    /// pair pushes apart by the minimum translation that restores the
    /// spacing gap, so deeper overlap pushes harder and pairs already
    /// `spacing` apart exert nothing.
    pub repulsion: f64,
    /// Share of the constraint pull applied per iteration
    pub attraction: f64,
    /// Share of the out-of-area distance pushed back per iteration
    pub boundary_strength: f64,
    /// Initial jitter amplitude
    pub temperature: f64,
    /// Temperature multiplier per iteration
    pub cooling_rate: f64,
    /// Longest move of one element in one iteration
    pub max_step: f64,
    pub max_iterations: usize,
    /// Largest move below which an overlap-free layout counts as converged
    pub convergence_epsilon: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            repulsion: 1.0,
            attraction: 0.3,
            boundary_strength: 1.0,
            temperature: 0.3,
            cooling_rate: 0.95,
            max_step: 0.5,
            max_iterations: 300,
            convergence_epsilon: 1e-4,
        }
    }
}

impl PhysicsParams {
    /// Stronger repulsion and more heat for heavily overlapping input
    pub fn aggressive(self, factor: f64) -> Self {
        Self {
            repulsion: self.repulsion * factor,
            temperature: self.temperature * factor,
            max_step: self.max_step * factor,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("repulsion", self.repulsion),
            ("boundary_strength", self.boundary_strength),
            ("max_step", self.max_step),
            ("convergence_epsilon", self.convergence_epsilon),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be finite and positive, got {}", name, value));
            }
        }
        for (name, value) in [("attraction", self.attraction), ("temperature", self.temperature)] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be finite and non-negative, got {}", name, value));
            }
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate <= 1.0) {
            return Err(format!("cooling_rate must be in (0, 1], got {}", self.cooling_rate));
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be at least 1".to_string());
        }
        Ok(())
    }
}

pub struct ForceDirected;

impl ForceDirected {
    /// Run the simulation for at most `max_iterations` with the context's
    /// physics, then nudge away what overlap is left
    pub fn simulate(ctx: &SolveContext<'_>, max_iterations: usize) -> StrategyOutput {
        let params = ctx.physics;
        let elements = ctx.scene.elements();
        let area = ctx.safe_area();
        let n = elements.len();
        let movable: Vec<bool> = (0..n).map(|i| ctx.movable(i)).collect();

        let mut centers = ctx.initial.to_vec();
        pin_fixed(ctx, &mut centers);
        let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
        let mut temperature = params.temperature;
        let mut warnings = Vec::new();
        let mut converged = false;
        let mut iterations = 0;

        while iterations < max_iterations {
            if let Some(budget_ms) = ctx.time_exhausted() {
                tracing::warn!(budget_ms, iterations, "force-directed time budget exhausted");
                warnings.push(ConvergenceWarning::TimeBudget {
                    budget_ms,
                    iterations,
                });
                break;
            }
            iterations += 1;

            let items = ctx.scene.collision_items(&centers);
            let pairs = ctx.detector.candidate_pairs(&items, ctx.spacing);
            let mut force = vec![Point::zero(); n];
            let mut overlapping = vec![false; n];

            for (i, j) in pairs {
                let (a, b) = (&items[i].bounds, &items[j].bounds);
                if intersects(a, b) {
                    overlapping[i] = true;
                    overlapping[j] = true;
                }
                if let Some(d) = separation(a, b, ctx.spacing) {
                    let (si, sj) = push_shares(movable[i], movable[j]);
                    let push = d.scale(params.repulsion);
                    force[i] = force[i].sub(push.scale(si));
                    force[j] = force[j].add(push.scale(sj));
                }
            }

            if params.attraction > 0.0 && !ctx.constraints.is_empty() {
                let pull = ctx.constraints.attraction(elements, &centers);
                for i in 0..n {
                    force[i] = force[i].add(pull[i].scale(params.attraction));
                }
            }

            let mut max_move: f64 = 0.0;
            for i in (0..n).filter(|&i| movable[i]) {
                let [left, right, bottom, top] = items[i].bounds.overflow(&area);
                force[i] = force[i].add(
                    Point::new(left - right, bottom - top).scale(params.boundary_strength),
                );

                if overlapping[i] && temperature > EPSILON {
                    let kick = Point::new(
                        rng.gen_range(-temperature..=temperature),
                        rng.gen_range(-temperature..=temperature),
                    );
                    force[i] = force[i].add(kick);
                }

                let step = force[i].clamp_length(params.max_step);
                let before = centers[i];
                centers[i] = centers[i].add(step);
                max_move = max_move.max(before.distance(&centers[i]));
            }
            clamp_movable(ctx, &mut centers);
            temperature *= params.cooling_rate;

            if !overlapping.iter().any(|&o| o) && max_move < params.convergence_epsilon {
                converged = true;
                break;
            }
        }

        let out_of_time = warnings
            .iter()
            .any(|w| matches!(w, ConvergenceWarning::TimeBudget { .. }));
        if !out_of_time {
            nudge_apart(ctx, &mut centers, CLEANUP_PASSES);
        }
        pin_fixed(ctx, &mut centers);

        let items = ctx.scene.collision_items(&centers);
        let residual: f64 = ctx.detector.total_overlap_area(&items);
        if !converged && warnings.is_empty() {
            tracing::warn!(iterations, residual, "force-directed hit its iteration cap");
            warnings.push(ConvergenceWarning::IterationCap {
                iterations,
                residual_overlap: residual,
            });
        }
        tracing::debug!(iterations, converged, residual, "force-directed finished");

        StrategyOutput {
            centers,
            iterations,
            converged: converged && residual <= EPSILON,
            warnings,
        }
    }
}

impl LayoutStrategy for ForceDirected {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ForceDirected
    }

    fn solve(&self, ctx: &SolveContext<'_>) -> StrategyOutput {
        Self::simulate(ctx, ctx.physics.max_iterations)
    }
}
