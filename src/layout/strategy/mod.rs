//! Layout strategies
//!
//! Every strategy turns a [`SolveContext`] into new element centers. The set
//! of strategies is closed ([`StrategyKind`]), so dispatch is a `match`
//! rather than a trait object.
//!
//! Shared rules: locked and background elements never move, and free
//! elements end inside the canvas safe area whenever they fit.

pub mod force;
pub mod grid;
pub mod hierarchical;
pub mod radial;

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use force::{ForceDirected, PhysicsParams};
pub use grid::GridStrategy;
pub use hierarchical::HierarchicalStrategy;
pub use radial::RadialStrategy;

use super::constraints::ResolvedConstraints;
use super::projection::project_linear;
use crate::geometry::{clamp_center, intersects, separation, BoundingBox, CollisionDetector, Point, EPSILON};
use crate::scene::{windows_overlap, Scene};

/// Passes of the overlap nudge that follows deterministic placement
const NUDGE_PASSES: usize = 50;

/// Rounds of constraint relaxation after the nudge
const RELAX_ROUNDS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Grid,
    Hierarchical,
    Radial,
    ForceDirected,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Grid => "grid",
            StrategyKind::Hierarchical => "hierarchical",
            StrategyKind::Radial => "radial",
            StrategyKind::ForceDirected => "force_directed",
        }
    }

    pub fn solve(self, ctx: &SolveContext<'_>) -> StrategyOutput {
        match self {
            StrategyKind::Grid => GridStrategy.solve(ctx),
            StrategyKind::Hierarchical => HierarchicalStrategy.solve(ctx),
            StrategyKind::Radial => RadialStrategy.solve(ctx),
            StrategyKind::ForceDirected => ForceDirected.solve(ctx),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-fatal outcome worth reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvergenceWarning {
    /// The force loop stopped at its iteration cap
    IterationCap {
        iterations: usize,
        residual_overlap: f64,
    },
    /// The wall-clock budget ran out before convergence
    TimeBudget { budget_ms: u64, iterations: usize },
    /// Linear constraints could not be projected exactly
    Projection { reason: String },
    /// Overlap that no pass could remove
    ResidualOverlap { pairs: usize, area: f64 },
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceWarning::IterationCap {
                iterations,
                residual_overlap,
            } => write!(
                f,
                "iteration cap of {} reached with residual overlap {:.4}",
                iterations, residual_overlap
            ),
            ConvergenceWarning::TimeBudget {
                budget_ms,
                iterations,
            } => write!(
                f,
                "time budget of {}ms exhausted after {} iterations",
                budget_ms, iterations
            ),
            ConvergenceWarning::Projection { reason } => {
                write!(f, "constraint projection skipped: {}", reason)
            }
            ConvergenceWarning::ResidualOverlap { pairs, area } => {
                write!(f, "{} pairs still overlap, total area {:.4}", pairs, area)
            }
        }
    }
}

/// Everything a strategy reads during one solve
pub struct SolveContext<'a> {
    pub scene: &'a Scene,
    /// Explicit plus implicit constraints
    pub constraints: &'a ResolvedConstraints,
    pub detector: &'a CollisionDetector,
    /// Starting centers, one per element
    pub initial: &'a [Point],
    pub physics: PhysicsParams,
    /// Target gap between neighbouring elements
    pub spacing: f64,
    pub seed: u64,
    pub project_linear: bool,
    deadline: Option<(Instant, u64)>,
}

impl<'a> SolveContext<'a> {
    pub fn new(
        scene: &'a Scene,
        constraints: &'a ResolvedConstraints,
        detector: &'a CollisionDetector,
        initial: &'a [Point],
    ) -> Self {
        Self {
            scene,
            constraints,
            detector,
            initial,
            physics: PhysicsParams::default(),
            spacing: 0.2,
            seed: 42,
            project_linear: true,
            deadline: None,
        }
    }

    pub fn with_physics(mut self, physics: PhysicsParams) -> Self {
        self.physics = physics;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_projection(mut self, enabled: bool) -> Self {
        self.project_linear = enabled;
        self
    }

    /// Stop iterating `budget_ms` after `started`
    pub fn with_deadline(mut self, started: Instant, budget_ms: u64) -> Self {
        self.deadline = Some((started + Duration::from_millis(budget_ms), budget_ms));
        self
    }

    /// Copy of this context starting from other centers
    pub fn starting_from<'b>(&self, initial: &'b [Point]) -> SolveContext<'b>
    where
        'a: 'b,
    {
        SolveContext {
            scene: self.scene,
            constraints: self.constraints,
            detector: self.detector,
            initial,
            physics: self.physics,
            spacing: self.spacing,
            seed: self.seed,
            project_linear: self.project_linear,
            deadline: self.deadline,
        }
    }

    /// Budget in milliseconds when the deadline has passed
    pub fn time_exhausted(&self) -> Option<u64> {
        match self.deadline {
            Some((deadline, budget)) if Instant::now() >= deadline => Some(budget),
            _ => None,
        }
    }

    pub fn safe_area(&self) -> BoundingBox {
        self.scene.canvas().safe_bounds()
    }

    /// Whether element `i` may be moved
    pub fn movable(&self, i: usize) -> bool {
        let element = &self.scene.elements()[i];
        !element.locked && element.kind.collidable()
    }

    /// Indices of the elements a strategy places, in input order
    pub fn movable_indices(&self) -> Vec<usize> {
        (0..self.scene.len()).filter(|&i| self.movable(i)).collect()
    }
}

/// What a strategy hands back to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    pub centers: Vec<Point>,
    pub iterations: usize,
    pub converged: bool,
    pub warnings: Vec<ConvergenceWarning>,
}

pub trait LayoutStrategy {
    fn kind(&self) -> StrategyKind;

    fn solve(&self, ctx: &SolveContext<'_>) -> StrategyOutput;
}

/// Put every element that may not move back at its input center
pub(crate) fn pin_fixed(ctx: &SolveContext<'_>, centers: &mut [Point]) {
    for (i, element) in ctx.scene.elements().iter().enumerate() {
        if !ctx.movable(i) {
            centers[i] = element.center();
        }
    }
}

/// Pull movable elements back into the safe area
pub(crate) fn clamp_movable(ctx: &SolveContext<'_>, centers: &mut [Point]) {
    let area = ctx.safe_area();
    for (i, element) in ctx.scene.elements().iter().enumerate() {
        if ctx.movable(i) {
            centers[i] = clamp_center(&area, element.width(), element.height(), centers[i]);
        }
    }
}

/// How a correction is split between two elements; fixed ones take nothing
pub(crate) fn push_shares(a_movable: bool, b_movable: bool) -> (f64, f64) {
    match (a_movable, b_movable) {
        (true, true) => (0.5, 0.5),
        (false, true) => (0.0, 1.0),
        (true, false) => (1.0, 0.0),
        (false, false) => (0.0, 0.0),
    }
}

/// Push apart every pair closer than the spacing, then clamp into the safe
/// area. Returns the number of passes that moved something.
pub(crate) fn nudge_apart(ctx: &SolveContext<'_>, centers: &mut [Point], max_passes: usize) -> usize {
    let elements = ctx.scene.elements();
    for pass in 0..max_passes {
        let items = ctx.scene.collision_items(centers);
        let pairs = ctx.detector.candidate_pairs(&items, ctx.spacing);
        let mut moved = false;
        for (i, j) in pairs {
            let (si, sj) = push_shares(ctx.movable(i), ctx.movable(j));
            if si + sj == 0.0 {
                continue;
            }
            let a = elements[i].bounds_at(centers[i]);
            let b = elements[j].bounds_at(centers[j]);
            if let Some(d) = separation(&a, &b, ctx.spacing) {
                centers[i] = centers[i].sub(d.scale(si));
                centers[j] = centers[j].add(d.scale(sj));
                moved = true;
            }
        }
        clamp_movable(ctx, centers);
        if !moved {
            return pass;
        }
    }
    max_passes
}

/// Would element `i` centered at `candidate` overlap anything on screen with it
fn collides_at(ctx: &SolveContext<'_>, centers: &[Point], i: usize, candidate: Point) -> bool {
    let elements = ctx.scene.elements();
    let moved = elements[i].bounds_at(candidate);
    let respect_timing = ctx.detector.config().respect_timing;
    elements.iter().enumerate().any(|(j, other)| {
        j != i
            && other.kind.collidable()
            && (!respect_timing || windows_overlap(elements[i].timing.as_ref(), other.timing.as_ref()))
            && intersects(&moved, &other.bounds_at(centers[j]))
    })
}

/// Move elements along their constraint attraction while that lowers the
/// penalty without creating overlap. Returns the rounds that moved something.
pub(crate) fn relax_constraints(ctx: &SolveContext<'_>, centers: &mut [Point], max_rounds: usize) -> usize {
    if ctx.constraints.is_empty() {
        return 0;
    }
    let elements = ctx.scene.elements();
    let area = ctx.safe_area();

    for round in 0..max_rounds {
        if ctx.constraints.is_satisfied(elements, centers) {
            return round;
        }
        let pull = ctx.constraints.attraction(elements, centers);
        let mut accepted = false;
        for i in ctx.movable_indices() {
            if pull[i].length() <= EPSILON {
                continue;
            }
            let before = ctx.constraints.positional_penalty(elements, centers);
            let original = centers[i];
            let mut step = pull[i];
            for _ in 0..6 {
                let candidate = clamp_center(
                    &area,
                    elements[i].width(),
                    elements[i].height(),
                    original.add(step),
                );
                if candidate.distance(&original) > EPSILON && !collides_at(ctx, centers, i, candidate) {
                    centers[i] = candidate;
                    if ctx.constraints.positional_penalty(elements, centers) < before {
                        accepted = true;
                        break;
                    }
                    centers[i] = original;
                }
                step = step.scale(0.5);
            }
        }
        if !accepted {
            return round;
        }
    }
    max_rounds
}

/// Shared tail of the deterministic strategies: exact projection of linear
/// constraints, overlap nudge, constraint relaxation
pub(crate) fn finish_placement(ctx: &SolveContext<'_>, mut centers: Vec<Point>) -> StrategyOutput {
    let mut warnings = Vec::new();
    pin_fixed(ctx, &mut centers);

    if ctx.project_linear {
        match project_linear(
            ctx.scene.elements(),
            &centers,
            ctx.constraints,
            &ctx.safe_area(),
        ) {
            Ok(projected) => centers = projected,
            Err(err) => {
                tracing::warn!(%err, "linear constraint projection failed");
                warnings.push(ConvergenceWarning::Projection {
                    reason: err.to_string(),
                });
            }
        }
    }

    let passes = nudge_apart(ctx, &mut centers, NUDGE_PASSES);
    let rounds = relax_constraints(ctx, &mut centers, RELAX_ROUNDS);
    pin_fixed(ctx, &mut centers);

    let items = ctx.scene.collision_items(&centers);
    let overlaps = ctx.detector.overlaps(&items);
    let converged = overlaps.is_empty();
    if !converged {
        let area = overlaps.iter().map(|c| c.area).sum();
        warnings.push(ConvergenceWarning::ResidualOverlap {
            pairs: overlaps.len(),
            area,
        });
    }

    StrategyOutput {
        centers,
        iterations: passes + rounds,
        converged,
        warnings,
    }
}
