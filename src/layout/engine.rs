//! The layout engine
//!
//! One solve runs these phases:
//!
//! 1. Bind constraints: the scene's own plus an ordering constraint per
//!    dependency edge.
//! 2. Analyze complexity and pick a strategy (or take the configured one).
//! 3. Return clean input unchanged: no overlap, inside the canvas,
//!    constraints satisfied. Input that is only free of overlap and inside
//!    the canvas is kept too unless the solve satisfies its constraints.
//! 4. Tune force-directed weights, reusing cached weights for similar scenes.
//! 5. Run the strategy and score the result.
//! 6. Below the acceptance score, try force-directed from the primary
//!    result and keep whichever scores better.
//! 7. Pin locked elements to their input centers.
//!
//! The engine never fails on a poor layout; quality is reported through
//! [`LayoutScores`] and [`Diagnostics`].

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::analyzer::{ComplexityAnalyzer, ComplexityProfile};
use super::constraints::{ResolvedConstraints, SATISFIED_EPSILON};
use super::evaluator::{LayoutEvaluator, LayoutScores};
use super::strategy::{pin_fixed, ConvergenceWarning, SolveContext, StrategyKind};
use crate::config::EngineConfig;
use crate::error::LayoutError;
use crate::geometry::{BoundingBox, CollisionDetector, Point, EPSILON};
use crate::layers::{ConflictResolution, LayerManager, LayerTier};
use crate::scene::{ElementId, ElementKind, PositionMap, Scene, SceneDescriptor, TimeWindow};
use crate::tuning::{Tuner, TuningDiagnostics, WeightCache};

/// How a solve went, beyond the scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub strategy: StrategyKind,
    /// The input was already clean and returned unchanged
    pub preserved: bool,
    /// The force-directed fallback replaced the primary result
    pub fallback_used: bool,
    pub iterations: usize,
    pub converged: bool,
    /// Summed pairwise overlap area of the output
    pub residual_overlap: f64,
    /// Summed pairwise overlap area of the input
    pub baseline_overlap: f64,
    /// Weighted constraint violation of the output, timing included
    pub constraint_penalty: f64,
    pub warnings: Vec<ConvergenceWarning>,
    pub tuning: Option<TuningDiagnostics>,
    pub profile: ComplexityProfile,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub scene: Option<String>,
    /// Resolved element centers
    pub positions: PositionMap,
    pub scores: LayoutScores,
    pub diagnostics: Diagnostics,
}

impl LayoutResult {
    pub fn position(&self, id: &ElementId) -> Option<Point> {
        self.positions.get(id).copied()
    }
}

/// An element with everything the renderer needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub bounds: BoundingBox,
    pub tier: LayerTier,
    pub z_index: i32,
    pub opacity: f64,
    pub locked: bool,
    pub timing: Option<TimeWindow>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneOutput {
    pub scene: Option<String>,
    pub elements: Vec<AnnotatedElement>,
    pub layers: ConflictResolution,
    pub result: LayoutResult,
}

/// Outcome of one strategy run, scored
struct Candidate {
    centers: Vec<Point>,
    iterations: usize,
    converged: bool,
    warnings: Vec<ConvergenceWarning>,
    scores: LayoutScores,
    penalty: f64,
}

pub struct LayoutEngine {
    config: EngineConfig,
    detector: CollisionDetector,
    evaluator: LayoutEvaluator,
    cache: WeightCache,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = WeightCache::new(config.tuning.cache_capacity);
        Self::with_cache(config, cache)
    }

    /// Engine sharing an existing weight cache
    pub fn with_cache(config: EngineConfig, cache: WeightCache) -> Self {
        Self {
            detector: CollisionDetector::new(config.collision.clone()),
            evaluator: LayoutEvaluator::new(config.evaluation, config.spacing),
            config,
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &WeightCache {
        &self.cache
    }

    pub fn detector(&self) -> &CollisionDetector {
        &self.detector
    }

    pub fn evaluator(&self) -> &LayoutEvaluator {
        &self.evaluator
    }

    pub fn analyze(&self, scene: &Scene) -> ComplexityProfile {
        ComplexityAnalyzer::new(self.config.analyzer.clone(), self.config.physics)
            .analyze(scene, &self.detector)
    }

    /// Scene constraints plus one ordering constraint per dependency edge
    fn bind_constraints(&self, scene: &Scene) -> ResolvedConstraints {
        let mut constraints = scene.resolved_constraints().clone();
        let weight = self.config.implicit_dependency_weight;
        if weight > 0.0 {
            for &i in scene.topological_order() {
                for dependency in scene.dependency_indices(i) {
                    constraints.push_dependency(dependency, i, weight);
                }
            }
        }
        constraints
    }

    fn score(&self, scene: &Scene, constraints: &ResolvedConstraints, centers: &[Point]) -> (LayoutScores, f64) {
        (
            self.evaluator.evaluate(scene, &self.detector, centers),
            constraints.positional_penalty(scene.elements(), centers),
        )
    }

    /// Input with no overlap that sits inside the canvas
    fn is_tidy(&self, scene: &Scene, baseline_overlap: f64) -> bool {
        let canvas = scene.canvas().bounds().inflate(EPSILON);
        baseline_overlap <= EPSILON && scene.elements().iter().all(|e| canvas.contains_box(&e.bounds))
    }

    /// The input returned unchanged
    #[allow(clippy::too_many_arguments)]
    fn preserved(
        &self,
        scene: &Scene,
        constraints: &ResolvedConstraints,
        strategy: StrategyKind,
        profile: ComplexityProfile,
        iterations: usize,
        tuning: Option<TuningDiagnostics>,
        started: Instant,
    ) -> LayoutResult {
        let original = scene.original_centers();
        let (scores, _) = self.score(scene, constraints, &original);
        LayoutResult {
            scene: scene.name().map(str::to_string),
            positions: scene.positions_from_centers(&original),
            scores,
            diagnostics: Diagnostics {
                strategy,
                preserved: true,
                fallback_used: false,
                iterations,
                converged: true,
                residual_overlap: scores.residual_overlap,
                baseline_overlap: profile.overlap_area,
                constraint_penalty: constraints.penalty(scene.elements(), &original),
                warnings: Vec::new(),
                tuning,
                profile,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        }
    }

    #[tracing::instrument(skip_all, fields(scene = scene.name().unwrap_or("unnamed"), elements = scene.len()))]
    pub fn solve(&self, scene: &Scene) -> LayoutResult {
        let started = Instant::now();
        let config = &self.config;
        let constraints = self.bind_constraints(scene);
        let profile = self.analyze(scene);
        let strategy = config.strategy.unwrap_or(profile.recommended);
        let original = scene.original_centers();
        let baseline_overlap = profile.overlap_area;

        let tidy = config.preserve_clean_layouts && self.is_tidy(scene, baseline_overlap);
        if scene.is_empty() || (tidy && constraints.is_satisfied(scene.elements(), &original)) {
            tracing::info!(%strategy, "input layout is clean, preserved");
            return self.preserved(scene, &constraints, strategy, profile, 0, None, started);
        }

        let mut ctx = SolveContext::new(scene, &constraints, &self.detector, &original)
            .with_physics(profile.physics)
            .with_spacing(config.spacing)
            .with_seed(config.seed)
            .with_projection(config.project_linear_constraints);
        if let Some(budget_ms) = config.time_budget_ms {
            ctx = ctx.with_deadline(started, budget_ms);
        }

        let mut tuning = None;
        if strategy == StrategyKind::ForceDirected && config.tuning.enabled {
            let tuner = Tuner::new(&config.tuning, &self.evaluator);
            let (params, diagnostics) = tuner.tune(&ctx, profile.bucket(), &self.cache);
            tuning = Some(diagnostics);
            ctx = ctx.with_physics(params);
        }

        let primary = self.run(&ctx, strategy);
        tracing::debug!(
            %strategy,
            overall = primary.scores.overall,
            residual = primary.scores.residual_overlap,
            "primary strategy finished"
        );

        let mut iterations = primary.iterations;
        let mut fallback_used = false;
        let mut chosen = primary;
        if chosen.scores.overall < config.acceptance_score && strategy != StrategyKind::ForceDirected {
            let from_primary = chosen.centers.clone();
            let fallback = self.run(&ctx.starting_from(&from_primary), StrategyKind::ForceDirected);
            iterations += fallback.iterations;
            tracing::debug!(
                primary = chosen.scores.overall,
                fallback = fallback.scores.overall,
                "force-directed fallback attempted"
            );
            if fallback.scores.overall > chosen.scores.overall
                && fallback.penalty <= chosen.penalty + SATISFIED_EPSILON
            {
                chosen = fallback;
                fallback_used = true;
            }
        }

        let mut centers = chosen.centers;
        pin_fixed(&ctx, &mut centers);

        // Tidy input only moves to satisfy its constraints outright
        if tidy && !constraints.is_satisfied(scene.elements(), &centers) {
            tracing::info!(
                %strategy,
                penalty = constraints.positional_penalty(scene.elements(), &centers),
                "constraints stay unmet, tidy input preserved"
            );
            return self.preserved(scene, &constraints, strategy, profile, iterations, tuning, started);
        }

        let (scores, _) = self.score(scene, &constraints, &centers);
        for warning in &chosen.warnings {
            tracing::warn!(%warning, "layout did not fully converge");
        }

        let diagnostics = Diagnostics {
            strategy,
            preserved: false,
            fallback_used,
            iterations,
            converged: chosen.converged,
            residual_overlap: scores.residual_overlap,
            baseline_overlap,
            constraint_penalty: constraints.penalty(scene.elements(), &centers),
            warnings: chosen.warnings,
            tuning,
            profile,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            %strategy,
            overall = scores.overall,
            residual = scores.residual_overlap,
            iterations,
            fallback_used,
            "scene solved"
        );

        LayoutResult {
            scene: scene.name().map(str::to_string),
            positions: scene.positions_from_centers(&centers),
            scores,
            diagnostics,
        }
    }

    fn run(&self, ctx: &SolveContext<'_>, strategy: StrategyKind) -> Candidate {
        let output = strategy.solve(ctx);
        let (scores, penalty) = self.score(ctx.scene, ctx.constraints, &output.centers);
        Candidate {
            centers: output.centers,
            iterations: output.iterations,
            converged: output.converged,
            warnings: output.warnings,
            scores,
            penalty,
        }
    }

    /// Attach geometry and layers to every element
    pub fn annotate(&self, scene: &Scene, result: &LayoutResult) -> SceneOutput {
        let mut layers = LayerManager::new(self.config.layers.clone());
        for element in scene.elements() {
            layers.assign(element.id.clone(), element.kind, element.priority);
        }
        let resolution = layers.resolve_conflicts();

        let elements = scene
            .elements()
            .iter()
            .filter_map(|element| {
                let assignment = layers.get(&element.id)?;
                let center = result.position(&element.id).unwrap_or_else(|| element.center());
                Some(AnnotatedElement {
                    id: element.id.clone(),
                    kind: element.kind,
                    center,
                    width: element.width(),
                    height: element.height(),
                    bounds: element.bounds_at(center),
                    tier: assignment.tier,
                    z_index: assignment.z_index,
                    opacity: assignment.opacity * element.style.opacity.unwrap_or(1.0),
                    locked: element.locked,
                    timing: element.timing,
                    content: element.content.clone(),
                })
            })
            .collect();

        SceneOutput {
            scene: scene.name().map(str::to_string),
            elements,
            layers: resolution,
            result: result.clone(),
        }
    }

    /// Validate, solve and annotate one serialized scene
    pub fn solve_descriptor(&self, descriptor: SceneDescriptor) -> Result<SceneOutput, LayoutError> {
        let scene = Scene::from_descriptor(descriptor, self.config.canvas, &self.config.sizing)?;
        let result = self.solve(&scene);
        Ok(self.annotate(&scene, &result))
    }

    /// Solve independent scenes in parallel, in input order. The weight
    /// cache is shared between them.
    pub fn solve_batch(&self, descriptors: Vec<SceneDescriptor>) -> Vec<Result<SceneOutput, LayoutError>> {
        descriptors
            .into_par_iter()
            .map(|descriptor| self.solve_descriptor(descriptor))
            .collect()
    }
}
