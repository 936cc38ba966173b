//! Layout computation
//!
//! Takes a validated [`Scene`](crate::scene::Scene) and produces a
//! [`LayoutResult`]: resolved centers, quality scores and diagnostics.

pub mod analyzer;
pub mod constraints;
pub mod engine;
pub mod evaluator;
pub mod projection;
pub mod strategy;

pub use analyzer::{AnalyzerConfig, ComplexityAnalyzer, ComplexityProfile};
pub use constraints::{
    Anchor, Axis, Constraint, ConstraintKind, ConstraintSystem, ResolvedConstraint,
    ResolvedConstraints, SATISFIED_EPSILON,
};
pub use engine::{AnnotatedElement, Diagnostics, LayoutEngine, LayoutResult, SceneOutput};
pub use evaluator::{EvaluationWeights, LayoutEvaluator, LayoutScores};
pub use projection::{project_linear, ProjectionError};
pub use strategy::{
    ConvergenceWarning, ForceDirected, GridStrategy, HierarchicalStrategy, LayoutStrategy,
    PhysicsParams, RadialStrategy, SolveContext, StrategyKind, StrategyOutput,
};
