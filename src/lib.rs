//! Scene Layout - non-overlapping, quality-scored placement of timed scene elements
//!
//! This library places text blocks, equations, shapes and graphs on a fixed
//! 2D canvas. It detects collisions, picks a layout strategy from the scene's
//! complexity, solves soft constraints, scores the result and assigns z-order
//! layers for the downstream renderer. A separate QA engine scores rendered
//! frames.
//!
//! # Example
//!
//! ```rust
//! use scene_layout::{solve_json, EngineConfig, LayoutEngine};
//!
//! let engine = LayoutEngine::new(EngineConfig::default().with_tuning(false));
//! let outputs = solve_json(
//!     r#"{
//!         "elements": [
//!             { "id": "title", "kind": "text", "content": "Pythagoras", "position": [0.0, 0.0] },
//!             { "id": "proof", "kind": "equation", "content": "a^2 + b^2 = c^2", "position": [0.2, 0.1] }
//!         ]
//!     }"#,
//!     &engine,
//! )
//! .unwrap();
//!
//! assert_eq!(outputs[0].elements.len(), 2);
//! assert!(outputs[0].result.scores.residual_overlap <= 1e-9);
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod layers;
pub mod layout;
pub mod qa;
pub mod scene;
pub mod tuning;

pub use config::EngineConfig;
pub use error::{ConfigError, LayoutError, SpatialIndexError};
pub use geometry::{BoundingBox, CollisionDetector, Point};
pub use layers::{LayerAssignment, LayerManager, LayerTier};
pub use layout::{
    Constraint, ConstraintSystem, Diagnostics, LayoutEngine, LayoutResult, LayoutScores,
    SceneOutput, StrategyKind,
};
pub use qa::{QaEngine, QaReport, Telemetry};
pub use scene::{Canvas, Element, ElementId, ElementKind, Scene, SceneBatch, SceneDescriptor};
pub use tuning::WeightCache;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur in the file-to-layout pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Error reading or parsing input
    #[error("input error: {0}")]
    Input(#[from] ConfigError),

    /// A scene failed validation
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),
}

/// Either one scene or a batch of them
#[derive(Deserialize)]
#[serde(untagged)]
enum SceneInput {
    Batch(SceneBatch),
    Single(SceneDescriptor),
}

/// Lay out one scene with the default configuration
pub fn solve_scene(descriptor: SceneDescriptor) -> Result<SceneOutput, LayoutError> {
    LayoutEngine::default().solve_descriptor(descriptor)
}

/// Lay out a JSON scene, or a JSON `{ "scenes": [...] }` batch solved in
/// parallel. Outputs keep input order; the first invalid scene fails the call.
pub fn solve_json(source: &str, engine: &LayoutEngine) -> Result<Vec<SceneOutput>, PipelineError> {
    let input: SceneInput = serde_json::from_str(source).map_err(ConfigError::from)?;
    let outputs = match input {
        SceneInput::Single(descriptor) => vec![engine.solve_descriptor(descriptor)?],
        SceneInput::Batch(batch) => engine
            .solve_batch(batch.scenes)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(outputs)
}

/// Parse JSON scenes without solving them
pub fn parse_scenes(source: &str) -> Result<Vec<SceneDescriptor>, PipelineError> {
    let input: SceneInput = serde_json::from_str(source).map_err(ConfigError::from)?;
    Ok(match input {
        SceneInput::Single(descriptor) => vec![descriptor],
        SceneInput::Batch(batch) => batch.scenes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LayoutEngine {
        LayoutEngine::new(EngineConfig::default().with_tuning(false))
    }

    #[test]
    fn test_solve_single_scene() {
        let outputs = solve_json(
            r#"{ "name": "intro", "elements": [
                { "id": "a", "position": [0.0, 0.0], "size": [1.0, 1.0] },
                { "id": "b", "position": [0.3, 0.3], "size": [1.0, 1.0] }
            ] }"#,
            &engine(),
        )
        .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].scene.as_deref(), Some("intro"));
        assert!(outputs[0].result.scores.residual_overlap <= 1e-9);
    }

    #[test]
    fn test_solve_batch_keeps_order() {
        let outputs = solve_json(
            r#"{ "scenes": [
                { "name": "one", "elements": [{ "id": "a" }] },
                { "name": "two", "elements": [{ "id": "a" }, { "id": "b" }] }
            ] }"#,
            &engine(),
        )
        .unwrap();
        let names: Vec<_> = outputs.iter().map(|o| o.scene.as_deref()).collect();
        assert_eq!(names, vec![Some("one"), Some("two")]);
    }

    #[test]
    fn test_invalid_scene_is_an_error() {
        let result = solve_json(
            r#"{ "elements": [
                { "id": "a", "depends_on": ["b"] },
                { "id": "b", "depends_on": ["a"] }
            ] }"#,
            &engine(),
        );
        assert!(matches!(
            result,
            Err(PipelineError::Layout(LayoutError::CyclicDependency { .. }))
        ));
    }

    #[test]
    fn test_malformed_json_is_an_input_error() {
        let result = parse_scenes("{ \"elements\": 3 }");
        assert!(matches!(result, Err(PipelineError::Input(ConfigError::Json(_)))));
    }
}
