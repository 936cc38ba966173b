//! End-to-end scenarios: overlap removal, large random scenes, dependent
//! elements kept close, and cyclic dependencies rejected up front.

mod common;

use common::*;
use scene_layout::layout::{Constraint, ConstraintSystem};
use scene_layout::{
    solve_json, EngineConfig, LayoutEngine, LayoutError, PipelineError, Scene, StrategyKind,
};

/// Two small boxes sharing a corner region are reported and then separated
#[test]
fn test_two_overlapping_boxes_are_separated() {
    let scene = scene(vec![
        boxed("a", 0.0, 0.0, 0.5, 0.5),
        boxed("b", 0.3, 0.3, 0.5, 0.5),
    ]);
    let engine = quiet_engine();

    let before = scene.original_centers();
    let items = scene.collision_items(&before);
    let collisions = engine.detector().overlaps(&items);
    assert_eq!(collisions.len(), 1);
    assert!(collisions[0].area > 0.0);

    let result = engine.solve(&scene);
    let after = scene.centers_from_positions(&result.positions);
    assert!(recomputed_overlap(&engine, &scene, &after) <= OVERLAP_TOLERANCE);
    assert!(result.scores.residual_overlap <= OVERLAP_TOLERANCE);
    assert!(result.diagnostics.baseline_overlap > 0.0);
}

/// Fifty random boxes solved force-directed within 300 iterations
#[test]
fn test_fifty_random_elements_force_directed() {
    let scene = scene(random_elements(50, 2024));
    let config = EngineConfig::default()
        .with_strategy(StrategyKind::ForceDirected)
        .with_max_iterations(300)
        .with_tuning(false);
    let engine = LayoutEngine::new(config);

    let result = engine.solve(&scene);
    assert_eq!(result.diagnostics.strategy, StrategyKind::ForceDirected);
    assert!(result.diagnostics.iterations <= 300);
    assert!(
        result.scores.overlap >= 0.99,
        "overlap score {} below 0.99",
        result.scores.overlap
    );
    let canvas = scene.canvas().bounds().inflate(1e-9);
    for (id, center) in &result.positions {
        let i = scene.index_of(id).unwrap();
        assert!(canvas.contains_box(&scene.bounds_at(i, *center)), "{} left the canvas", id);
    }
}

/// A dependent element with a proximity constraint ends up near its dependency
#[test]
fn test_dependent_stays_within_proximity() {
    let scene = constrained(
        vec![
            boxed("a", 0.0, 0.0, 0.5, 0.5),
            boxed("b", 0.0, 0.0, 0.5, 0.5).with_dependency("a"),
        ],
        ConstraintSystem::new().with(Constraint::proximity("a", "b", 0.5)),
    );
    let engine = quiet_engine();

    let result = engine.solve(&scene);
    let a = result.position(&"a".into()).unwrap();
    let b = result.position(&"b".into()).unwrap();
    assert!(
        a.distance(&b) <= 0.5 + CONSTRAINT_TOLERANCE,
        "distance {} exceeds 0.5",
        a.distance(&b)
    );
    let after = scene.centers_from_positions(&result.positions);
    assert!(recomputed_overlap(&engine, &scene, &after) <= OVERLAP_TOLERANCE);
}

/// A cycle is rejected when the scene is built, before any strategy runs
#[test]
fn test_dependency_cycle_is_rejected() {
    let result = Scene::new(
        scene_layout::Canvas::default(),
        vec![
            boxed("a", 0.0, 0.0, 1.0, 1.0).with_dependency("b"),
            boxed("b", 2.0, 0.0, 1.0, 1.0).with_dependency("a"),
        ],
        ConstraintSystem::new(),
    );
    match result {
        Err(LayoutError::CyclicDependency { cycle }) => {
            assert!(cycle.iter().any(|id| id == "a"));
            assert!(cycle.iter().any(|id| id == "b"));
        }
        other => panic!("expected a cyclic dependency error, got {:?}", other.map(|_| ())),
    }
}

/// Ordering constraints count as dependency edges, alone or mixed with
/// `depends_on`
#[test]
fn test_dependency_order_cycle_is_rejected() {
    let explicit = Scene::new(
        scene_layout::Canvas::default(),
        vec![boxed("a", -2.0, 0.0, 1.0, 1.0), boxed("b", 2.0, 0.0, 1.0, 1.0)],
        ConstraintSystem::new()
            .with(Constraint::dependency_order("a", "b"))
            .with(Constraint::dependency_order("b", "a")),
    );
    match explicit {
        Err(LayoutError::CyclicDependency { cycle }) => assert_eq!(cycle, vec!["a", "b", "a"]),
        other => panic!("expected a cyclic dependency error, got {:?}", other.map(|_| ())),
    }

    let mixed = Scene::new(
        scene_layout::Canvas::default(),
        vec![
            boxed("a", -2.0, 0.0, 1.0, 1.0),
            boxed("b", 2.0, 0.0, 1.0, 1.0).with_dependency("a"),
        ],
        ConstraintSystem::new().with(Constraint::dependency_order("b", "a")),
    );
    assert!(matches!(mixed, Err(LayoutError::CyclicDependency { .. })));
}

#[test]
fn test_dependency_cycle_is_rejected_from_json() {
    let result = solve_json(
        r#"{ "elements": [
            { "id": "a", "depends_on": ["b"] },
            { "id": "b", "depends_on": ["c"] },
            { "id": "c", "depends_on": ["a"] }
        ] }"#,
        &quiet_engine(),
    );
    assert!(matches!(
        result,
        Err(PipelineError::Layout(LayoutError::CyclicDependency { .. }))
    ));
}
