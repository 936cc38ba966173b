//! QA reports built from rendered-frame telemetry

use pretty_assertions::assert_eq;

use scene_layout::qa::{
    ElementSample, FrameTelemetry, MetricStatus, QaConfig, QualityLevel, TextTiming,
};
use scene_layout::scene::TimeWindow;
use scene_layout::{
    BoundingBox, ElementKind, EngineConfig, LayerTier, LayoutEngine, Point, QaEngine, Telemetry,
};

fn sample(id: &str, kind: ElementKind, x: f64, y: f64, w: f64, h: f64) -> ElementSample {
    ElementSample::new(id, kind, BoundingBox::from_center(Point::new(x, y), w, h))
}

/// Two frames: the box slides under the title in the second one, and the
/// title is shown a second ahead of its narration
fn intro_telemetry() -> Telemetry {
    let title = sample("title", ElementKind::Text, 0.0, 0.0, 2.0, 1.0)
        .with_layer(LayerTier::Text, 200)
        .with_text(18.0, 7.0);
    let frame = |index: usize, box_x: f64| FrameTelemetry {
        index,
        time: index as f64 * 0.5,
        elements: vec![
            title.clone(),
            sample("box", ElementKind::Shape, box_x, 0.0, 1.0, 1.0).with_layer(LayerTier::Content, 100),
        ],
    };
    Telemetry {
        scene: Some("intro".to_string()),
        frames: vec![frame(0, 3.0), frame(1, 0.5)],
        text_timings: vec![TextTiming {
            element: "title".to_string(),
            display: TimeWindow::new(0.0, 4.0),
            narration: TimeWindow::new(1.0, 5.0),
        }],
    }
}

#[test]
fn test_intro_report_summary() {
    let report = QaEngine::default().evaluate(&intro_telemetry());

    assert_eq!(report.level, QualityLevel::Fair);
    assert!(!report.passed());
    insta::assert_snapshot!(report.summary(), @r###"
    QA intro: fair (0.700) over 2 frames
      overlap_ratio    0.500 / 0.95  fail
      readability      0.900 / 0.80  pass
      layer_accuracy   1.000 / 0.95  pass
      timing_accuracy  0.500 / 0.90  fail
      - Overlap in 1 of 2 frames (frames 1); first at frame 1: 'title' and 'box' share 1.000 square units
      - Align text with narration: 'title' display starts -1.00s and ends -1.00s from its narration
    "###);
}

#[test]
fn test_metric_statuses() {
    let report = QaEngine::default().evaluate(&intro_telemetry());
    let statuses = vec![
        report.overlap_ratio.status,
        report.readability.status,
        report.layer_accuracy.status,
        report.timing_accuracy.status,
    ];
    assert_eq!(
        statuses,
        vec![
            MetricStatus::Fail,
            MetricStatus::Pass,
            MetricStatus::Pass,
            MetricStatus::Fail,
        ]
    );
    assert_eq!(
        report.layer_accuracy.details,
        vec!["2 of 2 cross-tier pairs ordered".to_string()]
    );
}

#[test]
fn test_report_round_trips_through_json() {
    let report = QaEngine::default().evaluate(&intro_telemetry());
    let json = serde_json::to_string(&report).unwrap();
    let back: scene_layout::QaReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn test_telemetry_from_json_defaults() {
    let telemetry = Telemetry::from_json_str(
        r#"{ "frames": [{ "index": 0, "time": 0.0, "elements": [
            { "id": "a", "bounds": { "xmin": 0.0, "ymin": 0.0, "xmax": 1.0, "ymax": 1.0 } }
        ] }] }"#,
    )
    .unwrap();
    let report = QaEngine::default().evaluate(&telemetry);
    assert_eq!(report.scene, None);
    assert_eq!(report.frames, 1);
    assert_eq!(report.overall, 1.0);
    assert_eq!(report.level, QualityLevel::Excellent);
    assert!(report.recommendations.is_empty());
}

#[test]
fn test_stricter_font_threshold_adds_advice() {
    let engine = QaEngine::new(QaConfig {
        min_font_size: 48.0,
        ..QaConfig::default()
    });
    let report = engine.evaluate(&intro_telemetry());
    assert_eq!(report.readability.status, MetricStatus::Warning);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r == "Raise font size to at least 48 for 'title' (18)"));
}

/// Frames sampled from a solved layout score clean on overlap and layering
#[test]
fn test_solved_layout_passes_overlap_and_layering() {
    let engine = LayoutEngine::new(EngineConfig::default().with_tuning(false));
    let output = scene_layout::solve_json(
        r#"{ "name": "solved", "elements": [
            { "id": "bg", "kind": "background", "size": [14.0, 8.0] },
            { "id": "title", "kind": "text", "content": "Area of a circle", "position": [0.0, 0.0] },
            { "id": "formula", "kind": "equation", "content": "A = \\pi r^2", "position": [0.2, 0.1] },
            { "id": "circle", "kind": "shape", "position": [0.1, -0.1] }
        ] }"#,
        &engine,
    )
    .unwrap()
    .remove(0);

    let elements: Vec<ElementSample> = output
        .elements
        .iter()
        .map(|e| {
            ElementSample::new(e.id.as_str(), e.kind, e.bounds)
                .with_layer(e.tier, e.z_index)
                .with_opacity(e.opacity)
        })
        .collect();
    let telemetry = Telemetry {
        scene: output.scene.clone(),
        frames: vec![FrameTelemetry {
            index: 0,
            time: 0.0,
            elements,
        }],
        text_timings: Vec::new(),
    };

    let report = QaEngine::default().evaluate(&telemetry);
    assert_eq!(report.overlap_ratio.score, 1.0);
    assert_eq!(report.layer_accuracy.score, 1.0);
    assert!(report.passed());
}
