//! Frame-level quality assurance
//!
//! Scores what was actually rendered, independent of the live solver:
//!
//! - overlap ratio: share of frames where visible content overlaps
//! - readability: font size, contrast and visibility of text
//! - layer accuracy: cross-tier pairs whose z order follows the tiers
//! - timing accuracy: text display windows against narration windows
//!
//! Every metric is a score in `[0, 1]` compared against a target; the
//! weighted blend gives the overall score and quality level.

pub mod telemetry;

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

pub use telemetry::{ElementSample, FrameTelemetry, Telemetry, TextTiming};

use crate::geometry::{intersects, overlap_area, EPSILON};
use crate::scene::ElementKind;

/// At most this many offenders are named per recommendation
const MAX_NAMED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaWeights {
    pub overlap: f64,
    pub readability: f64,
    pub layer_accuracy: f64,
    pub timing: f64,
}

impl Default for QaWeights {
    fn default() -> Self {
        Self {
            overlap: 0.30,
            readability: 0.25,
            layer_accuracy: 0.20,
            timing: 0.25,
        }
    }
}

impl QaWeights {
    fn total(&self) -> f64 {
        self.overlap + self.readability + self.layer_accuracy + self.timing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaTargets {
    pub overlap: f64,
    pub readability: f64,
    pub layer_accuracy: f64,
    pub timing: f64,
}

impl Default for QaTargets {
    fn default() -> Self {
        Self {
            overlap: 0.95,
            readability: 0.80,
            layer_accuracy: 0.95,
            timing: 0.90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub weights: QaWeights,
    pub targets: QaTargets,
    /// Scores this close below their target are warnings, not failures
    pub warning_margin: f64,
    /// Font size that scores full readability
    pub min_font_size: f64,
    /// Contrast ratio that scores full readability
    pub min_contrast: f64,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            weights: QaWeights::default(),
            targets: QaTargets::default(),
            warning_margin: 0.1,
            min_font_size: 24.0,
            min_contrast: 4.5,
        }
    }
}

impl QaConfig {
    pub fn validate(&self) -> Result<(), String> {
        let w = &self.weights;
        if [w.overlap, w.readability, w.layer_accuracy, w.timing]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
            || w.total() <= 0.0
        {
            return Err("QA weights must be non-negative with a positive sum".to_string());
        }
        if !(self.min_font_size > 0.0 && self.min_contrast > 0.0) {
            return Err("min_font_size and min_contrast must be positive".to_string());
        }
        if self.warning_margin < 0.0 {
            return Err("warning_margin must be non-negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Pass,
    Warning,
    Fail,
}

impl MetricStatus {
    fn grade(score: f64, target: f64, margin: f64) -> Self {
        if score >= target {
            MetricStatus::Pass
        } else if score >= target - margin {
            MetricStatus::Warning
        } else {
            MetricStatus::Fail
        }
    }
}

impl fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricStatus::Pass => "pass",
            MetricStatus::Warning => "warning",
            MetricStatus::Fail => "fail",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub score: f64,
    pub target: f64,
    pub status: MetricStatus,
    /// Measured facts behind the score
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            QualityLevel::Excellent
        } else if score >= 0.75 {
            QualityLevel::Good
        } else if score >= 0.6 {
            QualityLevel::Fair
        } else {
            QualityLevel::Poor
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityLevel::Poor => "poor",
            QualityLevel::Fair => "fair",
            QualityLevel::Good => "good",
            QualityLevel::Excellent => "excellent",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    pub scene: Option<String>,
    pub frames: usize,
    pub overlap_ratio: MetricResult,
    pub readability: MetricResult,
    pub layer_accuracy: MetricResult,
    pub timing_accuracy: MetricResult,
    pub overall: f64,
    pub level: QualityLevel,
    pub recommendations: Vec<String>,
}

impl QaReport {
    fn metrics(&self) -> [(&'static str, &MetricResult); 4] {
        [
            ("overlap_ratio", &self.overlap_ratio),
            ("readability", &self.readability),
            ("layer_accuracy", &self.layer_accuracy),
            ("timing_accuracy", &self.timing_accuracy),
        ]
    }

    pub fn passed(&self) -> bool {
        self.metrics()
            .iter()
            .all(|(_, m)| m.status != MetricStatus::Fail)
    }

    /// Human-readable multi-line report
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let scene = self.scene.as_deref().unwrap_or("scene");
        let _ = writeln!(
            out,
            "QA {}: {} ({:.3}) over {} frames",
            scene, self.level, self.overall, self.frames
        );
        for (name, metric) in self.metrics() {
            let _ = writeln!(
                out,
                "  {:<16} {:.3} / {:.2}  {}",
                name, metric.score, metric.target, metric.status
            );
        }
        for recommendation in &self.recommendations {
            let _ = writeln!(out, "  - {}", recommendation);
        }
        out
    }
}

/// Raw outcome of one metric before grading
struct Measured {
    score: f64,
    details: Vec<String>,
    advice: Vec<String>,
}

pub struct QaEngine {
    config: QaConfig,
}

impl Default for QaEngine {
    fn default() -> Self {
        Self::new(QaConfig::default())
    }
}

impl QaEngine {
    pub fn new(config: QaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    pub fn evaluate(&self, telemetry: &Telemetry) -> QaReport {
        let targets = &self.config.targets;
        let margin = self.config.warning_margin;
        let mut recommendations = Vec::new();

        let mut grade = |measured: Measured, target: f64| {
            let status = MetricStatus::grade(measured.score, target, margin);
            if status != MetricStatus::Pass {
                recommendations.extend(measured.advice);
            }
            MetricResult {
                score: measured.score,
                target,
                status,
                details: measured.details,
            }
        };

        let overlap_ratio = grade(self.overlap_ratio(&telemetry.frames), targets.overlap);
        let readability = grade(self.readability(&telemetry.frames), targets.readability);
        let layer_accuracy = grade(layer_accuracy(&telemetry.frames), targets.layer_accuracy);
        let timing_accuracy = grade(timing_accuracy(&telemetry.text_timings), targets.timing);

        let w = &self.config.weights;
        let overall = (w.overlap * overlap_ratio.score
            + w.readability * readability.score
            + w.layer_accuracy * layer_accuracy.score
            + w.timing * timing_accuracy.score)
            / w.total();
        let level = QualityLevel::from_score(overall);
        tracing::info!(overall, %level, frames = telemetry.frames.len(), "QA report computed");

        QaReport {
            scene: telemetry.scene.clone(),
            frames: telemetry.frames.len(),
            overlap_ratio,
            readability,
            layer_accuracy,
            timing_accuracy,
            overall,
            level,
            recommendations,
        }
    }

    fn overlap_ratio(&self, frames: &[FrameTelemetry]) -> Measured {
        if frames.is_empty() {
            return Measured {
                score: 1.0,
                details: vec!["no frames".to_string()],
                advice: Vec::new(),
            };
        }

        let mut offending = Vec::new();
        for frame in frames {
            let shown: Vec<&ElementSample> = frame
                .elements
                .iter()
                .filter(|s| s.is_shown() && s.kind != ElementKind::Background)
                .collect();
            let pair = shown.iter().enumerate().find_map(|(i, a)| {
                shown[i + 1..]
                    .iter()
                    .find(|b| intersects(&a.bounds, &b.bounds))
                    .map(|b| (a.id.clone(), b.id.clone(), overlap_area(&a.bounds, &b.bounds)))
            });
            if let Some(pair) = pair {
                offending.push((frame.index, pair));
            }
        }

        let ratio = offending.len() as f64 / frames.len() as f64;
        let details = vec![format!(
            "{} of {} frames contain overlapping elements",
            offending.len(),
            frames.len()
        )];
        let advice = match offending.first() {
            Some((first, (a, b, area))) => {
                let listed: Vec<String> = offending
                    .iter()
                    .take(MAX_NAMED)
                    .map(|(index, _)| index.to_string())
                    .collect();
                vec![format!(
                    "Overlap in {} of {} frames (frames {}); first at frame {}: '{}' and '{}' share {:.3} square units",
                    offending.len(),
                    frames.len(),
                    listed.join(", "),
                    first,
                    a,
                    b,
                    area
                )]
            }
            None => Vec::new(),
        };

        Measured {
            score: 1.0 - ratio,
            details,
            advice,
        }
    }

    fn readability(&self, frames: &[FrameTelemetry]) -> Measured {
        let min_font = self.config.min_font_size;
        let min_contrast = self.config.min_contrast;
        let mut scores = Vec::new();
        let mut small_fonts: Vec<(String, f64)> = Vec::new();
        let mut low_contrast: Vec<(String, f64)> = Vec::new();
        let mut covered: Vec<(String, f64)> = Vec::new();

        for frame in frames {
            for sample in frame.elements.iter().filter(|s| s.visible && s.kind.is_textual()) {
                let font = sample.font_size.map_or(1.0, |f| (f / min_font).clamp(0.0, 1.0));
                let contrast = sample
                    .contrast_ratio
                    .map_or(1.0, |c| (c / min_contrast).clamp(0.0, 1.0));
                let hidden = covered_fraction(sample, &frame.elements);
                let visibility = sample.opacity.clamp(0.0, 1.0) * (1.0 - hidden);
                scores.push(0.4 * font + 0.4 * contrast + 0.2 * visibility);

                if let Some(f) = sample.font_size.filter(|&f| f < min_font) {
                    note(&mut small_fonts, &sample.id, f, f64::min);
                }
                if let Some(c) = sample.contrast_ratio.filter(|&c| c < min_contrast) {
                    note(&mut low_contrast, &sample.id, c, f64::min);
                }
                if hidden > EPSILON {
                    note(&mut covered, &sample.id, hidden, f64::max);
                }
            }
        }

        if scores.is_empty() {
            return Measured {
                score: 1.0,
                details: vec!["no text samples".to_string()],
                advice: Vec::new(),
            };
        }
        let score = scores.iter().sum::<f64>() / scores.len() as f64;

        let mut advice = Vec::new();
        if !small_fonts.is_empty() {
            advice.push(format!(
                "Raise font size to at least {:.0} for {}",
                min_font,
                name_values(&small_fonts, |v| format!("{:.0}", v))
            ));
        }
        if !low_contrast.is_empty() {
            advice.push(format!(
                "Raise contrast to {:.1}:1 for {}",
                min_contrast,
                name_values(&low_contrast, |v| format!("{:.2}:1", v))
            ));
        }
        if !covered.is_empty() {
            advice.push(format!(
                "Uncover text drawn beneath other elements: {}",
                name_values(&covered, |v| format!("{:.0}% covered", v * 100.0))
            ));
        }

        Measured {
            score,
            details: vec![format!("{} text samples", scores.len())],
            advice,
        }
    }
}

/// Share of `sample` hidden by shown elements drawn above it, capped at 1
fn covered_fraction(sample: &ElementSample, frame: &[ElementSample]) -> f64 {
    let area = sample.bounds.area();
    if area <= EPSILON {
        return 0.0;
    }
    let hidden: f64 = frame
        .iter()
        .filter(|other| {
            other.id != sample.id
                && other.is_shown()
                && other.kind != ElementKind::Background
                && other.z_index > sample.z_index
        })
        .map(|other| overlap_area(&sample.bounds, &other.bounds))
        .sum();
    (hidden / area).clamp(0.0, 1.0)
}

/// Keep one worst value per element id
fn note(list: &mut Vec<(String, f64)>, id: &str, value: f64, worse: fn(f64, f64) -> f64) {
    match list.iter_mut().find(|(known, _)| known == id) {
        Some((_, current)) => *current = worse(*current, value),
        None => list.push((id.to_string(), value)),
    }
}

fn name_values(list: &[(String, f64)], render: impl Fn(f64) -> String) -> String {
    let mut named: Vec<String> = list
        .iter()
        .take(MAX_NAMED)
        .map(|(id, value)| format!("'{}' ({})", id, render(*value)))
        .collect();
    if list.len() > MAX_NAMED {
        named.push(format!("and {} more", list.len() - MAX_NAMED));
    }
    named.join(", ")
}

fn layer_accuracy(frames: &[FrameTelemetry]) -> Measured {
    let mut pairs = 0usize;
    let mut correct = 0usize;
    let mut inverted: Vec<String> = Vec::new();

    for frame in frames {
        let layered: Vec<&ElementSample> = frame
            .elements
            .iter()
            .filter(|s| s.visible && s.tier.is_some())
            .collect();
        for (i, a) in layered.iter().enumerate() {
            for b in &layered[i + 1..] {
                let (Some(ta), Some(tb)) = (a.tier, b.tier) else {
                    continue;
                };
                if ta == tb {
                    continue;
                }
                pairs += 1;
                let (upper, lower) = if ta > tb { (a, b) } else { (b, a) };
                if upper.z_index > lower.z_index {
                    correct += 1;
                } else if inverted.len() < MAX_NAMED {
                    inverted.push(format!(
                        "frame {}: '{}' ({} z {}) is not above '{}' ({} z {})",
                        frame.index,
                        upper.id,
                        upper.tier.map_or("?", |t| t.name()),
                        upper.z_index,
                        lower.id,
                        lower.tier.map_or("?", |t| t.name()),
                        lower.z_index
                    ));
                }
            }
        }
    }

    if pairs == 0 {
        return Measured {
            score: 1.0,
            details: vec!["no cross-tier pairs".to_string()],
            advice: Vec::new(),
        };
    }
    let advice = inverted
        .into_iter()
        .map(|s| format!("Fix z order, {}", s))
        .collect();
    Measured {
        score: correct as f64 / pairs as f64,
        details: vec![format!("{} of {} cross-tier pairs ordered", correct, pairs)],
        advice,
    }
}

fn timing_accuracy(timings: &[TextTiming]) -> Measured {
    if timings.is_empty() {
        return Measured {
            score: 1.0,
            details: vec!["no narrated text".to_string()],
            advice: Vec::new(),
        };
    }

    let mut scores = Vec::with_capacity(timings.len());
    let mut worst: Vec<(f64, String)> = Vec::new();
    for timing in timings {
        let start = timing.display.start - timing.narration.start;
        let end = timing.display.end - timing.narration.end;
        let error = start.abs() + end.abs();
        let duration = timing.narration.duration();
        let score = if duration > EPSILON {
            (1.0 - error / duration).clamp(0.0, 1.0)
        } else if error <= EPSILON {
            1.0
        } else {
            0.0
        };
        scores.push(score);
        if error > EPSILON {
            worst.push((
                score,
                format!(
                    "'{}' display starts {:+.2}s and ends {:+.2}s from its narration",
                    timing.element, start, end
                ),
            ));
        }
    }
    worst.sort_by(|a, b| a.0.total_cmp(&b.0));

    let advice = worst
        .into_iter()
        .take(MAX_NAMED)
        .map(|(_, s)| format!("Align text with narration: {}", s))
        .collect();
    Measured {
        score: scores.iter().sum::<f64>() / scores.len() as f64,
        details: vec![format!("{} narrated texts", timings.len())],
        advice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Point};
    use crate::layers::LayerTier;
    use crate::scene::TimeWindow;

    fn boxed(x: f64, y: f64) -> BoundingBox {
        BoundingBox::from_center(Point::new(x, y), 1.0, 1.0)
    }

    fn frame(index: usize, elements: Vec<ElementSample>) -> FrameTelemetry {
        FrameTelemetry {
            index,
            time: index as f64 / 30.0,
            elements,
        }
    }

    #[test]
    fn test_empty_telemetry_is_excellent() {
        let report = QaEngine::default().evaluate(&Telemetry::default());
        assert_eq!(report.overall, 1.0);
        assert_eq!(report.level, QualityLevel::Excellent);
        assert!(report.recommendations.is_empty());
        assert!(report.passed());
    }

    #[test]
    fn test_overlap_ratio_counts_frames() {
        let telemetry = Telemetry {
            frames: vec![
                frame(0, vec![
                    ElementSample::new("a", ElementKind::Shape, boxed(0.0, 0.0)),
                    ElementSample::new("b", ElementKind::Shape, boxed(3.0, 0.0)),
                ]),
                frame(1, vec![
                    ElementSample::new("a", ElementKind::Shape, boxed(0.0, 0.0)),
                    ElementSample::new("b", ElementKind::Shape, boxed(0.5, 0.0)),
                ]),
                frame(2, vec![
                    // backgrounds and hidden elements never overlap
                    ElementSample::new("bg", ElementKind::Background, boxed(0.0, 0.0)),
                    ElementSample::new("a", ElementKind::Shape, boxed(0.0, 0.0)),
                    ElementSample::new("ghost", ElementKind::Shape, boxed(0.0, 0.0)).hidden(),
                ]),
                frame(3, vec![ElementSample::new("a", ElementKind::Shape, boxed(0.0, 0.0))]),
            ],
            ..Telemetry::default()
        };
        let report = QaEngine::default().evaluate(&telemetry);
        assert_eq!(report.overlap_ratio.score, 0.75);
        assert_eq!(report.overlap_ratio.status, MetricStatus::Fail);
        assert_eq!(
            report.recommendations[0],
            "Overlap in 1 of 4 frames (frames 1); first at frame 1: 'a' and 'b' share 0.500 square units"
        );
    }

    #[test]
    fn test_readability_composite() {
        let telemetry = Telemetry {
            frames: vec![frame(0, vec![
                ElementSample::new("title", ElementKind::Text, boxed(0.0, 0.0)).with_text(12.0, 4.5),
            ])],
            ..Telemetry::default()
        };
        let report = QaEngine::default().evaluate(&telemetry);
        // 0.4 * 0.5 + 0.4 * 1 + 0.2 * 1
        assert!((report.readability.score - 0.8).abs() < 1e-12);
        assert_eq!(report.readability.status, MetricStatus::Pass);
    }

    #[test]
    fn test_covered_text_loses_visibility() {
        let telemetry = Telemetry {
            frames: vec![frame(0, vec![
                ElementSample::new("label", ElementKind::Label, boxed(0.0, 0.0)).with_layer(LayerTier::Text, 205),
                ElementSample::new("popup", ElementKind::Annotation, boxed(0.5, 0.0)).with_layer(LayerTier::Ui, 300),
            ])],
            ..Telemetry::default()
        };
        let report = QaEngine::default().evaluate(&telemetry);
        // two text samples: the label half covered, the annotation clear
        let expected = ((0.8 + 0.2 * 0.5) + 1.0) / 2.0;
        assert!((report.readability.score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_layer_accuracy_detects_inversion() {
        let telemetry = Telemetry {
            frames: vec![frame(7, vec![
                ElementSample::new("bg", ElementKind::Background, boxed(0.0, 0.0)).with_layer(LayerTier::Background, 0),
                ElementSample::new("box", ElementKind::Shape, boxed(3.0, 0.0)).with_layer(LayerTier::Content, 100),
                ElementSample::new("caption", ElementKind::Text, boxed(-3.0, 0.0)).with_layer(LayerTier::Text, 50),
            ])],
            ..Telemetry::default()
        };
        let report = QaEngine::default().evaluate(&telemetry);
        assert!((report.layer_accuracy.score - 2.0 / 3.0).abs() < 1e-12);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("frame 7: 'caption' (text z 50) is not above 'box' (content z 100)")));
    }

    #[test]
    fn test_timing_accuracy_normalized_by_narration() {
        let telemetry = Telemetry {
            text_timings: vec![
                TextTiming {
                    element: "intro".to_string(),
                    display: TimeWindow::new(0.0, 4.0),
                    narration: TimeWindow::new(0.0, 4.0),
                },
                TextTiming {
                    element: "late".to_string(),
                    display: TimeWindow::new(1.0, 5.0),
                    narration: TimeWindow::new(0.0, 4.0),
                },
            ],
            ..Telemetry::default()
        };
        let report = QaEngine::default().evaluate(&telemetry);
        // 1.0 and 1 - 2/4
        assert!((report.timing_accuracy.score - 0.75).abs() < 1e-12);
        assert_eq!(report.timing_accuracy.status, MetricStatus::Fail);
        assert!(report.recommendations.iter().any(|r| r.contains("'late' display starts +1.00s")));
    }

    #[test]
    fn test_levels_and_status_grades() {
        assert_eq!(QualityLevel::from_score(0.95), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(0.8), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(0.6), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_score(0.59), QualityLevel::Poor);
        assert_eq!(MetricStatus::grade(0.9, 0.9, 0.1), MetricStatus::Pass);
        assert_eq!(MetricStatus::grade(0.85, 0.9, 0.1), MetricStatus::Warning);
        assert_eq!(MetricStatus::grade(0.7, 0.9, 0.1), MetricStatus::Fail);
    }
}
