//! Soft constraints between elements
//!
//! Every constraint maps a candidate arrangement to a non-negative penalty;
//! zero means satisfied. The system total is `Σ weight × penalty`, so a
//! weight of zero disables a constraint without removing it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::geometry::{BoundingBox, Point};
use crate::scene::{find_similar, Element, ElementId, PositionMap, Scene};

/// Penalty at or below which a constraint counts as satisfied
pub const SATISFIED_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

/// Which edge of a box an alignment reads. `Start` is the low coordinate
/// (left or bottom), `End` the high one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Start,
    #[default]
    Center,
    End,
}

impl Anchor {
    pub fn coordinate(self, bbox: &BoundingBox, axis: Axis) -> f64 {
        let center = bbox.center();
        match (self, axis) {
            (Anchor::Start, Axis::X) => bbox.xmin,
            (Anchor::Center, Axis::X) => center.x,
            (Anchor::End, Axis::X) => bbox.xmax,
            (Anchor::Start, Axis::Y) => bbox.ymin,
            (Anchor::Center, Axis::Y) => center.y,
            (Anchor::End, Axis::Y) => bbox.ymax,
        }
    }

    /// Offset from the box center to the anchor, for a box of `extent` along the axis
    pub fn offset(self, extent: f64) -> f64 {
        match self {
            Anchor::Start => -extent / 2.0,
            Anchor::Center => 0.0,
            Anchor::End => extent / 2.0,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

fn default_tolerance() -> f64 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Participants stay within `max_distance` of each other (center to center)
    Proximity { max_distance: f64 },
    /// Participants share one anchor coordinate
    Alignment {
        axis: Axis,
        #[serde(default)]
        anchor: Anchor,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// Every participant after the first stays inside the first
    Containment {
        #[serde(default)]
        padding: f64,
    },
    /// `[dependency, dependent]`: the dependent sits at or below its
    /// dependency and does not appear before it
    DependencyOrder,
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Proximity { .. } => "proximity",
            ConstraintKind::Alignment { .. } => "alignment",
            ConstraintKind::Containment { .. } => "containment",
            ConstraintKind::DependencyOrder => "dependency_order",
        }
    }

    /// Kinds that the Cassowary projection can express exactly
    pub fn is_linear(&self) -> bool {
        matches!(
            self,
            ConstraintKind::Alignment { .. } | ConstraintKind::Containment { .. }
        )
    }
}

/// A weighted relationship between named elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(flatten)]
    pub kind: ConstraintKind,
    pub participants: Vec<ElementId>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Constraint {
    pub fn new<I, T>(kind: ConstraintKind, participants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ElementId>,
    {
        Self {
            kind,
            participants: participants.into_iter().map(Into::into).collect(),
            weight: default_weight(),
            label: None,
        }
    }

    pub fn proximity(a: impl Into<ElementId>, b: impl Into<ElementId>, max_distance: f64) -> Self {
        Self::new(
            ConstraintKind::Proximity { max_distance },
            [a.into(), b.into()],
        )
    }

    pub fn alignment<I, T>(axis: Axis, anchor: Anchor, tolerance: f64, participants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ElementId>,
    {
        Self::new(
            ConstraintKind::Alignment {
                axis,
                anchor,
                tolerance,
            },
            participants,
        )
    }

    pub fn containment<I, T>(parent: impl Into<ElementId>, children: I, padding: f64) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ElementId>,
    {
        let mut participants = vec![parent.into()];
        participants.extend(children.into_iter().map(Into::into));
        Self {
            kind: ConstraintKind::Containment { padding },
            participants,
            weight: default_weight(),
            label: None,
        }
    }

    pub fn dependency_order(dependency: impl Into<ElementId>, dependent: impl Into<ElementId>) -> Self {
        Self::new(
            ConstraintKind::DependencyOrder,
            [dependency.into(), dependent.into()],
        )
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn validate_parameters(&self, index: usize) -> Result<(), LayoutError> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(LayoutError::invalid_constraint(
                index,
                format!("weight must be finite and non-negative, got {}", self.weight),
            ));
        }

        if self.kind == ConstraintKind::DependencyOrder && self.participants.len() != 2 {
            return Err(LayoutError::invalid_constraint(
                index,
                "dependency_order takes exactly [dependency, dependent]",
            ));
        }
        if self.participants.len() < 2 {
            return Err(LayoutError::invalid_constraint(
                index,
                format!("{} needs at least 2 participants", self.kind.name()),
            ));
        }

        match self.kind {
            ConstraintKind::Proximity { max_distance } => {
                if !max_distance.is_finite() || max_distance < 0.0 {
                    return Err(LayoutError::invalid_constraint(
                        index,
                        "max_distance must be finite and non-negative",
                    ));
                }
            }
            ConstraintKind::Alignment { tolerance, .. } => {
                if !tolerance.is_finite() || tolerance <= 0.0 {
                    return Err(LayoutError::invalid_constraint(
                        index,
                        "tolerance must be finite and positive",
                    ));
                }
            }
            ConstraintKind::Containment { padding } => {
                if !padding.is_finite() || padding < 0.0 {
                    return Err(LayoutError::invalid_constraint(
                        index,
                        "padding must be finite and non-negative",
                    ));
                }
            }
            ConstraintKind::DependencyOrder => {}
        }
        Ok(())
    }
}

/// Ordered collection of constraints as supplied with a scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSystem {
    constraints: Vec<Constraint>,
}

impl ConstraintSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.push(constraint);
        self
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// Validate every constraint and bind participant ids to element indices
    pub fn resolve(&self, index: &HashMap<ElementId, usize>) -> Result<ResolvedConstraints, LayoutError> {
        let mut items = Vec::with_capacity(self.constraints.len());
        for (i, constraint) in self.constraints.iter().enumerate() {
            constraint.validate_parameters(i)?;

            let mut indices = Vec::with_capacity(constraint.participants.len());
            for id in &constraint.participants {
                let Some(&idx) = index.get(id) else {
                    let known: Vec<&str> = index.keys().map(ElementId::as_str).collect();
                    return Err(LayoutError::unknown(
                        id.as_str(),
                        format!("constraint #{}", i),
                        find_similar(&known, id.as_str(), 2),
                    ));
                };
                if indices.contains(&idx) {
                    return Err(LayoutError::invalid_constraint(
                        i,
                        format!("participant '{}' listed twice", id),
                    ));
                }
                indices.push(idx);
            }

            items.push(ResolvedConstraint {
                kind: constraint.kind.clone(),
                indices,
                weight: constraint.weight,
                label: constraint.label.clone(),
            });
        }
        Ok(ResolvedConstraints { items })
    }

    /// Total weighted violation of `positions` (element centers) in `scene`.
    /// Elements missing from the map are read at their original position.
    pub fn evaluate(&self, scene: &Scene, positions: &PositionMap) -> Result<f64, LayoutError> {
        let resolved = self.resolve(scene.index())?;
        let centers = scene.centers_from_positions(positions);
        Ok(resolved.penalty(scene.elements(), &centers))
    }
}

impl FromIterator<Constraint> for ConstraintSystem {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

/// A constraint whose participants are element indices
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConstraint {
    pub kind: ConstraintKind,
    pub indices: Vec<usize>,
    pub weight: f64,
    pub label: Option<String>,
}

impl ResolvedConstraint {
    /// Unweighted violation. `with_timing` adds the part of a dependency
    /// order that no placement can change.
    pub fn violation(&self, elements: &[Element], centers: &[Point], with_timing: bool) -> f64 {
        let bbox = |i: usize| elements[i].bounds_at(centers[i]);
        match self.kind {
            ConstraintKind::Proximity { max_distance } => {
                let mut total = 0.0;
                for (n, &i) in self.indices.iter().enumerate() {
                    for &j in &self.indices[n + 1..] {
                        let excess = centers[i].distance(&centers[j]) - max_distance;
                        if excess > 0.0 {
                            total += excess * excess;
                        }
                    }
                }
                total
            }
            ConstraintKind::Alignment {
                axis,
                anchor,
                tolerance,
            } => {
                let values: Vec<f64> = self
                    .indices
                    .iter()
                    .map(|&i| anchor.coordinate(&bbox(i), axis))
                    .collect();
                variance(&values) / tolerance
            }
            ConstraintKind::Containment { padding } => {
                let parent = bbox(self.indices[0]);
                self.indices[1..]
                    .iter()
                    .map(|&i| {
                        bbox(i)
                            .inflate(padding)
                            .overflow(&parent)
                            .iter()
                            .map(|o| o * o)
                            .sum::<f64>()
                    })
                    .sum()
            }
            ConstraintKind::DependencyOrder => {
                let (dependency, dependent) = (self.indices[0], self.indices[1]);
                let rise = (centers[dependent].y - centers[dependency].y).max(0.0);
                let mut total = rise * rise;
                if with_timing {
                    if let (Some(a), Some(b)) = (&elements[dependency].timing, &elements[dependent].timing) {
                        let early = (a.start - b.start).max(0.0);
                        total += early * early;
                    }
                }
                total
            }
        }
    }

    /// Per-element displacement that moves this constraint towards
    /// satisfaction. Locked elements never receive a displacement.
    fn accumulate_attraction(&self, elements: &[Element], centers: &[Point], out: &mut [Point]) {
        let bbox = |i: usize| elements[i].bounds_at(centers[i]);
        let mut push = |i: usize, delta: Point| {
            if !elements[i].locked {
                out[i] = out[i].add(delta.scale(self.weight));
            }
        };

        match self.kind {
            ConstraintKind::Proximity { max_distance } => {
                for (n, &i) in self.indices.iter().enumerate() {
                    for &j in &self.indices[n + 1..] {
                        let d = centers[i].distance(&centers[j]);
                        let excess = d - max_distance;
                        if excess <= 0.0 || d <= 0.0 {
                            continue;
                        }
                        let dir = centers[j].sub(centers[i]).scale(1.0 / d);
                        let (si, sj) = shares(elements[i].locked, elements[j].locked);
                        push(i, dir.scale(excess * si));
                        push(j, dir.scale(-excess * sj));
                    }
                }
            }
            ConstraintKind::Alignment { axis, anchor, .. } => {
                let pinned: Vec<usize> = self
                    .indices
                    .iter()
                    .copied()
                    .filter(|&i| elements[i].locked)
                    .collect();
                let basis = if pinned.is_empty() {
                    &self.indices
                } else {
                    &pinned
                };
                let values: Vec<f64> = basis
                    .iter()
                    .map(|&i| anchor.coordinate(&bbox(i), axis))
                    .collect();
                let target = values.iter().sum::<f64>() / values.len() as f64;
                for &i in &self.indices {
                    let delta = target - anchor.coordinate(&bbox(i), axis);
                    match axis {
                        Axis::X => push(i, Point::new(delta, 0.0)),
                        Axis::Y => push(i, Point::new(0.0, delta)),
                    }
                }
            }
            ConstraintKind::Containment { padding } => {
                let parent_idx = self.indices[0];
                let parent = bbox(parent_idx);
                for &i in &self.indices[1..] {
                    let [left, right, bottom, top] = bbox(i).inflate(padding).overflow(&parent);
                    let delta = Point::new(left - right, bottom - top);
                    if elements[i].locked {
                        push(parent_idx, delta.scale(-1.0));
                    } else {
                        push(i, delta);
                    }
                }
            }
            ConstraintKind::DependencyOrder => {
                let (dependency, dependent) = (self.indices[0], self.indices[1]);
                let rise = centers[dependent].y - centers[dependency].y;
                if rise > 0.0 {
                    let (s_dep, s_dnt) = shares(elements[dependency].locked, elements[dependent].locked);
                    push(dependency, Point::new(0.0, rise * s_dep));
                    push(dependent, Point::new(0.0, -rise * s_dnt));
                }
            }
        }
    }
}

/// How a correction is split between two participants
fn shares(a_locked: bool, b_locked: bool) -> (f64, f64) {
    match (a_locked, b_locked) {
        (false, false) => (0.5, 0.5),
        (true, false) => (0.0, 1.0),
        (false, true) => (1.0, 0.0),
        (true, true) => (0.0, 0.0),
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Constraints bound to a scene, ready for repeated evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConstraints {
    items: Vec<ResolvedConstraint>,
}

impl ResolvedConstraints {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedConstraint> {
        self.items.iter()
    }

    pub fn push(&mut self, constraint: ResolvedConstraint) {
        self.items.push(constraint);
    }

    /// Add a derived `[dependency, dependent]` ordering constraint
    pub fn push_dependency(&mut self, dependency: usize, dependent: usize, weight: f64) {
        self.items.push(ResolvedConstraint {
            kind: ConstraintKind::DependencyOrder,
            indices: vec![dependency, dependent],
            weight,
            label: Some("implicit dependency".to_string()),
        });
    }

    /// Total weighted violation including timing
    pub fn penalty(&self, elements: &[Element], centers: &[Point]) -> f64 {
        self.items
            .iter()
            .map(|c| c.weight * c.violation(elements, centers, true))
            .sum()
    }

    /// Total weighted violation a placement can influence
    pub fn positional_penalty(&self, elements: &[Element], centers: &[Point]) -> f64 {
        self.items
            .iter()
            .map(|c| c.weight * c.violation(elements, centers, false))
            .sum()
    }

    /// Unweighted violation of each constraint, in order
    pub fn violations(&self, elements: &[Element], centers: &[Point]) -> Vec<f64> {
        self.items
            .iter()
            .map(|c| c.violation(elements, centers, true))
            .collect()
    }

    pub fn is_satisfied(&self, elements: &[Element], centers: &[Point]) -> bool {
        self.positional_penalty(elements, centers) <= SATISFIED_EPSILON
    }

    /// Weighted displacement per element towards satisfying every constraint
    pub fn attraction(&self, elements: &[Element], centers: &[Point]) -> Vec<Point> {
        let mut out = vec![Point::zero(); elements.len()];
        for constraint in self.items.iter().filter(|c| c.weight > 0.0) {
            constraint.accumulate_attraction(elements, centers, &mut out);
        }
        out
    }

    /// Alignment and containment constraints with positive weight
    pub fn linear(&self) -> impl Iterator<Item = &ResolvedConstraint> {
        self.items
            .iter()
            .filter(|c| c.kind.is_linear() && c.weight > 0.0)
    }
}
