//! Exact projection of linear constraints with the kasuari Cassowary solver
//!
//! Alignment and containment are linear in the element centers, so instead
//! of approximating them with forces they can be solved exactly:
//!
//! - locked elements are pinned with `REQUIRED` equalities
//! - free elements are edit variables suggested at their current center
//!   with `WEAK` strength, so they move as little as possible
//! - alignment and containment are `STRONG`, staying inside the safe area
//!   is `MEDIUM`
//!
//! Only elements that take part in a linear constraint get variables.

use std::collections::HashMap;

use kasuari::{Solver as KasuariSolver, Strength, Variable as KasuariVariable, WeightedRelation::*};
use thiserror::Error;

use super::constraints::{Axis, ConstraintKind, ResolvedConstraint, ResolvedConstraints};
use crate::geometry::{BoundingBox, Point};
use crate::scene::Element;

/// Errors from the constraint solver
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("unsatisfiable constraint: {0}")]
    Unsatisfiable(String),

    #[error("internal solver error: {0}")]
    Internal(String),
}

/// One coordinate of one element center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectionVariable {
    pub element: usize,
    pub axis: Axis,
}

struct Projector<'a> {
    elements: &'a [Element],
    centers: &'a [Point],
    solver: KasuariSolver,
    /// Maps our variables to kasuari variables
    variables: HashMap<ProjectionVariable, KasuariVariable>,
}

impl<'a> Projector<'a> {
    fn new(elements: &'a [Element], centers: &'a [Point]) -> Self {
        Self {
            elements,
            centers,
            solver: KasuariSolver::new(),
            variables: HashMap::new(),
        }
    }

    fn current(&self, var: ProjectionVariable) -> f64 {
        match var.axis {
            Axis::X => self.centers[var.element].x,
            Axis::Y => self.centers[var.element].y,
        }
    }

    fn extent(&self, element: usize, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.elements[element].width(),
            Axis::Y => self.elements[element].height(),
        }
    }

    /// Get or create the kasuari variable for a center coordinate, pinning
    /// or suggesting it on first use
    fn variable(&mut self, element: usize, axis: Axis) -> Result<KasuariVariable, ProjectionError> {
        let var = ProjectionVariable { element, axis };
        if let Some(&kvar) = self.variables.get(&var) {
            return Ok(kvar);
        }

        let kvar = KasuariVariable::new();
        self.variables.insert(var, kvar);
        let value = self.current(var);
        if self.elements[element].locked {
            let expr: kasuari::Expression = kvar.into();
            self.solver
                .add_constraint(expr | EQ(Strength::REQUIRED) | value)
                .map_err(|e| convert_kasuari_error(e, &format!("lock of element {}", element)))?;
        } else {
            self.solver
                .add_edit_variable(kvar, Strength::WEAK)
                .map_err(|e| ProjectionError::Internal(format!("failed to add edit variable: {}", e)))?;
            self.solver
                .suggest_value(kvar, value)
                .map_err(|e| ProjectionError::Internal(format!("failed to suggest value: {}", e)))?;
        }
        Ok(kvar)
    }

    fn add_constraint(&mut self, constraint: &ResolvedConstraint) -> Result<(), ProjectionError> {
        let desc = constraint
            .label
            .clone()
            .unwrap_or_else(|| constraint.kind.name().to_string());

        match constraint.kind {
            ConstraintKind::Alignment { axis, anchor, .. } => {
                let reference = constraint.indices[0];
                let ref_var = self.variable(reference, axis)?;
                let ref_offset = anchor.offset(self.extent(reference, axis));
                for &i in &constraint.indices[1..] {
                    let var = self.variable(i, axis)?;
                    let offset = anchor.offset(self.extent(i, axis));
                    // anchor_i = anchor_ref  <=>  c_i = c_ref + off_ref - off_i
                    let left: kasuari::Expression = var.into();
                    let right: kasuari::Expression = ref_var.into();
                    self.solver
                        .add_constraint(left | EQ(Strength::STRONG) | right + (ref_offset - offset))
                        .map_err(|e| convert_kasuari_error(e, &desc))?;
                }
            }
            ConstraintKind::Containment { padding } => {
                let parent = constraint.indices[0];
                for &child in &constraint.indices[1..] {
                    for axis in [Axis::X, Axis::Y] {
                        let p = self.variable(parent, axis)?;
                        let c = self.variable(child, axis)?;
                        let slack = self.extent(parent, axis) / 2.0
                            - self.extent(child, axis) / 2.0
                            - padding;
                        // |c - p| <= slack
                        let low: kasuari::Expression = c.into();
                        let high: kasuari::Expression = c.into();
                        let p_low: kasuari::Expression = p.into();
                        let p_high: kasuari::Expression = p.into();
                        self.solver
                            .add_constraint(low | GE(Strength::STRONG) | p_low - slack)
                            .map_err(|e| convert_kasuari_error(e, &desc))?;
                        self.solver
                            .add_constraint(high | LE(Strength::STRONG) | p_high + slack)
                            .map_err(|e| convert_kasuari_error(e, &desc))?;
                    }
                }
            }
            ConstraintKind::Proximity { .. } | ConstraintKind::DependencyOrder => {}
        }
        Ok(())
    }

    /// Keep every free variable's box inside `area`
    fn add_bounds(&mut self, area: &BoundingBox) -> Result<(), ProjectionError> {
        let vars: Vec<(ProjectionVariable, KasuariVariable)> =
            self.variables.iter().map(|(v, k)| (*v, *k)).collect();
        for (var, kvar) in vars {
            if self.elements[var.element].locked {
                continue;
            }
            let half = self.extent(var.element, var.axis) / 2.0;
            let (low, high) = match var.axis {
                Axis::X => (area.xmin + half, area.xmax - half),
                Axis::Y => (area.ymin + half, area.ymax - half),
            };
            if low > high {
                continue;
            }
            let lower: kasuari::Expression = kvar.into();
            let upper: kasuari::Expression = kvar.into();
            self.solver
                .add_constraint(lower | GE(Strength::MEDIUM) | low)
                .map_err(|e| convert_kasuari_error(e, "safe area"))?;
            self.solver
                .add_constraint(upper | LE(Strength::MEDIUM) | high)
                .map_err(|e| convert_kasuari_error(e, "safe area"))?;
        }
        Ok(())
    }

    fn solve(mut self) -> Vec<Point> {
        // Variables absent from the change list sit at zero
        let mut values: HashMap<ProjectionVariable, f64> =
            self.variables.keys().map(|v| (*v, 0.0)).collect();
        let changes = self.solver.fetch_changes();
        for (kvar, value) in changes {
            for (our_var, &k) in &self.variables {
                if k == *kvar {
                    values.insert(*our_var, *value);
                    break;
                }
            }
        }

        let mut out = self.centers.to_vec();
        for (var, value) in values {
            if self.elements[var.element].locked || !value.is_finite() {
                continue;
            }
            match var.axis {
                Axis::X => out[var.element].x = value,
                Axis::Y => out[var.element].y = value,
            }
        }
        out
    }
}

/// Convert a kasuari error to a ProjectionError with context
fn convert_kasuari_error(e: kasuari::AddConstraintError, constraint_desc: &str) -> ProjectionError {
    match e {
        kasuari::AddConstraintError::UnsatisfiableConstraint => {
            ProjectionError::Unsatisfiable(constraint_desc.to_string())
        }
        kasuari::AddConstraintError::DuplicateConstraint => {
            ProjectionError::Internal(format!("duplicate constraint: {}", constraint_desc))
        }
        kasuari::AddConstraintError::InternalSolverError(msg) => {
            ProjectionError::Internal(format!("{}: {}", constraint_desc, msg))
        }
    }
}

/// Project `centers` onto the linear constraints of `constraints`.
///
/// Locked elements keep their exact center. Elements outside every linear
/// constraint are returned unchanged.
pub fn project_linear(
    elements: &[Element],
    centers: &[Point],
    constraints: &ResolvedConstraints,
    area: &BoundingBox,
) -> Result<Vec<Point>, ProjectionError> {
    let mut projector = Projector::new(elements, centers);
    let mut any = false;
    for constraint in constraints.linear() {
        projector.add_constraint(constraint)?;
        any = true;
    }
    if !any {
        return Ok(centers.to_vec());
    }
    projector.add_bounds(area)?;
    Ok(projector.solve())
}
