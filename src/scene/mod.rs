//! Scene construction and validation
//!
//! A [`Scene`] is the immutable input of one solve: the canvas, the elements
//! and the constraints bound to element indices. Construction rejects
//! everything that makes a scene unsolvable, so strategies can assume
//! finite geometry, known references and an acyclic dependency graph.

mod descriptor;
mod types;

use std::collections::{BTreeSet, HashMap, HashSet};

pub use descriptor::{ElementDescriptor, SceneBatch, SceneDescriptor, SizingConfig};
pub use types::{
    windows_overlap, Canvas, Element, ElementId, ElementKind, ElementStyle, PositionMap, TimeWindow,
};

use crate::error::LayoutError;
use crate::geometry::{classify, BoundingBox, CollisionItem, CollisionKind, Point};
use crate::layout::constraints::{ConstraintKind, ConstraintSystem, ResolvedConstraints};

/// Validated input of a single layout solve
#[derive(Debug, Clone)]
pub struct Scene {
    name: Option<String>,
    canvas: Canvas,
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
    constraints: ConstraintSystem,
    resolved: ResolvedConstraints,
    order: Vec<usize>,
}

impl Scene {
    pub fn new(
        canvas: Canvas,
        elements: Vec<Element>,
        constraints: ConstraintSystem,
    ) -> Result<Self, LayoutError> {
        validate_canvas(&canvas)?;
        for element in &elements {
            validate_element(element)?;
        }

        let mut index = HashMap::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            if index.insert(element.id.clone(), i).is_some() {
                return Err(LayoutError::DuplicateElement {
                    id: element.id.to_string(),
                });
            }
        }

        validate_dependencies(&elements, &index)?;
        let resolved = constraints.resolve(&index)?;
        let graph = dependency_graph(&elements, &index, &resolved);
        let order = topological_order(&elements, &graph)?;
        check_locked_footprints(&elements)?;

        tracing::debug!(
            elements = elements.len(),
            constraints = resolved.len(),
            "scene validated"
        );

        Ok(Self {
            name: None,
            canvas,
            elements,
            index,
            constraints,
            resolved,
            order,
        })
    }

    /// Build a scene from its serialized form, auto-sizing elements without
    /// an explicit size. `default_canvas` applies when the descriptor has none.
    pub fn from_descriptor(
        descriptor: SceneDescriptor,
        default_canvas: Canvas,
        sizing: &SizingConfig,
    ) -> Result<Self, LayoutError> {
        let canvas = descriptor.canvas.unwrap_or(default_canvas);
        let elements = descriptor
            .elements
            .into_iter()
            .map(|d| d.into_element(&canvas, sizing))
            .collect();
        let constraints = descriptor.constraints.into_iter().collect();
        let scene = Self::new(canvas, elements, constraints)?;
        Ok(match descriptor.name {
            Some(name) => scene.with_name(name),
            None => scene,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.index.get(id).map(|&i| &self.elements[i])
    }

    pub fn index_of(&self, id: &ElementId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn index(&self) -> &HashMap<ElementId, usize> {
        &self.index
    }

    /// Constraints as supplied
    pub fn constraints(&self) -> &ConstraintSystem {
        &self.constraints
    }

    /// Constraints bound to element indices
    pub fn resolved_constraints(&self) -> &ResolvedConstraints {
        &self.resolved
    }

    /// Element indices with every dependency before its dependents.
    /// Ties keep input order.
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    pub fn has_dependencies(&self) -> bool {
        self.elements.iter().any(|e| !e.dependencies.is_empty())
    }

    /// Indices of the dependencies of element `i`
    pub fn dependency_indices(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.elements[i]
            .dependencies
            .iter()
            .filter_map(|id| self.index.get(id).copied())
    }

    /// Input centers, in element order
    pub fn original_centers(&self) -> Vec<Point> {
        self.elements.iter().map(Element::center).collect()
    }

    /// Centers for every element, read from `positions` where present
    pub fn centers_from_positions(&self, positions: &PositionMap) -> Vec<Point> {
        self.elements
            .iter()
            .map(|e| positions.get(&e.id).copied().unwrap_or_else(|| e.center()))
            .collect()
    }

    pub fn positions_from_centers(&self, centers: &[Point]) -> PositionMap {
        self.elements
            .iter()
            .zip(centers)
            .map(|(e, c)| (e.id.clone(), *c))
            .collect()
    }

    /// Bounds of element `i` when centered at `center`
    pub fn bounds_at(&self, i: usize, center: Point) -> BoundingBox {
        self.elements[i].bounds_at(center)
    }

    /// Collision detector input for the arrangement `centers`
    pub fn collision_items(&self, centers: &[Point]) -> Vec<CollisionItem> {
        self.elements
            .iter()
            .zip(centers)
            .map(|(e, c)| {
                CollisionItem::new(e.bounds_at(*c))
                    .with_window(e.timing)
                    .with_collidable(e.kind.collidable())
            })
            .collect()
    }
}

fn validate_canvas(canvas: &Canvas) -> Result<(), LayoutError> {
    if !canvas.is_valid() {
        return Err(LayoutError::InvalidCanvas {
            reason: format!(
                "expected finite positive size, got {} x {}",
                canvas.width, canvas.height
            ),
        });
    }
    Ok(())
}

fn validate_element(element: &Element) -> Result<(), LayoutError> {
    let id = element.id.as_str();
    if id.is_empty() {
        return Err(LayoutError::malformed(id, "id must not be empty"));
    }
    if !element.bounds.is_finite() {
        return Err(LayoutError::malformed(id, "position and size must be finite"));
    }
    if element.width() <= 0.0 {
        return Err(LayoutError::malformed(
            id,
            format!("width must be positive, got {}", element.width()),
        ));
    }
    if element.height() <= 0.0 {
        return Err(LayoutError::malformed(
            id,
            format!("height must be positive, got {}", element.height()),
        ));
    }
    if let Some(window) = &element.timing {
        if !window.is_valid() {
            return Err(LayoutError::malformed(
                id,
                format!(
                    "timing window [{}, {}) is empty or inverted",
                    window.start, window.end
                ),
            ));
        }
    }
    Ok(())
}

fn validate_dependencies(
    elements: &[Element],
    index: &HashMap<ElementId, usize>,
) -> Result<(), LayoutError> {
    for element in elements {
        for dep in &element.dependencies {
            if !index.contains_key(dep) {
                let known: Vec<&str> = index.keys().map(ElementId::as_str).collect();
                return Err(LayoutError::unknown(
                    dep.as_str(),
                    format!("dependencies of '{}'", element.id),
                    find_similar(&known, dep.as_str(), 2),
                ));
            }
        }
    }
    Ok(())
}

/// Dependencies of each element: its own `depends_on` list, then the
/// enabled dependency-order constraints that name it as the dependent
fn dependency_graph(
    elements: &[Element],
    index: &HashMap<ElementId, usize>,
    constraints: &ResolvedConstraints,
) -> Vec<Vec<usize>> {
    let mut graph: Vec<Vec<usize>> = elements
        .iter()
        .map(|e| e.dependencies.iter().map(|dep| index[dep]).collect())
        .collect();
    for constraint in constraints.iter() {
        if constraint.kind == ConstraintKind::DependencyOrder && constraint.weight > 0.0 {
            graph[constraint.indices[1]].push(constraint.indices[0]);
        }
    }
    graph
}

/// Kahn's algorithm over "depends on" edges, smallest ready index first
fn topological_order(elements: &[Element], graph: &[Vec<usize>]) -> Result<Vec<usize>, LayoutError> {
    let n = elements.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, deps) in graph.iter().enumerate() {
        for &d in deps {
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < n {
        return Err(LayoutError::cyclic(find_cycle(elements, graph, &in_degree)));
    }
    Ok(order)
}

/// Walk unresolved dependency edges until a node repeats.
///
/// Every element left with a positive in-degree has at least one dependency
/// that is also unresolved, so the walk always closes a cycle.
fn find_cycle(elements: &[Element], graph: &[Vec<usize>], in_degree: &[usize]) -> Vec<String> {
    let Some(start) = (0..elements.len()).find(|&i| in_degree[i] > 0) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut seen = HashSet::from([start]);
    let mut current = start;
    loop {
        let next = graph[current].iter().copied().find(|&d| in_degree[d] > 0);
        let Some(next) = next else {
            break;
        };
        if !seen.insert(next) {
            let from = path.iter().position(|&p| p == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[from..]
                .iter()
                .map(|&i| elements[i].id.to_string())
                .collect();
            cycle.push(elements[next].id.to_string());
            return cycle;
        }
        path.push(next);
        current = next;
    }
    path.iter().map(|&i| elements[i].id.to_string()).collect()
}

/// Two locked elements sharing one footprint cannot both stay put
fn check_locked_footprints(elements: &[Element]) -> Result<(), LayoutError> {
    let locked: Vec<&Element> = elements
        .iter()
        .filter(|e| e.locked && e.kind.collidable())
        .collect();
    for (n, a) in locked.iter().enumerate() {
        for b in &locked[n + 1..] {
            if !windows_overlap(a.timing.as_ref(), b.timing.as_ref()) {
                continue;
            }
            if classify(&a.bounds, &b.bounds) == CollisionKind::Contained {
                return Err(LayoutError::unsatisfiable_lock(
                    &[&a.id, &b.id],
                    "locked elements occupy the same footprint",
                ));
            }
        }
    }
    Ok(())
}

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        row[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            row[j] = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

/// Known ids within `max_distance` edits of `target`, closest first
pub(crate) fn find_similar(known: &[&str], target: &str, max_distance: usize) -> Vec<String> {
    let mut candidates: Vec<(&str, usize)> = known
        .iter()
        .filter_map(|name| {
            let dist = levenshtein_distance(name, target);
            (dist > 0 && dist <= max_distance).then_some((*name, dist))
        })
        .collect();

    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    candidates
        .into_iter()
        .map(|(name, _)| name.to_string())
        .take(3)
        .collect()
}
