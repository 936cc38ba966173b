//! Z-order tiers and conflict resolution
//!
//! Every element lands in one fixed tier, and its z-index never leaves the
//! tier's range, so a higher tier always draws above a lower one whatever
//! the priorities.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scene::{ElementId, ElementKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerTier {
    Background,
    Content,
    Text,
    Ui,
}

impl LayerTier {
    pub const ALL: [LayerTier; 4] = [
        LayerTier::Background,
        LayerTier::Content,
        LayerTier::Text,
        LayerTier::Ui,
    ];

    pub fn min(self) -> i32 {
        match self {
            LayerTier::Background => 0,
            LayerTier::Content => 100,
            LayerTier::Text => 200,
            LayerTier::Ui => 300,
        }
    }

    pub fn max(self) -> i32 {
        self.min() + 99
    }

    pub fn contains(self, z_index: i32) -> bool {
        (self.min()..=self.max()).contains(&z_index)
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerTier::Background => "background",
            LayerTier::Content => "content",
            LayerTier::Text => "text",
            LayerTier::Ui => "ui",
        }
    }
}

impl fmt::Display for LayerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tier and in-tier offset of each element kind
pub fn tier_for_kind(kind: ElementKind) -> (LayerTier, i32) {
    match kind {
        ElementKind::Background => (LayerTier::Background, 0),
        ElementKind::Shape => (LayerTier::Content, 0),
        ElementKind::Image => (LayerTier::Content, 5),
        ElementKind::Graph => (LayerTier::Content, 10),
        ElementKind::Text => (LayerTier::Text, 0),
        ElementKind::Label => (LayerTier::Text, 5),
        ElementKind::Equation => (LayerTier::Text, 10),
        ElementKind::Annotation => (LayerTier::Ui, 0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Cap on detect/resolve rounds
    pub max_iterations: usize,
    pub background_opacity: f64,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            background_opacity: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerAssignment {
    pub element: ElementId,
    pub tier: LayerTier,
    pub z_index: i32,
    pub opacity: f64,
    pub priority: i32,
}

/// Elements sharing one z-index inside one tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConflict {
    pub tier: LayerTier,
    pub z_index: i32,
    pub elements: Vec<ElementId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub iterations: usize,
    /// Groups still sharing a z-index when resolution stopped
    pub remaining: usize,
}

impl ConflictResolution {
    pub fn is_resolved(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Default)]
pub struct LayerManager {
    config: LayerConfig,
    assignments: Vec<LayerAssignment>,
    index: HashMap<ElementId, usize>,
}

impl LayerManager {
    pub fn new(config: LayerConfig) -> Self {
        Self {
            config,
            assignments: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Tier and z-index for an element; assigning an id again replaces it
    pub fn assign(&mut self, element: ElementId, kind: ElementKind, priority: i32) -> (LayerTier, i32) {
        let (tier, offset) = tier_for_kind(kind);
        let z_index = tier
            .min()
            .saturating_add(offset)
            .saturating_add(priority)
            .clamp(tier.min(), tier.max());
        let opacity = if tier == LayerTier::Background {
            self.config.background_opacity
        } else {
            1.0
        };
        let assignment = LayerAssignment {
            element: element.clone(),
            tier,
            z_index,
            opacity,
            priority,
        };
        match self.index.get(&element) {
            Some(&slot) => self.assignments[slot] = assignment,
            None => {
                self.index.insert(element, self.assignments.len());
                self.assignments.push(assignment);
            }
        }
        (tier, z_index)
    }

    pub fn get(&self, element: &ElementId) -> Option<&LayerAssignment> {
        self.index.get(element).map(|&slot| &self.assignments[slot])
    }

    /// Assignments in the order elements were first assigned
    pub fn assignments(&self) -> &[LayerAssignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Same-tier same-z groups, ordered by tier then z-index
    pub fn detect_conflicts(&self) -> Vec<LayerConflict> {
        let mut groups: BTreeMap<(LayerTier, i32), Vec<usize>> = BTreeMap::new();
        for (slot, a) in self.assignments.iter().enumerate() {
            groups.entry((a.tier, a.z_index)).or_default().push(slot);
        }
        groups
            .into_iter()
            .filter(|(_, slots)| slots.len() > 1)
            .map(|((tier, z_index), slots)| LayerConflict {
                tier,
                z_index,
                elements: slots
                    .into_iter()
                    .map(|slot| self.assignments[slot].element.clone())
                    .collect(),
            })
            .collect()
    }

    /// Demote lower-priority members of each conflict by one step until no
    /// conflict is left or the iteration cap is hit. A loser already at the
    /// tier floor promotes the winner instead.
    pub fn resolve_conflicts(&mut self) -> ConflictResolution {
        let mut iterations = 0;
        loop {
            let conflicts = self.detect_conflicts();
            if conflicts.is_empty() || iterations >= self.config.max_iterations {
                if !conflicts.is_empty() {
                    tracing::warn!(
                        remaining = conflicts.len(),
                        iterations,
                        "layer conflicts left after the iteration cap"
                    );
                }
                return ConflictResolution {
                    iterations,
                    remaining: conflicts.len(),
                };
            }
            iterations += 1;

            for conflict in conflicts {
                let mut slots: Vec<usize> = conflict
                    .elements
                    .iter()
                    .filter_map(|id| self.index.get(id).copied())
                    .collect();
                slots.sort_by(|&a, &b| {
                    let (x, y) = (&self.assignments[a], &self.assignments[b]);
                    y.priority.cmp(&x.priority).then_with(|| x.element.cmp(&y.element))
                });
                let Some((&winner, losers)) = slots.split_first() else {
                    continue;
                };

                let floor = conflict.tier.min();
                let mut promote = false;
                for &loser in losers {
                    let z = &mut self.assignments[loser].z_index;
                    if *z > floor {
                        *z -= 1;
                    } else {
                        promote = true;
                    }
                }
                let top = &mut self.assignments[winner].z_index;
                if promote && *top < conflict.tier.max() {
                    *top += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kind_strategy() -> impl Strategy<Value = ElementKind> {
        prop_oneof![
            Just(ElementKind::Background),
            Just(ElementKind::Shape),
            Just(ElementKind::Graph),
            Just(ElementKind::Image),
            Just(ElementKind::Text),
            Just(ElementKind::Equation),
            Just(ElementKind::Label),
            Just(ElementKind::Annotation),
        ]
    }

    #[test]
    fn test_assign_offsets_and_clamps() {
        let mut layers = LayerManager::default();
        assert_eq!(
            layers.assign("eq".into(), ElementKind::Equation, 3),
            (LayerTier::Text, 213)
        );
        assert_eq!(
            layers.assign("big".into(), ElementKind::Graph, 500),
            (LayerTier::Content, 199)
        );
        assert_eq!(
            layers.assign("low".into(), ElementKind::Shape, -20),
            (LayerTier::Content, 100)
        );
        assert_eq!(layers.len(), 3);
    }

    #[test]
    fn test_background_opacity() {
        let mut layers = LayerManager::new(LayerConfig::default());
        layers.assign("bg".into(), ElementKind::Background, 0);
        layers.assign("box".into(), ElementKind::Shape, 0);
        assert_eq!(layers.get(&"bg".into()).map(|a| a.opacity), Some(0.85));
        assert_eq!(layers.get(&"box".into()).map(|a| a.opacity), Some(1.0));
    }

    #[test]
    fn test_conflicts_resolved_by_priority() {
        let mut layers = LayerManager::default();
        layers.assign("a".into(), ElementKind::Text, 2);
        layers.assign("b".into(), ElementKind::Text, 2);
        layers.assign("c".into(), ElementKind::Label, 0);

        let conflicts = layers.detect_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].z_index, 202);

        let report = layers.resolve_conflicts();
        assert!(report.is_resolved());
        // equal priority: the id breaks the tie
        assert_eq!(layers.get(&"a".into()).map(|a| a.z_index), Some(202));
        assert_eq!(layers.get(&"b".into()).map(|a| a.z_index), Some(201));
        assert!(layers.detect_conflicts().is_empty());
    }

    #[test]
    fn test_floor_conflict_promotes_winner() {
        let mut layers = LayerManager::default();
        layers.assign("high".into(), ElementKind::Shape, 0);
        layers.assign("low".into(), ElementKind::Shape, -5);
        let report = layers.resolve_conflicts();
        assert!(report.is_resolved());
        assert_eq!(layers.get(&"high".into()).map(|a| a.z_index), Some(101));
        assert_eq!(layers.get(&"low".into()).map(|a| a.z_index), Some(100));
    }

    #[test]
    fn test_reassign_replaces() {
        let mut layers = LayerManager::default();
        layers.assign("a".into(), ElementKind::Shape, 0);
        layers.assign("a".into(), ElementKind::Annotation, 1);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers.get(&"a".into()).map(|a| a.tier), Some(LayerTier::Ui));
    }

    proptest! {
        #[test]
        fn test_tier_ordering_survives_resolution(
            specs in proptest::collection::vec((kind_strategy(), -300i32..300), 1..40)
        ) {
            let mut layers = LayerManager::default();
            for (i, (kind, priority)) in specs.iter().enumerate() {
                layers.assign(ElementId::new(format!("e{}", i)), *kind, *priority);
            }
            layers.resolve_conflicts();
            let all = layers.assignments();
            for a in all {
                prop_assert!(a.tier.contains(a.z_index));
                for b in all {
                    if a.tier > b.tier {
                        prop_assert!(a.z_index > b.z_index);
                    }
                }
            }
        }
    }
}
