//! Error types for scene validation and layout computation

use thiserror::Error;

use crate::scene::ElementId;

/// Errors that stop a scene from being solved.
///
/// A layout that is merely imperfect is never an error: residual overlap,
/// boundary violations and unsatisfied soft constraints are reported through
/// [`crate::LayoutResult`] scores and diagnostics instead.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Element with NaN or non-positive geometry, or an inverted timing window
    #[error("malformed element '{element}': {reason}")]
    MalformedElement { element: String, reason: String },

    /// Two elements share the same identifier
    #[error("duplicate element id '{id}'")]
    DuplicateElement { id: String },

    /// Reference to an element that is not part of the scene
    #[error("undefined element '{name}' referenced by {referenced_by}")]
    UnknownElement {
        name: String,
        referenced_by: String,
        suggestions: Vec<String>,
    },

    /// Dependency edges do not form a DAG
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// Locked elements with requirements no solve can reconcile
    #[error("unsatisfiable locked elements {}: {reason}", elements.join(", "))]
    UnsatisfiableLock {
        elements: Vec<String>,
        reason: String,
    },

    /// Constraint with bad participants or parameters
    #[error("invalid constraint #{index}: {reason}")]
    InvalidConstraint { index: usize, reason: String },

    /// Canvas with non-positive or non-finite extent
    #[error("invalid canvas: {reason}")]
    InvalidCanvas { reason: String },
}

impl LayoutError {
    /// Create a malformed element error
    pub fn malformed(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedElement {
            element: element.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown element error with suggestions
    pub fn unknown(
        name: impl Into<String>,
        referenced_by: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self::UnknownElement {
            name: name.into(),
            referenced_by: referenced_by.into(),
            suggestions,
        }
    }

    /// Create a cyclic dependency error from the ids along the cycle
    pub fn cyclic(cycle: Vec<String>) -> Self {
        Self::CyclicDependency { cycle }
    }

    /// Create an unsatisfiable lock error
    pub fn unsatisfiable_lock(elements: &[&ElementId], reason: impl Into<String>) -> Self {
        Self::UnsatisfiableLock {
            elements: elements.iter().map(|id| id.to_string()).collect(),
            reason: reason.into(),
        }
    }

    /// Create an invalid constraint error
    pub fn invalid_constraint(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            index,
            reason: reason.into(),
        }
    }

    /// Get suggestions if available
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            Self::UnknownElement { suggestions, .. } => Some(suggestions),
            _ => None,
        }
    }

    /// Get the ids of the offending elements, if the error names any
    pub fn elements(&self) -> Vec<&str> {
        match self {
            Self::MalformedElement { element, .. } => vec![element.as_str()],
            Self::DuplicateElement { id } => vec![id.as_str()],
            Self::UnknownElement { name, .. } => vec![name.as_str()],
            Self::CyclicDependency { cycle } => cycle.iter().map(String::as_str).collect(),
            Self::UnsatisfiableLock { elements, .. } => {
                elements.iter().map(String::as_str).collect()
            }
            Self::InvalidConstraint { .. } | Self::InvalidCanvas { .. } => vec![],
        }
    }
}

/// Recoverable inconsistencies in the spatial index.
///
/// The collision detector answers these by rebuilding the index and, if that
/// fails too, by falling back to pairwise checks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialIndexError {
    #[error("cannot index non-finite bounds for key {key}")]
    InvalidBounds { key: String },

    #[error("key {key} is already indexed")]
    DuplicateKey { key: String },

    #[error("index holds {found} entries but tracks {expected} keys")]
    Inconsistent { expected: usize, found: usize },
}

/// Errors from loading configuration or scene files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
