//! Configuration for the layout engine
//!
//! Every section has defaults, so a TOML file only lists what it changes:
//!
//! ```toml
//! seed = 7
//! acceptance_score = 0.7
//!
//! [physics]
//! max_iterations = 500
//!
//! [collision]
//! index_threshold = 32
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::CollisionConfig;
use crate::layers::LayerConfig;
use crate::layout::{AnalyzerConfig, EvaluationWeights, PhysicsParams, StrategyKind};
use crate::qa::QaConfig;
use crate::scene::{Canvas, SizingConfig};
use crate::tuning::TuningConfig;

/// Configuration options for layout computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Canvas used when a scene does not bring its own
    pub canvas: Canvas,

    /// Auto-sizing of elements without explicit size
    pub sizing: SizingConfig,

    pub collision: CollisionConfig,

    /// Strategy selection thresholds
    pub analyzer: AnalyzerConfig,

    /// Default force-directed parameters before analysis and tuning
    pub physics: PhysicsParams,

    pub tuning: TuningConfig,

    pub evaluation: EvaluationWeights,

    pub layers: LayerConfig,

    pub qa: QaConfig,

    /// Force a strategy instead of the analyzer's recommendation
    pub strategy: Option<StrategyKind>,

    /// Target gap between neighbouring elements
    pub spacing: f64,

    /// Overall score below which a force-directed fallback is attempted
    pub acceptance_score: f64,

    /// Weight of the ordering constraints derived from element dependencies
    pub implicit_dependency_weight: f64,

    /// Return overlap free, in-bounds, satisfied scenes unchanged
    pub preserve_clean_layouts: bool,

    /// Project alignment and containment exactly with the Cassowary solver
    pub project_linear_constraints: bool,

    /// Seed for every random perturbation
    pub seed: u64,

    /// Wall-clock budget per solve, on top of the iteration caps
    pub time_budget_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            sizing: SizingConfig::default(),
            collision: CollisionConfig::default(),
            analyzer: AnalyzerConfig::default(),
            physics: PhysicsParams::default(),
            tuning: TuningConfig::default(),
            evaluation: EvaluationWeights::default(),
            layers: LayerConfig::default(),
            qa: QaConfig::default(),
            strategy: None,
            spacing: 0.2,
            acceptance_score: 0.6,
            implicit_dependency_weight: 1.0,
            preserve_clean_layouts: true,
            project_linear_constraints: true,
            seed: 42,
            time_budget_ms: None,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no solve can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.acceptance_score) {
            return Err(ConfigError::invalid(
                "acceptance_score",
                format!("must be within [0, 1], got {}", self.acceptance_score),
            ));
        }
        if !self.spacing.is_finite() || self.spacing < 0.0 {
            return Err(ConfigError::invalid("spacing", "must be finite and non-negative"));
        }
        if !self.implicit_dependency_weight.is_finite() || self.implicit_dependency_weight < 0.0 {
            return Err(ConfigError::invalid(
                "implicit_dependency_weight",
                "must be finite and non-negative",
            ));
        }
        if !self.canvas.is_valid() {
            return Err(ConfigError::invalid("canvas", "width and height must be positive"));
        }
        self.physics
            .validate()
            .map_err(|reason| ConfigError::invalid("physics", reason))?;
        self.tuning
            .validate()
            .map_err(|reason| ConfigError::invalid("tuning", reason))?;
        self.evaluation
            .validate()
            .map_err(|reason| ConfigError::invalid("evaluation", reason))?;
        self.qa
            .validate()
            .map_err(|reason| ConfigError::invalid("qa", reason))?;
        Ok(())
    }

    pub fn with_canvas(mut self, canvas: Canvas) -> Self {
        self.canvas = canvas;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.physics.max_iterations = max_iterations;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_tuning(mut self, enabled: bool) -> Self {
        self.tuning.enabled = enabled;
        self
    }

    pub fn with_time_budget_ms(mut self, budget: u64) -> Self {
        self.time_budget_ms = Some(budget);
        self
    }

    pub fn with_preserve_clean_layouts(mut self, preserve: bool) -> Self {
        self.preserve_clean_layouts = preserve;
        self
    }

    pub fn with_collision(mut self, collision: CollisionConfig) -> Self {
        self.collision = collision;
        self
    }
}
