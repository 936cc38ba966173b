//! Physics weight tuning
//!
//! The tuner optimizes the force-directed weights (repulsion, attraction,
//! boundary strength, initial temperature) for one scene, not positions.
//! Parameters live in log space so every step keeps them positive. The
//! gradient comes from central finite differences over short probe
//! simulations; the update is Adam with a decaying learning rate, clipped
//! gradients and early stopping on a loss plateau. Results are cached per
//! [`ComplexityBucket`] so similar scenes skip the search entirely.

pub mod cache;
pub mod loss;

use serde::{Deserialize, Serialize};

pub use cache::{CacheStats, CachedWeights, ComplexityBucket, WeightCache};
pub use loss::{loss, LossTerms, LossWeights};

use crate::layout::{ForceDirected, LayoutEvaluator, PhysicsParams, SolveContext};

/// Number of tuned parameters
const DIMENSIONS: usize = 4;

/// Log-space bounds of repulsion, attraction, boundary strength, temperature
const BOUNDS: [(f64, f64); DIMENSIONS] = [(0.1, 10.0), (0.01, 3.0), (0.1, 10.0), (0.01, 2.0)];

/// Learning-rate decay over optimizer steps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LrSchedule {
    /// `lr * rate^step`
    Exponential { rate: f64 },
    /// `lr * factor^(step / every)`
    Step { every: usize, factor: f64 },
}

impl Default for LrSchedule {
    fn default() -> Self {
        LrSchedule::Exponential { rate: 0.9 }
    }
}

impl LrSchedule {
    pub fn rate_at(&self, base: f64, step: usize) -> f64 {
        match *self {
            LrSchedule::Exponential { rate } => base * rate.powi(step as i32),
            LrSchedule::Step { every, factor } => base * factor.powi((step / every.max(1)) as i32),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let factor = match *self {
            LrSchedule::Exponential { rate } => rate,
            LrSchedule::Step { every, factor } => {
                if every == 0 {
                    return Err("step schedule needs every >= 1".to_string());
                }
                factor
            }
        };
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(format!("decay factor must be in (0, 1], got {}", factor));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub enabled: bool,
    /// Hard cap on optimizer steps
    pub max_steps: usize,
    pub learning_rate: f64,
    pub schedule: LrSchedule,
    pub beta1: f64,
    pub beta2: f64,
    pub adam_epsilon: f64,
    /// Gradients longer than this are scaled down to it
    pub clip_norm: f64,
    /// Steps without improvement before stopping
    pub patience: usize,
    /// Smallest loss decrease that counts as improvement
    pub min_delta: f64,
    /// Finite-difference step in log space
    pub probe_step: f64,
    /// Force-directed iterations per loss evaluation
    pub probe_iterations: usize,
    pub loss: LossWeights,
    pub cache_capacity: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_steps: 10,
            learning_rate: 0.2,
            schedule: LrSchedule::default(),
            beta1: 0.9,
            beta2: 0.999,
            adam_epsilon: 1e-8,
            clip_norm: 1.0,
            patience: 3,
            min_delta: 1e-4,
            probe_step: 0.1,
            probe_iterations: 40,
            loss: LossWeights::default(),
            cache_capacity: 64,
        }
    }
}

impl TuningConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err("learning_rate must be positive".to_string());
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(format!("{} must be in [0, 1), got {}", name, beta));
            }
        }
        if !(self.clip_norm > 0.0 && self.probe_step > 0.0 && self.adam_epsilon > 0.0) {
            return Err("clip_norm, probe_step and adam_epsilon must be positive".to_string());
        }
        if self.min_delta < 0.0 {
            return Err("min_delta must be non-negative".to_string());
        }
        if self.probe_iterations == 0 {
            return Err("probe_iterations must be at least 1".to_string());
        }
        self.schedule.validate()?;
        self.loss.validate()
    }
}

/// What the tuner did for one solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningDiagnostics {
    pub bucket: ComplexityBucket,
    pub cache_hit: bool,
    pub steps: usize,
    /// Loss of this scene with the untuned weights
    pub initial_loss: f64,
    /// Loss of this scene with the returned weights
    pub final_loss: f64,
    pub stopped_early: bool,
    pub params: PhysicsParams,
}

fn encode(params: &PhysicsParams) -> [f64; DIMENSIONS] {
    let raw = [
        params.repulsion,
        params.attraction,
        params.boundary_strength,
        params.temperature,
    ];
    let mut theta = [0.0; DIMENSIONS];
    for k in 0..DIMENSIONS {
        let (lo, hi) = BOUNDS[k];
        theta[k] = raw[k].clamp(lo, hi).ln();
    }
    theta
}

fn decode(theta: &[f64; DIMENSIONS], base: &PhysicsParams) -> PhysicsParams {
    PhysicsParams {
        repulsion: theta[0].exp(),
        attraction: theta[1].exp(),
        boundary_strength: theta[2].exp(),
        temperature: theta[3].exp(),
        ..*base
    }
}

fn clamp_theta(theta: &mut [f64; DIMENSIONS]) {
    for k in 0..DIMENSIONS {
        let (lo, hi) = BOUNDS[k];
        theta[k] = theta[k].clamp(lo.ln(), hi.ln());
    }
}

/// Apply the tuned weights of `tuned` onto `base`, keeping base's schedule
pub fn apply_tuned(base: &PhysicsParams, tuned: &PhysicsParams) -> PhysicsParams {
    PhysicsParams {
        repulsion: tuned.repulsion,
        attraction: tuned.attraction,
        boundary_strength: tuned.boundary_strength,
        temperature: tuned.temperature,
        ..*base
    }
}

pub struct Tuner<'a> {
    config: &'a TuningConfig,
    evaluator: &'a LayoutEvaluator,
}

impl<'a> Tuner<'a> {
    pub fn new(config: &'a TuningConfig, evaluator: &'a LayoutEvaluator) -> Self {
        Self { config, evaluator }
    }

    /// Loss of a short probe run with `params`
    fn objective(&self, ctx: &SolveContext<'_>, params: PhysicsParams) -> f64 {
        let probe = ctx.starting_from(ctx.initial).with_physics(params);
        let out = ForceDirected::simulate(&probe, self.config.probe_iterations);
        let quality = self
            .evaluator
            .evaluate(ctx.scene, ctx.detector, &out.centers)
            .overall;
        loss(&LossTerms::measure(ctx, &out.centers, quality), &self.config.loss)
    }

    /// Tuned physics for the context's scene, from the cache when possible
    pub fn tune(
        &self,
        ctx: &SolveContext<'_>,
        bucket: ComplexityBucket,
        cache: &WeightCache,
    ) -> (PhysicsParams, TuningDiagnostics) {
        let base = ctx.physics;
        if let Some(cached) = cache.get(&bucket) {
            let params = apply_tuned(&base, &cached.params);
            // cached.loss belongs to the scene that filled the entry
            return (
                params,
                TuningDiagnostics {
                    bucket,
                    cache_hit: true,
                    steps: 0,
                    initial_loss: self.objective(ctx, base),
                    final_loss: self.objective(ctx, params),
                    stopped_early: false,
                    params,
                },
            );
        }

        let cfg = self.config;
        let mut theta = encode(&base);
        let initial_loss = self.objective(ctx, decode(&theta, &base));
        let mut best_loss = initial_loss;
        let mut best_theta = theta;
        let mut m = [0.0; DIMENSIONS];
        let mut v = [0.0; DIMENSIONS];
        let mut stale = 0;
        let mut steps = 0;
        let mut stopped_early = false;

        while steps < cfg.max_steps {
            if ctx.time_exhausted().is_some() {
                tracing::warn!(steps, "tuning stopped by the time budget");
                break;
            }

            let mut grad = [0.0; DIMENSIONS];
            for k in 0..DIMENSIONS {
                let mut plus = theta;
                let mut minus = theta;
                plus[k] += cfg.probe_step;
                minus[k] -= cfg.probe_step;
                let up = self.objective(ctx, decode(&plus, &base));
                let down = self.objective(ctx, decode(&minus, &base));
                grad[k] = (up - down) / (2.0 * cfg.probe_step);
            }

            let norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
            if norm > cfg.clip_norm {
                let scale = cfg.clip_norm / norm;
                grad.iter_mut().for_each(|g| *g *= scale);
            }

            steps += 1;
            let lr = cfg.schedule.rate_at(cfg.learning_rate, steps - 1);
            let bias1 = 1.0 - cfg.beta1.powi(steps as i32);
            let bias2 = 1.0 - cfg.beta2.powi(steps as i32);
            for k in 0..DIMENSIONS {
                m[k] = cfg.beta1 * m[k] + (1.0 - cfg.beta1) * grad[k];
                v[k] = cfg.beta2 * v[k] + (1.0 - cfg.beta2) * grad[k] * grad[k];
                let m_hat = m[k] / bias1;
                let v_hat = v[k] / bias2;
                theta[k] -= lr * m_hat / (v_hat.sqrt() + cfg.adam_epsilon);
            }
            clamp_theta(&mut theta);

            let current = self.objective(ctx, decode(&theta, &base));
            tracing::debug!(step = steps, loss = current, lr, grad_norm = norm, "tuning step");
            if current < best_loss - cfg.min_delta {
                best_loss = current;
                best_theta = theta;
                stale = 0;
            } else {
                stale += 1;
                if stale >= cfg.patience {
                    stopped_early = true;
                    break;
                }
            }
        }

        let params = decode(&best_theta, &base);
        cache.insert(
            bucket,
            CachedWeights {
                params,
                loss: best_loss,
            },
        );
        tracing::info!(
            steps,
            initial_loss,
            final_loss = best_loss,
            stopped_early,
            "physics weights tuned"
        );

        (
            params,
            TuningDiagnostics {
                bucket,
                cache_hit: false,
                steps,
                initial_loss,
                final_loss: best_loss,
                stopped_early,
                params,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, CollisionDetector, Point};
    use crate::layout::{ConstraintSystem, EvaluationWeights, ResolvedConstraints};
    use crate::scene::{Canvas, Element, ElementKind, Scene};

    fn crowded() -> Scene {
        crowded_at(0.0)
    }

    fn crowded_at(x: f64) -> Scene {
        let elements = (0..6)
            .map(|i| {
                Element::new(
                    format!("e{}", i),
                    ElementKind::Shape,
                    BoundingBox::from_center(Point::new(x + i as f64 * 0.2, 0.0), 1.0, 1.0),
                )
            })
            .collect();
        Scene::new(Canvas::default(), elements, ConstraintSystem::new()).unwrap()
    }

    fn bucket() -> ComplexityBucket {
        ComplexityBucket {
            count: 2,
            density: 1,
            overlap: 10,
            constraints: 0,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        TuningConfig::default().validate().unwrap();
        let bad = TuningConfig {
            schedule: LrSchedule::Step { every: 0, factor: 0.5 },
            ..TuningConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_schedules_decay() {
        let exp = LrSchedule::Exponential { rate: 0.5 };
        assert_eq!(exp.rate_at(1.0, 0), 1.0);
        assert_eq!(exp.rate_at(1.0, 2), 0.25);
        let step = LrSchedule::Step { every: 3, factor: 0.1 };
        assert_eq!(step.rate_at(1.0, 2), 1.0);
        assert!((step.rate_at(1.0, 3) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let params = PhysicsParams::default();
        let back = decode(&encode(&params), &params);
        assert!((back.repulsion - params.repulsion).abs() < 1e-12);
        assert!((back.attraction - params.attraction).abs() < 1e-12);
        assert!((back.temperature - params.temperature).abs() < 1e-12);
        assert_eq!(back.max_iterations, params.max_iterations);
    }

    #[test]
    fn test_tuning_never_worsens_and_is_cached() {
        let scene = crowded();
        let constraints = ResolvedConstraints::default();
        let detector = CollisionDetector::default();
        let initial = scene.original_centers();
        let ctx = SolveContext::new(&scene, &constraints, &detector, &initial);
        let config = TuningConfig {
            max_steps: 3,
            probe_iterations: 20,
            ..TuningConfig::default()
        };
        let evaluator = LayoutEvaluator::new(EvaluationWeights::default(), 0.2);
        let cache = WeightCache::new(4);
        let tuner = Tuner::new(&config, &evaluator);

        let (params, first) = tuner.tune(&ctx, bucket(), &cache);
        assert!(!first.cache_hit);
        assert!(first.steps <= 3);
        assert!(first.final_loss <= first.initial_loss);
        assert!(params.validate().is_ok());

        let (again, second) = tuner.tune(&ctx, bucket(), &cache);
        assert!(second.cache_hit);
        assert_eq!(second.steps, 0);
        assert_eq!(again, params);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_hit_reports_losses_of_the_current_scene() {
        let constraints = ResolvedConstraints::default();
        let detector = CollisionDetector::default();
        let config = TuningConfig {
            max_steps: 2,
            probe_iterations: 20,
            ..TuningConfig::default()
        };
        let evaluator = LayoutEvaluator::new(EvaluationWeights::default(), 0.2);
        let cache = WeightCache::new(4);
        let tuner = Tuner::new(&config, &evaluator);

        let first_scene = crowded();
        let first_initial = first_scene.original_centers();
        let first_ctx = SolveContext::new(&first_scene, &constraints, &detector, &first_initial);
        tuner.tune(&first_ctx, bucket(), &cache);

        let second_scene = crowded_at(-3.0);
        let second_initial = second_scene.original_centers();
        let second_ctx = SolveContext::new(&second_scene, &constraints, &detector, &second_initial);
        let (params, hit) = tuner.tune(&second_ctx, bucket(), &cache);

        assert!(hit.cache_hit);
        assert_eq!(hit.initial_loss, tuner.objective(&second_ctx, second_ctx.physics));
        assert_eq!(hit.final_loss, tuner.objective(&second_ctx, params));
    }
}
