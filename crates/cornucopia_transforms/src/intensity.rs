//! Intensity transforms.
//!
//! These act on [`MemberKind::Intensity`] members only; label maps and
//! k-space members pass through sharing their buffers.

use cornucopia_core::{
    Bundle, Distribution, MemberKind, ParameterSpec, Params, Result, Sampler, Seed, Targets,
    Tensor, Transform, Value,
};
use rand::prelude::*;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

const INTENSITY: &[MemberKind] = &[MemberKind::Intensity];

/// Configuration for gamma correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GammaConfig {
    /// Distribution of the exponent.
    pub gamma: Distribution,
    /// Members to act on.
    pub targets: Targets,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            gamma: Distribution::uniform(0.5, 1.5),
            targets: Targets::All,
        }
    }
}

/// Random gamma correction.
///
/// Each image is min-max normalised, raised to the sampled exponent and
/// mapped back to its original range. Constant images are left unchanged.
///
/// # Example
///
/// ```rust
/// use cornucopia_transforms::Gamma;
///
/// let gamma = Gamma::new(0.5, 1.5);
/// ```
#[derive(Debug, Clone)]
pub struct Gamma {
    config: GammaConfig,
}

impl Gamma {
    /// Exponent uniform in `[low, high)`.
    #[must_use]
    pub fn new(low: f64, high: f64) -> Self {
        Self::from_config(GammaConfig {
            gamma: Distribution::uniform(low, high),
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: GammaConfig) -> Self {
        Self { config }
    }

    /// Set the exponent distribution.
    #[must_use]
    pub fn with_distribution(mut self, gamma: Distribution) -> Self {
        self.config.gamma = gamma;
        self
    }

    /// Restrict to some roles.
    #[must_use]
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.config.targets = targets;
        self
    }

    /// Parameters this transform samples.
    #[must_use]
    pub fn parameter_spec(&self) -> ParameterSpec {
        ParameterSpec::new().with("gamma", self.config.gamma.clone())
    }
}

fn min_max(data: &Tensor) -> (f32, f32) {
    data.iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

impl Transform for Gamma {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::leaf(self.parameter_spec().sample(self.name(), sampler)?))
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let gamma = params.expect_leaf(self.name())?.float("gamma")?;
        bundle.map_members(self.name(), &self.config.targets, INTENSITY, |_, member| {
            let data = member.data();
            let (lo, hi) = min_max(data);
            if hi <= lo {
                return Ok(data.clone());
            }
            let range = f64::from(hi - lo);
            Ok(data
                .mapv(|v| {
                    let t = f64::from(v - lo) / range;
                    (f64::from(lo) + range * t.powf(gamma)) as f32
                })
                .into_shared())
        })
    }

    fn name(&self) -> &str {
        "Gamma"
    }
}

/// Configuration for multiplicative intensity scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityScaleConfig {
    /// Distribution of the gain.
    pub factor: Distribution,
    /// Members to act on.
    pub targets: Targets,
}

impl Default for IntensityScaleConfig {
    fn default() -> Self {
        Self {
            factor: Distribution::log_uniform(0.8, 1.25),
            targets: Targets::All,
        }
    }
}

/// Multiplies intensities by a sampled gain.
#[derive(Debug, Clone)]
pub struct IntensityScale {
    config: IntensityScaleConfig,
}

impl IntensityScale {
    /// Gain log-uniform in `[low, high)`.
    #[must_use]
    pub fn new(low: f64, high: f64) -> Self {
        Self::from_config(IntensityScaleConfig {
            factor: Distribution::log_uniform(low, high),
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: IntensityScaleConfig) -> Self {
        Self { config }
    }

    /// Restrict to some roles.
    #[must_use]
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.config.targets = targets;
        self
    }

    /// Parameters this transform samples.
    #[must_use]
    pub fn parameter_spec(&self) -> ParameterSpec {
        ParameterSpec::new().with("factor", self.config.factor.clone())
    }
}

impl Transform for IntensityScale {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::leaf(self.parameter_spec().sample(self.name(), sampler)?))
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let factor = params.expect_leaf(self.name())?.float("factor")? as f32;
        bundle.map_members(self.name(), &self.config.targets, INTENSITY, |_, member| {
            Ok(member.data().mapv(|v| v * factor).into_shared())
        })
    }

    fn name(&self) -> &str {
        "IntensityScale"
    }
}

/// Configuration for additive Gaussian noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianNoiseConfig {
    /// Distribution of the noise standard deviation.
    pub std: Distribution,
    /// Members to act on.
    pub targets: Targets,
}

impl Default for GaussianNoiseConfig {
    fn default() -> Self {
        Self {
            std: Distribution::uniform(0.0, 0.1),
            targets: Targets::All,
        }
    }
}

/// Adds Gaussian noise with a sampled standard deviation.
///
/// The noise field itself is not stored in the parameters: a `noise_seed` is
/// sampled instead and the field is regenerated from it (and the member's
/// role) at apply time, so replay reproduces it exactly without drawing from
/// the sampler.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    config: GaussianNoiseConfig,
}

impl GaussianNoise {
    /// Standard deviation uniform in `[0, max_std)`.
    #[must_use]
    pub fn new(max_std: f64) -> Self {
        Self::from_config(GaussianNoiseConfig {
            std: Distribution::upper(max_std),
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: GaussianNoiseConfig) -> Self {
        Self { config }
    }

    /// Restrict to some roles.
    #[must_use]
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.config.targets = targets;
        self
    }

    /// Parameters this transform samples from distributions.
    #[must_use]
    pub fn parameter_spec(&self) -> ParameterSpec {
        ParameterSpec::new().with("std", self.config.std.clone())
    }
}

impl Transform for GaussianNoise {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        let mut values = self.parameter_spec().sample(self.name(), sampler)?;
        values.insert("noise_seed".to_string(), Value::Int(sampler.next_u64() as i64));
        Ok(Params::leaf(values))
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let leaf = params.expect_leaf(self.name())?;
        let std = leaf.float("std")?;
        let seed = Seed::new(leaf.seed("noise_seed")?);
        bundle.map_members(self.name(), &self.config.targets, INTENSITY, |role, member| {
            let mut rng = seed.derive(role).to_rng();
            Ok(member
                .data()
                .mapv(|v| {
                    let z: f64 = rng.sample(StandardNormal);
                    (f64::from(v) + std * z) as f32
                })
                .into_shared())
        })
    }

    fn name(&self) -> &str {
        "GaussianNoise"
    }
}
