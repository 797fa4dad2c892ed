//! Geometric transforms.
//!
//! Geometric transforms move voxels, so they act on every member of the
//! bundle with the same parameters. Each member is resampled with its own
//! interpolation: label maps use nearest neighbour and never gain values
//! that were not already present.

use crate::resample;
use cornucopia_core::{
    Bundle, CoreError, Distribution, MemberKind, ParameterSpec, Params, Result, Sampler, Targets,
    Transform, Value,
};
use serde::{Deserialize, Serialize};

pub(crate) const ALL_KINDS: &[MemberKind] =
    &[MemberKind::Intensity, MemberKind::Label, MemberKind::KSpace];

/// Check that a per-axis parameter has one entry per spatial axis of the
/// bundle. Empty bundles accept anything.
pub(crate) fn check_rank(bundle: &Bundle, transform: &str, name: &str, len: usize) -> Result<()> {
    match bundle.spatial_shape(transform)? {
        Some(shape) if shape.len() != len => Err(CoreError::shape_mismatch(
            transform,
            name,
            format!("{len} values for a bundle with {} spatial axes", shape.len()),
        )),
        _ => Ok(()),
    }
}

/// Configuration for a deterministic flip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipConfig {
    /// Spatial axes to reverse (0 is the first axis after the channel).
    pub axes: Vec<usize>,
    /// Members to act on.
    pub targets: Targets,
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            axes: vec![0],
            targets: Targets::All,
        }
    }
}

/// Reverse fixed spatial axes. Has no random parameters.
///
/// # Example
///
/// ```rust
/// use cornucopia_transforms::Flip;
///
/// let flip = Flip::new(vec![0, 2]);
/// assert_eq!(flip.axes(), &[0, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Flip {
    config: FlipConfig,
}

impl Flip {
    /// Flip the given axes.
    #[must_use]
    pub fn new(axes: Vec<usize>) -> Self {
        Self::from_config(FlipConfig {
            axes,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: FlipConfig) -> Self {
        Self { config }
    }

    /// Restrict to some roles.
    #[must_use]
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.config.targets = targets;
        self
    }

    /// Axes being flipped.
    #[must_use]
    pub fn axes(&self) -> &[usize] {
        &self.config.axes
    }
}

impl Transform for Flip {
    fn sample(&self, _sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::empty())
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        params.expect_leaf(self.name())?;
        if let Some(shape) = bundle.spatial_shape(self.name())? {
            if let Some(&axis) = self.config.axes.iter().find(|&&a| a >= shape.len()) {
                return Err(CoreError::shape_mismatch(
                    self.name(),
                    "axes",
                    format!("axis {axis} out of range for {} spatial axes", shape.len()),
                ));
            }
        }
        bundle.map_members(self.name(), &self.config.targets, ALL_KINDS, |_, member| {
            Ok(resample::flip(member.data(), &self.config.axes))
        })
    }

    fn name(&self) -> &str {
        "Flip"
    }
}

/// How [`RandomFlip`] picks the flipped axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipMode {
    /// Each axis flips independently with probability `p`; possibly none.
    #[default]
    Independent,
    /// A random number of distinct axes in `1..=ndim` flips; `p` is unused.
    AtLeastOne,
}

/// Configuration for random flips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomFlipConfig {
    /// Probability of flipping each axis.
    pub p: f64,
    /// Number of spatial axes of the data.
    pub ndim: usize,
    /// How flipped axes are picked.
    pub mode: FlipMode,
    /// Members to act on.
    pub targets: Targets,
}

impl Default for RandomFlipConfig {
    fn default() -> Self {
        Self {
            p: 0.5,
            ndim: 3,
            mode: FlipMode::Independent,
            targets: Targets::All,
        }
    }
}

/// Flip a random set of spatial axes.
///
/// Realized parameters are a `flip` flag per axis in both modes.
#[derive(Debug, Clone)]
pub struct RandomFlip {
    config: RandomFlipConfig,
}

impl RandomFlip {
    /// Random flips over `ndim` spatial axes.
    #[must_use]
    pub fn new(ndim: usize) -> Self {
        Self::from_config(RandomFlipConfig {
            ndim,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: RandomFlipConfig) -> Self {
        Self { config }
    }

    /// Set the per-axis probability.
    #[must_use]
    pub fn with_p(mut self, p: f64) -> Self {
        self.config.p = p;
        self
    }

    /// Set the axis selection mode.
    #[must_use]
    pub fn with_mode(mut self, mode: FlipMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Restrict to some roles.
    #[must_use]
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.config.targets = targets;
        self
    }

    /// Parameters this transform samples.
    ///
    /// [`FlipMode::AtLeastOne`] draws the flipped `axes` and records them
    /// as `flip` flags.
    #[must_use]
    pub fn parameter_spec(&self) -> ParameterSpec {
        match self.config.mode {
            FlipMode::Independent => ParameterSpec::new().with_shape(
                "flip",
                Distribution::bernoulli(self.config.p),
                vec![self.config.ndim],
            ),
            FlipMode::AtLeastOne => ParameterSpec::new().with(
                "axes",
                Distribution::rand_k_from((0..self.config.ndim as i64).collect(), None, false),
            ),
        }
    }
}

impl Transform for RandomFlip {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        let mut values = self.parameter_spec().sample(self.name(), sampler)?;
        if let Some(Value::IntVector(axes)) = values.remove("axes") {
            let mut flip = vec![false; self.config.ndim];
            for axis in axes {
                if let Some(flag) = usize::try_from(axis).ok().and_then(|a| flip.get_mut(a)) {
                    *flag = true;
                }
            }
            values.insert("flip".to_string(), Value::BoolVector(flip));
        }
        Ok(Params::leaf(values))
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let flips = params.expect_leaf(self.name())?.bools("flip")?;
        check_rank(bundle, self.name(), "flip", flips.len())?;
        let axes: Vec<usize> = flips
            .iter()
            .enumerate()
            .filter_map(|(axis, &flip)| flip.then_some(axis))
            .collect();
        if axes.is_empty() {
            return Ok(bundle.clone());
        }
        bundle.map_members(self.name(), &self.config.targets, ALL_KINDS, |_, member| {
            Ok(resample::flip(member.data(), &axes))
        })
    }

    fn name(&self) -> &str {
        "RandomFlip"
    }
}

/// Configuration for random translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Distribution of the shift along each axis, in voxels.
    pub shift: Distribution,
    /// Number of spatial axes of the data.
    pub ndim: usize,
    /// Members to act on.
    pub targets: Targets,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            shift: Distribution::symmetric(4.0),
            ndim: 3,
            targets: Targets::All,
        }
    }
}

/// Shift the volume by a sampled sub-voxel offset.
///
/// `output(x) = input(x - shift)`. Voxels shifted in from outside take the
/// nearest edge value.
#[derive(Debug, Clone)]
pub struct Translate {
    config: TranslateConfig,
}

impl Translate {
    /// Shifts uniform in `[-max_shift, max_shift)` along each of `ndim` axes.
    ///
    /// For per-axis ranges, pass a distribution with per-element arguments
    /// to [`Translate::with_distribution`].
    #[must_use]
    pub fn new(max_shift: f64, ndim: usize) -> Self {
        Self::from_config(TranslateConfig {
            shift: Distribution::symmetric(max_shift),
            ndim,
            ..Default::default()
        })
    }

    /// Create from config.
    #[must_use]
    pub fn from_config(config: TranslateConfig) -> Self {
        Self { config }
    }

    /// Set the shift distribution.
    #[must_use]
    pub fn with_distribution(mut self, shift: Distribution) -> Self {
        self.config.shift = shift;
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
        ParameterSpec::new().with_shape("shift", self.config.shift.clone(), vec![self.config.ndim])
    }
}

impl Transform for Translate {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::leaf(self.parameter_spec().sample(self.name(), sampler)?))
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let shift = params.expect_leaf(self.name())?.floats("shift")?;
        check_rank(bundle, self.name(), "shift", shift.len())?;
        bundle.map_members(self.name(), &self.config.targets, ALL_KINDS, |_, member| {
            Ok(resample::translate(member.data(), &shift, member.interpolation()))
        })
    }

    fn name(&self) -> &str {
        "Translate"
    }
}
