//! Declarative transform trees.
//!
//! A [`PipelineConfig`] is a versioned JSON document describing a whole
//! transform tree:
//!
//! ```json
//! {
//!   "v": 1,
//!   "seed": 42,
//!   "root": {
//!     "type": "sequence",
//!     "children": [
//!       { "type": "probability", "p": 0.5,
//!         "transform": { "type": "flip", "axes": [0] } },
//!       { "type": "random_choice",
//!         "children": [
//!           { "type": "gamma", "gamma": { "kind": "uniform", "low": 0.5, "high": 1.5 } },
//!           { "type": "identity" }
//!         ] }
//!     ]
//!   }
//! }
//! ```

use crate::error::{Result, TransformError};
use crate::fov::{
    Crop, CropConfig, Pad, PadConfig, Patch, PatchConfig, PowerTwo, PowerTwoConfig, RandomPatch,
    RandomPatchConfig,
};
use crate::geometric::{Flip, FlipConfig, RandomFlip, RandomFlipConfig, Translate, TranslateConfig};
use crate::intensity::{
    Gamma, GammaConfig, GaussianNoise, GaussianNoiseConfig, IntensityScale, IntensityScaleConfig,
};
use cornucopia_core::{
    CoreError, Identity, Pipeline, Probability, RandomChoice, RandomOrder, RandomSubset, Seed,
    Sequence, SubsetSize, Transform,
};
use serde::{Deserialize, Serialize};

/// Configuration document version understood by this crate.
pub const CONFIG_VERSION: u32 = 1;

/// One node of a declarative transform tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformConfig {
    /// Returns its input unchanged.
    Identity,
    /// Applies every child in order.
    Sequence {
        /// Child nodes.
        children: Vec<TransformConfig>,
    },
    /// Applies every child in a random order.
    RandomOrder {
        /// Child nodes.
        children: Vec<TransformConfig>,
    },
    /// Applies its child with probability `p`.
    Probability {
        /// Gate probability in `[0, 1]`.
        p: f64,
        /// Gated node.
        transform: Box<TransformConfig>,
    },
    /// Applies one child drawn by weight.
    RandomChoice {
        /// Child nodes.
        children: Vec<TransformConfig>,
        /// Relative weights; uniform when omitted.
        #[serde(default)]
        weights: Option<Vec<f64>>,
    },
    /// Applies a random subset of its children.
    RandomSubset {
        /// Child nodes.
        children: Vec<TransformConfig>,
        /// Exact subset size.
        #[serde(default)]
        k: Option<usize>,
        /// Smallest subset size (inclusive).
        #[serde(default)]
        min: Option<usize>,
        /// Largest subset size (inclusive).
        #[serde(default)]
        max: Option<usize>,
        /// Apply the chosen children in random order.
        #[serde(default)]
        random_order: bool,
    },
    /// [`Gamma`].
    Gamma(GammaConfig),
    /// [`IntensityScale`].
    IntensityScale(IntensityScaleConfig),
    /// [`GaussianNoise`].
    GaussianNoise(GaussianNoiseConfig),
    /// [`Flip`].
    Flip(FlipConfig),
    /// [`RandomFlip`].
    RandomFlip(RandomFlipConfig),
    /// [`Translate`].
    Translate(TranslateConfig),
    /// [`Crop`].
    Crop(CropConfig),
    /// [`Pad`].
    Pad(PadConfig),
    /// [`Patch`].
    Patch(PatchConfig),
    /// [`RandomPatch`].
    RandomPatch(RandomPatchConfig),
    /// [`PowerTwo`].
    PowerTwo(PowerTwoConfig),
}

fn build_children(children: &[TransformConfig]) -> Result<Vec<Box<dyn Transform>>> {
    children
        .iter()
        .enumerate()
        .map(|(i, child)| {
            child.build().map_err(|err| match err {
                TransformError::Core(err) => TransformError::Core(err.nested(i)),
                other => other,
            })
        })
        .collect()
}

fn subset_size(k: Option<usize>, min: Option<usize>, max: Option<usize>) -> Result<SubsetSize> {
    match (k, min, max) {
        (Some(k), None, None) => Ok(SubsetSize::Exact(k)),
        (None, None, None) => Ok(SubsetSize::Any),
        (None, Some(min), Some(max)) => Ok(SubsetSize::Range { min, max }),
        _ => Err(TransformError::InvalidConfig(
            "random_subset takes either `k` or both `min` and `max`".to_string(),
        )),
    }
}

impl TransformConfig {
    /// Node type name as written in JSON.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Sequence { .. } => "sequence",
            Self::RandomOrder { .. } => "random_order",
            Self::Probability { .. } => "probability",
            Self::RandomChoice { .. } => "random_choice",
            Self::RandomSubset { .. } => "random_subset",
            Self::Gamma(_) => "gamma",
            Self::IntensityScale(_) => "intensity_scale",
            Self::GaussianNoise(_) => "gaussian_noise",
            Self::Flip(_) => "flip",
            Self::RandomFlip(_) => "random_flip",
            Self::Translate(_) => "translate",
            Self::Crop(_) => "crop",
            Self::Pad(_) => "pad",
            Self::Patch(_) => "patch",
            Self::RandomPatch(_) => "random_patch",
            Self::PowerTwo(_) => "power_two",
        }
    }

    /// Build the transform tree.
    ///
    /// Parameter distributions are validated here so a bad document fails
    /// before any data is touched.
    ///
    /// # Errors
    ///
    /// A configuration error, located at the offending node, for invalid
    /// distributions, probabilities or subset sizes.
    pub fn build(&self) -> Result<Box<dyn Transform>> {
        let transform: Box<dyn Transform> = match self {
            Self::Identity => Box::new(Identity),
            Self::Sequence { children } => Box::new(Sequence::from_vec(build_children(children)?)),
            Self::RandomOrder { children } => {
                Box::new(RandomOrder::from_vec(build_children(children)?))
            }
            Self::Probability { p, transform } => {
                if !(0.0..=1.0).contains(p) {
                    return Err(CoreError::configuration(
                        "Probability",
                        format!("p must lie in [0, 1], got {p}"),
                    )
                    .into());
                }
                let child = transform.build().map_err(|err| match err {
                    TransformError::Core(err) => TransformError::Core(err.nested(0)),
                    other => other,
                })?;
                Box::new(Probability::new(child, *p))
            }
            Self::RandomChoice { children, weights } => {
                let choice = RandomChoice::from_vec(build_children(children)?);
                match weights {
                    Some(weights) => Box::new(choice.with_weights(weights.clone())),
                    None => Box::new(choice),
                }
            }
            Self::RandomSubset {
                children,
                k,
                min,
                max,
                random_order,
            } => Box::new(
                RandomSubset::from_vec(build_children(children)?, subset_size(*k, *min, *max)?)
                    .with_random_order(*random_order),
            ),
            Self::Gamma(config) => {
                let gamma = Gamma::from_config(config.clone());
                gamma.parameter_spec().validate(gamma.name())?;
                Box::new(gamma)
            }
            Self::IntensityScale(config) => {
                let scale = IntensityScale::from_config(config.clone());
                scale.parameter_spec().validate(scale.name())?;
                Box::new(scale)
            }
            Self::GaussianNoise(config) => {
                let noise = GaussianNoise::from_config(config.clone());
                noise.parameter_spec().validate(noise.name())?;
                Box::new(noise)
            }
            Self::Flip(config) => Box::new(Flip::from_config(config.clone())),
            Self::RandomFlip(config) => {
                let flip = RandomFlip::from_config(config.clone());
                flip.parameter_spec().validate(flip.name())?;
                Box::new(flip)
            }
            Self::Translate(config) => {
                let translate = Translate::from_config(config.clone());
                translate.parameter_spec().validate(translate.name())?;
                Box::new(translate)
            }
            Self::Crop(config) => Box::new(Crop::from_config(config.clone())),
            Self::Pad(config) => Box::new(Pad::from_config(config.clone())),
            Self::Patch(config) => Box::new(Patch::from_config(config.clone())),
            Self::RandomPatch(config) => Box::new(RandomPatch::from_config(config.clone())),
            Self::PowerTwo(config) => Box::new(PowerTwo::from_config(config.clone())),
        };
        tracing::trace!(node = self.type_name(), "built transform");
        Ok(transform)
    }
}

/// Top-level pipeline document (v1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Document version (currently `1`).
    pub v: u32,

    /// Default seed for runs that do not supply one.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Root of the transform tree.
    pub root: TransformConfig,
}

impl PipelineConfig {
    /// Wrap a tree in a current-version document.
    #[must_use]
    pub fn new(root: TransformConfig) -> Self {
        Self {
            v: CONFIG_VERSION,
            seed: None,
            root,
        }
    }

    /// Set the default seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for malformed JSON or unknown node types,
    /// `UnsupportedVersion` for any version other than [`CONFIG_VERSION`].
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.v != CONFIG_VERSION {
            return Err(TransformError::UnsupportedVersion {
                found: config.v,
                supported: CONFIG_VERSION,
            });
        }
        Ok(config)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Default seed, if the document sets one.
    #[must_use]
    pub fn seed(&self) -> Option<Seed> {
        self.seed.map(Seed::new)
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// See [`TransformConfig::build`].
    pub fn build(&self) -> Result<Pipeline> {
        let root = self.root.build()?;
        tracing::debug!(root = self.root.type_name(), seed = ?self.seed, "built pipeline");
        Ok(Pipeline::from_boxed(root))
    }
}
