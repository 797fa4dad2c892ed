//! # cornucopia
//!
//! Stochastic, replayable augmentation pipelines for synthetic
//! medical-imaging data.
//!
//! - **Core**: seeds, samplers, distributions, realized parameter trees,
//!   bundles of role-tagged tensors, combinators and the pipeline executor
//! - **Transforms**: intensity, geometric and field-of-view leaves, plus
//!   JSON pipeline documents
//!
//! ## Quick Start
//!
//! ```rust
//! use cornucopia::prelude::*;
//! use ndarray::Array3;
//!
//! let pipeline = Pipeline::new(
//!     Sequence::new()
//!         .then(Probability::new(Flip::new(vec![0]), 0.5))
//!         .then(RandomChoice::new().or(Gamma::new(0.5, 1.5)).or(Identity)),
//! );
//!
//! let image = Array3::from_shape_fn((1, 8, 8), |(_, i, j)| (i * 8 + j) as f32);
//! let label = image.mapv(|v| (v as u32 % 3) as f32);
//! let bundle = Bundle::new()
//!     .with("image", Member::intensity(image))
//!     .with("label", Member::label(label));
//!
//! let (augmented, params) = pipeline.run(&bundle, Some(Seed::new(42))).unwrap();
//! let json = params.to_json().unwrap();
//! let restored = Params::from_json(&json).unwrap();
//! assert_eq!(pipeline.replay(&restored, &bundle).unwrap(), augmented);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub use cornucopia_core as core;
pub use cornucopia_transforms as transforms;

/// Prelude module for convenient imports.
///
/// ```rust
/// use cornucopia::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use cornucopia_core::{
        Arg, Bundle, CoreError, Distribution, Identity, Member, MemberKind, ParameterSpec,
        Params, Pipeline, Result, Sampler, Seed, Targets, Transform, Value,
    };

    // Combinators
    pub use cornucopia_core::{
        Probability, RandomChoice, RandomOrder, RandomSubset, Sequence, SubsetSize,
    };

    // Transforms
    pub use cornucopia_transforms::{
        Boundary, Crop, Flip, FlipMode, Gamma, GaussianNoise, IntensityScale, Pad, Patch,
        PipelineConfig, PowerTwo, RandomFlip, RandomPatch, Side, TransformConfig, TransformError,
        Translate, Unit,
    };
}
