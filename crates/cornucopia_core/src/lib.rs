//! # cornucopia_core
//!
//! Stochastic transform composition engine for synthetic medical-imaging
//! data.
//!
//! This crate provides:
//! - [`Seed`] and [`Sampler`] for reproducible, forkable randomness
//! - [`Distribution`] and [`ParameterSpec`] to declare what a transform samples
//! - [`Params`], the realized parameter tree, serializable for audit/replay
//! - [`Bundle`] of role-tagged, co-registered tensors
//! - the [`Transform`] trait and structural combinators ([`Sequence`],
//!   [`RandomOrder`], [`Probability`], [`RandomChoice`], [`RandomSubset`])
//! - the [`Pipeline`] executor (`run`, `replay`, `run_batch`)
//!
//! ## Two phases
//!
//! `sample` walks the tree once and returns a [`Params`] tree isomorphic to
//! it; `apply` walks it again, applying each node's realized parameters.
//! Because `apply` draws no randomness, a realized tree can be replayed on
//! another bundle, e.g. a label map or a higher-resolution companion volume.
//!
//! ## Example
//!
//! ```rust
//! use cornucopia_core::{Bundle, Identity, Member, Pipeline, Probability, RandomChoice, Seed, Sequence};
//! use ndarray::Array3;
//!
//! let tree = Sequence::new()
//!     .then(Probability::new(Identity, 0.5))
//!     .then(RandomChoice::new().or(Identity).or(Identity));
//! let pipeline = Pipeline::new(tree);
//!
//! let bundle = Bundle::new().with("image", Member::intensity(Array3::<f32>::zeros((1, 8, 8))));
//! let (out, params) = pipeline.run(&bundle, Some(Seed::new(42))).unwrap();
//! assert_eq!(pipeline.replay(&params, &bundle).unwrap(), out);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod bundle;
mod compose;
mod distribution;
mod error;
mod params;
mod pipeline;
mod sampler;
mod seed;
mod transform;
mod value;

pub use bundle::{Bundle, Interpolation, Member, MemberKind, Targets, Tensor};
pub use compose::{Probability, RandomChoice, RandomOrder, RandomSubset, Sequence, SubsetSize};
pub use distribution::{Arg, Distribution};
pub use error::{CoreError, NodePath, Result};
pub use params::{LeafParams, ParamMap, ParameterEntry, ParameterSpec, Params};
pub use pipeline::{replay, run, Pipeline};
pub use sampler::Sampler;
pub use seed::Seed;
pub use transform::{Identity, Transform};
pub use value::Value;
