//! # cornucopia_transforms
//!
//! Leaf transforms for [`cornucopia_core`] trees, and declarative pipeline
//! documents.
//!
//! This crate provides:
//! - Intensity transforms ([`Gamma`], [`IntensityScale`], [`GaussianNoise`])
//! - Geometric transforms ([`Flip`], [`RandomFlip`], [`Translate`])
//! - Field-of-view transforms ([`Crop`], [`Pad`], [`Patch`], [`RandomPatch`], [`PowerTwo`])
//! - [`PipelineConfig`] / [`TransformConfig`] to build trees from JSON
//!
//! Every leaf declares what it samples and is configured through an
//! `XConfig` struct. Transforms that keep the spatial shape can be
//! restricted to some roles of a bundle with [`cornucopia_core::Targets`];
//! field-of-view transforms always act on every member.
//!
//! ## Example
//!
//! ```rust
//! use cornucopia_core::{Bundle, Member, Pipeline, Probability, RandomChoice, Seed, Sequence, Identity};
//! use cornucopia_transforms::{Flip, Gamma};
//! use ndarray::Array3;
//!
//! let pipeline = Pipeline::new(
//!     Sequence::new()
//!         .then(Probability::new(Flip::new(vec![0]), 0.5))
//!         .then(RandomChoice::new().or(Gamma::new(0.5, 1.5)).or(Identity)),
//! );
//!
//! let image = Array3::from_shape_fn((1, 8, 8), |(_, i, j)| (i + j) as f32);
//! let bundle = Bundle::new().with("image", Member::intensity(image));
//! let (out, params) = pipeline.run(&bundle, Some(Seed::new(42))).unwrap();
//! assert_eq!(pipeline.replay(&params, &bundle).unwrap(), out);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fov;
pub mod geometric;
pub mod intensity;
mod resample;

pub use config::{PipelineConfig, TransformConfig, CONFIG_VERSION};
pub use error::{Result, TransformError};
pub use fov::*;
pub use geometric::*;
pub use intensity::*;
