//! The two-phase transform contract.

use crate::bundle::Bundle;
use crate::error::Result;
use crate::params::Params;
use crate::sampler::Sampler;

/// A transform that separates random-parameter sampling from application.
///
/// - [`Transform::sample`] draws everything the transform needs from the
///   sampler it is handed (already a fork owned by this node) and returns
///   it as an immutable [`Params`] value.
/// - [`Transform::apply`] is a pure function of previously sampled
///   parameters and a bundle. It must not draw randomness and must return a
///   new bundle rather than mutate its input.
///
/// Transforms hold no mutable state between invocations, so one tree can be
/// shared by concurrent runs as long as each run has its own sampler.
///
/// # Example
///
/// ```rust
/// use cornucopia_core::{Bundle, Params, Result, Sampler, Transform};
///
/// struct Passthrough;
///
/// impl Transform for Passthrough {
///     fn sample(&self, _sampler: &mut Sampler) -> Result<Params> {
///         Ok(Params::empty())
///     }
///
///     fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
///         params.expect_leaf(self.name())?;
///         Ok(bundle.clone())
///     }
///
///     fn name(&self) -> &str {
///         "Passthrough"
///     }
/// }
/// ```
pub trait Transform: Send + Sync {
    /// Draw this transform's parameters.
    ///
    /// # Errors
    ///
    /// Configuration or shape errors from the parameter specification.
    fn sample(&self, sampler: &mut Sampler) -> Result<Params>;

    /// Apply previously sampled parameters to a bundle.
    ///
    /// # Errors
    ///
    /// Shape, role or replay errors; on error no bundle is produced.
    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle>;

    /// Get the name of this transform for logging/debugging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        (**self).sample(sampler)
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        (**self).apply(params, bundle)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Identity transform that passes through data unchanged.
///
/// Useful as a placeholder, e.g. the "do nothing" arm of a random choice.
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl Transform for Identity {
    fn sample(&self, _sampler: &mut Sampler) -> Result<Params> {
        Ok(Params::empty())
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        params.expect_leaf(self.name())?;
        Ok(bundle.clone())
    }

    fn name(&self) -> &str {
        "Identity"
    }
}
