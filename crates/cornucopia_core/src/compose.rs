//! Structural combinators.
//!
//! Every combinator is itself a [`Transform`], so trees nest arbitrarily.
//! Children never share a random stream: positional children get positional
//! forks, chosen children get streams keyed by their declaration index.
//! Children errors are re-located under the child's index.

use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::error::{CoreError, Result};
use crate::params::Params;
use crate::sampler::Sampler;
use crate::transform::Transform;

fn sample_child(transform: &dyn Transform, index: usize, sampler: &mut Sampler) -> Result<Params> {
    transform.sample(sampler).map_err(|e| e.nested(index))
}

fn apply_child(
    transform: &dyn Transform,
    index: usize,
    params: &Params,
    bundle: &Bundle,
) -> Result<Bundle> {
    transform.apply(params, bundle).map_err(|e| e.nested(index))
}

fn wrong_node(owner: &str, expected: &str, found: &Params) -> CoreError {
    CoreError::replay_mismatch(
        owner,
        format!("expected a `{expected}` node, found a `{}` node", found.kind()),
    )
}

fn check_arity(owner: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(CoreError::replay_mismatch(
            owner,
            format!("transform has {expected} children but parameters have {found}"),
        ));
    }
    Ok(())
}

/// Applies its children one after the other, in declaration order.
///
/// # Example
///
/// ```rust
/// use cornucopia_core::{Identity, Sequence};
///
/// let seq = Sequence::new().then(Identity).then(Identity);
/// assert_eq!(seq.len(), 2);
/// ```
#[derive(Default)]
pub struct Sequence {
    transforms: Vec<Box<dyn Transform>>,
}

impl Sequence {
    /// Create a new empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Create a sequence from boxed transforms.
    #[must_use]
    pub fn from_vec(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }

    /// Add a transform to the sequence.
    pub fn push<T: Transform + 'static>(&mut self, transform: T) {
        self.transforms.push(Box::new(transform));
    }

    /// Add a transform, builder style.
    #[must_use]
    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.push(transform);
        self
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if the sequence has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for Sequence {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        let mut forks = sampler.fork_n(self.transforms.len());
        let children = self
            .transforms
            .iter()
            .zip(forks.iter_mut())
            .enumerate()
            .map(|(i, (t, s))| sample_child(t.as_ref(), i, s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Params::Sequence { children })
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let Params::Sequence { children } = params else {
            return Err(wrong_node(self.name(), "sequence", params));
        };
        check_arity(self.name(), self.transforms.len(), children.len())?;

        let mut current = bundle.clone();
        for (i, (transform, child)) in self.transforms.iter().zip(children).enumerate() {
            current = apply_child(transform.as_ref(), i, child, &current)?;
        }
        Ok(current)
    }

    fn name(&self) -> &str {
        "Sequence"
    }
}

/// Applies its children in a random order drawn at sample time.
///
/// The drawn permutation is recorded in the parameters and replayed as-is.
#[derive(Default)]
pub struct RandomOrder {
    transforms: Vec<Box<dyn Transform>>,
}

impl RandomOrder {
    /// Create a random-order node from boxed transforms.
    #[must_use]
    pub fn from_vec(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }

    /// Create a new empty node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform, builder style.
    #[must_use]
    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for RandomOrder {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        let mut forks = sampler.fork_n(self.transforms.len());
        let children = self
            .transforms
            .iter()
            .zip(forks.iter_mut())
            .enumerate()
            .map(|(i, (t, s))| sample_child(t.as_ref(), i, s))
            .collect::<Result<Vec<_>>>()?;
        let order = sampler.permutation(self.transforms.len());
        tracing::trace!(?order, "random order drawn");
        Ok(Params::Ordered { order, children })
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let Params::Ordered { order, children } = params else {
            return Err(wrong_node(self.name(), "ordered", params));
        };
        let n = self.transforms.len();
        check_arity(self.name(), n, children.len())?;

        let mut seen = vec![false; n];
        for &i in order {
            if i >= n || std::mem::replace(&mut seen[i], true) {
                return Err(CoreError::replay_mismatch(
                    self.name(),
                    format!("order {order:?} is not a permutation of 0..{n}"),
                ));
            }
        }
        if order.len() != n {
            return Err(CoreError::replay_mismatch(
                self.name(),
                format!("order {order:?} is not a permutation of 0..{n}"),
            ));
        }

        let mut current = bundle.clone();
        for &i in order {
            current = apply_child(self.transforms[i].as_ref(), i, &children[i], &current)?;
        }
        Ok(current)
    }

    fn name(&self) -> &str {
        "RandomOrder"
    }
}

/// Applies its child with probability `p`.
///
/// The gate is drawn first from this node's stream; the child is forked and
/// sampled only when the gate is open, so a closed gate consumes no further
/// randomness.
pub struct Probability {
    transform: Box<dyn Transform>,
    p: f64,
}

impl Probability {
    /// Gate `transform` behind a Bernoulli(`p`) draw.
    pub fn new<T: Transform + 'static>(transform: T, p: f64) -> Self {
        Self {
            transform: Box::new(transform),
            p,
        }
    }

    /// Gate probability.
    #[must_use]
    pub const fn p(&self) -> f64 {
        self.p
    }
}

impl Transform for Probability {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        if !(0.0..=1.0).contains(&self.p) {
            return Err(CoreError::configuration(
                self.name(),
                format!("probability must lie in [0, 1], got {}", self.p),
            ));
        }
        let gate = sampler.bernoulli(self.p);
        tracing::trace!(gate, p = self.p, "probability gate drawn");
        let child = if gate {
            let mut fork = sampler.fork();
            Some(Box::new(sample_child(self.transform.as_ref(), 0, &mut fork)?))
        } else {
            None
        };
        Ok(Params::Gated { gate, child })
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        match params {
            Params::Gated {
                gate: true,
                child: Some(child),
            } => apply_child(self.transform.as_ref(), 0, child, bundle),
            Params::Gated {
                gate: false,
                child: None,
            } => Ok(bundle.clone()),
            Params::Gated { gate, .. } => Err(CoreError::replay_mismatch(
                self.name(),
                format!("gate is {gate} but child parameters are inconsistent with it"),
            )),
            other => Err(wrong_node(self.name(), "gated", other)),
        }
    }

    fn name(&self) -> &str {
        "Probability"
    }
}

/// Applies exactly one of its children, chosen by weight.
///
/// Only the chosen child is sampled, from the stream keyed by its index.
#[derive(Default)]
pub struct RandomChoice {
    transforms: Vec<Box<dyn Transform>>,
    weights: Option<Vec<f64>>,
}

impl RandomChoice {
    /// Uniform choice among boxed transforms.
    #[must_use]
    pub fn from_vec(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self {
            transforms,
            weights: None,
        }
    }

    /// Create a new empty choice.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform, builder style.
    #[must_use]
    pub fn or<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Set selection weights (one per child). Checked at sample time.
    #[must_use]
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Effective weights: the declared ones, or uniform.
    #[must_use]
    pub fn weights(&self) -> Vec<f64> {
        self.weights
            .clone()
            .unwrap_or_else(|| vec![1.0; self.transforms.len()])
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for RandomChoice {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        if self.transforms.is_empty() {
            return Err(CoreError::configuration(self.name(), "no transforms to choose from"));
        }
        let weights = self.weights();
        if weights.len() != self.transforms.len() {
            return Err(CoreError::configuration(
                self.name(),
                format!(
                    "{} weights given for {} transforms",
                    weights.len(),
                    self.transforms.len()
                ),
            ));
        }
        let choice_index = sampler.categorical(&weights).map_err(|e| match e {
            CoreError::Configuration { message, .. } => CoreError::configuration(self.name(), message),
            other => other,
        })?;
        tracing::trace!(choice_index, "random choice drawn");

        let mut fork = sampler.fork_keyed(choice_index as u64);
        let child = sample_child(self.transforms[choice_index].as_ref(), choice_index, &mut fork)?;
        Ok(Params::Choice {
            choice_index,
            child: Box::new(child),
        })
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let Params::Choice {
            choice_index,
            child,
        } = params
        else {
            return Err(wrong_node(self.name(), "choice", params));
        };
        let transform = self.transforms.get(*choice_index).ok_or_else(|| {
            CoreError::replay_mismatch(
                self.name(),
                format!(
                    "choice index {choice_index} out of range for {} transforms",
                    self.transforms.len()
                ),
            )
        })?;
        apply_child(transform.as_ref(), *choice_index, child, bundle)
    }

    fn name(&self) -> &str {
        "RandomChoice"
    }
}

/// How many children a [`RandomSubset`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubsetSize {
    /// Exactly `k`.
    Exact(usize),
    /// Uniform in `min..=max`.
    Range {
        /// Lower bound (inclusive).
        min: usize,
        /// Upper bound (inclusive).
        max: usize,
    },
    /// Uniform in `1..=n`.
    #[default]
    Any,
}

/// Applies a random subset of its children, drawn without replacement.
///
/// Each chosen child samples from the stream keyed by its declaration
/// index, so a child's parameters do not depend on which other children were
/// chosen. Children are applied in ascending index order unless
/// [`RandomSubset::with_random_order`] is set.
pub struct RandomSubset {
    transforms: Vec<Box<dyn Transform>>,
    size: SubsetSize,
    random_order: bool,
}

impl RandomSubset {
    /// Subset of boxed transforms.
    #[must_use]
    pub fn from_vec(transforms: Vec<Box<dyn Transform>>, size: SubsetSize) -> Self {
        Self {
            transforms,
            size,
            random_order: false,
        }
    }

    /// Create a new empty subset node.
    #[must_use]
    pub fn new(size: SubsetSize) -> Self {
        Self::from_vec(Vec::new(), size)
    }

    /// Add a transform, builder style.
    #[must_use]
    pub fn with<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Apply the chosen children in a random order instead of index order.
    #[must_use]
    pub fn with_random_order(mut self, random_order: bool) -> Self {
        self.random_order = random_order;
        self
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    fn draw_k(&self, sampler: &mut Sampler) -> Result<usize> {
        let n = self.transforms.len();
        match self.size {
            SubsetSize::Exact(k) if k <= n => Ok(k),
            SubsetSize::Range { min, max } if min <= max && max <= n => {
                Ok(sampler.rand_int(min as i64, max as i64) as usize)
            }
            SubsetSize::Any => Ok(sampler.rand_k_from(n)),
            size => Err(CoreError::configuration(
                self.name(),
                format!("subset size {size:?} is not satisfiable with {n} transforms"),
            )),
        }
    }
}

impl Transform for RandomSubset {
    fn sample(&self, sampler: &mut Sampler) -> Result<Params> {
        let k = self.draw_k(sampler)?;
        let mut indices = sampler.subset(self.transforms.len(), k);
        if self.random_order {
            let order = sampler.permutation(indices.len());
            indices = order.into_iter().map(|i| indices[i]).collect();
        }
        tracing::trace!(?indices, "random subset drawn");

        let children = indices
            .iter()
            .map(|&i| {
                let mut fork = sampler.fork_keyed(i as u64);
                sample_child(self.transforms[i].as_ref(), i, &mut fork)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Params::Subset { indices, children })
    }

    fn apply(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        let Params::Subset { indices, children } = params else {
            return Err(wrong_node(self.name(), "subset", params));
        };
        let n = self.transforms.len();
        if indices.len() != children.len() {
            return Err(CoreError::replay_mismatch(
                self.name(),
                format!(
                    "{} indices but {} child parameter sets",
                    indices.len(),
                    children.len()
                ),
            ));
        }
        let mut seen = vec![false; n];
        for &i in indices {
            if i >= n || std::mem::replace(&mut seen[i], true) {
                return Err(CoreError::replay_mismatch(
                    self.name(),
                    format!("indices {indices:?} are not distinct indices below {n}"),
                ));
            }
        }

        let mut current = bundle.clone();
        for (&i, child) in indices.iter().zip(children) {
            current = apply_child(self.transforms[i].as_ref(), i, child, &current)?;
        }
        Ok(current)
    }

    fn name(&self) -> &str {
        "RandomSubset"
    }
}
