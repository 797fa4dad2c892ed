//! Top-level driver: sample, then apply.

use rayon::prelude::*;

use crate::bundle::Bundle;
use crate::error::Result;
use crate::params::Params;
use crate::sampler::Sampler;
use crate::seed::Seed;
use crate::transform::Transform;

/// Run `root` on `bundle`: sample a parameter tree, then apply it.
///
/// Without a seed the sampler is created from ambient entropy; in that case
/// the returned parameter tree, not the seed, is what makes the run
/// reproducible.
///
/// # Errors
///
/// The first error raised while sampling or applying.
pub fn run(root: &dyn Transform, bundle: &Bundle, seed: Option<Seed>) -> Result<(Bundle, Params)> {
    let seed = seed.unwrap_or_else(Seed::from_entropy);
    tracing::debug!(%seed, transform = root.name(), members = bundle.len(), "running pipeline");

    let mut sampler = Sampler::new(seed);
    let params = root.sample(&mut sampler)?;
    let output = root.apply(&params, bundle)?;
    Ok((output, params))
}

/// Re-apply a previously realized parameter tree without sampling.
///
/// # Errors
///
/// A replay mismatch if `params` was not produced by a tree shaped like
/// `root`, or any error raised while applying.
pub fn replay(root: &dyn Transform, params: &Params, bundle: &Bundle) -> Result<Bundle> {
    tracing::debug!(
        transform = root.name(),
        nodes = params.node_count(),
        members = bundle.len(),
        "replaying pipeline"
    );
    root.apply(params, bundle)
}

/// Owns a transform tree and runs it.
///
/// # Example
///
/// ```rust
/// use cornucopia_core::{Bundle, Identity, Member, Pipeline, Probability, Seed};
/// use ndarray::Array3;
///
/// let pipeline = Pipeline::new(Probability::new(Identity, 0.5));
/// let bundle = Bundle::new().with("image", Member::intensity(Array3::<f32>::zeros((1, 4, 4))));
///
/// let (out, params) = pipeline.run(&bundle, Some(Seed::new(42))).unwrap();
/// assert_eq!(pipeline.replay(&params, &bundle).unwrap(), out);
/// ```
pub struct Pipeline {
    root: Box<dyn Transform>,
}

impl Pipeline {
    /// Create a pipeline around `root`.
    pub fn new<T: Transform + 'static>(root: T) -> Self {
        Self {
            root: Box::new(root),
        }
    }

    /// Create a pipeline around an already boxed tree.
    #[must_use]
    pub fn from_boxed(root: Box<dyn Transform>) -> Self {
        Self { root }
    }

    /// The root transform.
    #[must_use]
    pub fn root(&self) -> &dyn Transform {
        self.root.as_ref()
    }

    /// Sample a parameter tree without touching any data.
    ///
    /// # Errors
    ///
    /// The first configuration or shape error raised while sampling.
    pub fn sample(&self, seed: Option<Seed>) -> Result<Params> {
        let seed = seed.unwrap_or_else(Seed::from_entropy);
        self.root.sample(&mut Sampler::new(seed))
    }

    /// See [`run`].
    ///
    /// # Errors
    ///
    /// The first error raised while sampling or applying.
    pub fn run(&self, bundle: &Bundle, seed: Option<Seed>) -> Result<(Bundle, Params)> {
        run(self.root.as_ref(), bundle, seed)
    }

    /// See [`replay`].
    ///
    /// # Errors
    ///
    /// A replay mismatch, or any error raised while applying.
    pub fn replay(&self, params: &Params, bundle: &Bundle) -> Result<Bundle> {
        replay(self.root.as_ref(), params, bundle)
    }

    /// Run every bundle of a batch in parallel.
    ///
    /// The batch seed is forked once per item, in item order, before any work
    /// is handed to the thread pool; item `i` always receives the `i`-th fork
    /// whatever the scheduling.
    pub fn run_batch(&self, bundles: &[Bundle], seed: Seed) -> Vec<Result<(Bundle, Params)>> {
        let mut batch_sampler = Sampler::new(seed);
        let seeds: Vec<Seed> = bundles.iter().map(|_| batch_sampler.fork().seed()).collect();
        tracing::debug!(%seed, items = bundles.len(), "running pipeline batch");

        bundles
            .par_iter()
            .zip(seeds.par_iter())
            .map(|(bundle, item_seed)| self.run(bundle, Some(*item_seed)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Member;
    use crate::compose::{Probability, Sequence};
    use crate::transform::Identity;
    use ndarray::Array3;

    fn bundle() -> Bundle {
        Bundle::new().with("image", Member::intensity(Array3::<f32>::ones((1, 3, 3))))
    }

    #[test]
    fn test_run_is_deterministic() {
        let pipeline = Pipeline::new(Sequence::new().then(Probability::new(Identity, 0.5)));
        let (out1, p1) = pipeline.run(&bundle(), Some(Seed::new(42))).unwrap();
        let (out2, p2) = pipeline.run(&bundle(), Some(Seed::new(42))).unwrap();
        assert_eq!(out1, out2);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_sample_matches_run() {
        let pipeline = Pipeline::new(Probability::new(Identity, 0.5));
        let sampled = pipeline.sample(Some(Seed::new(9))).unwrap();
        let (_, params) = pipeline.run(&bundle(), Some(Seed::new(9))).unwrap();
        assert_eq!(sampled, params);
    }

    #[test]
    fn test_unseeded_run_replays() {
        let pipeline = Pipeline::new(Probability::new(Identity, 0.5));
        let (out, params) = pipeline.run(&bundle(), None).unwrap();
        assert_eq!(pipeline.replay(&params, &bundle()).unwrap(), out);
    }

    #[test]
    fn test_run_batch_matches_sequential_forks() {
        let pipeline = Pipeline::new(Probability::new(Identity, 0.5));
        let bundles = vec![bundle(), bundle(), bundle()];
        let results = pipeline.run_batch(&bundles, Seed::new(5));
        assert_eq!(results.len(), 3);

        let mut batch_sampler = Sampler::new(Seed::new(5));
        for result in results {
            let (_, params) = result.unwrap();
            let item_seed = batch_sampler.fork().seed();
            assert_eq!(params, pipeline.sample(Some(item_seed)).unwrap());
        }
    }
}
