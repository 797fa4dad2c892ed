//! Forkable random-value source.

use rand::distributions::{Distribution as _, WeightedIndex};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::distribution::{validate_weights, Distribution};
use crate::error::{CoreError, Result};
use crate::seed::Seed;
use crate::value::Value;

/// Stateful, forkable random-value generator.
///
/// A sampler owns one ChaCha8 stream. Forks are derived from the sampler's
/// seed and a fork counter, never from the stream position, so the sub-seed
/// handed to the `i`-th fork does not depend on how many values the parent
/// has drawn.
///
/// `Sampler` is intentionally not `Clone`: one stream belongs to one
/// invocation.
///
/// # Example
///
/// ```rust
/// use cornucopia_core::{Distribution, Sampler, Seed};
///
/// let mut sampler = Sampler::new(Seed::new(42));
/// let mut child = sampler.fork();
/// let gamma = child.draw("gamma", &Distribution::uniform(0.5, 1.5), &[]).unwrap();
/// assert!(gamma.as_f64().unwrap() >= 0.5);
/// ```
#[derive(Debug)]
pub struct Sampler {
    seed: Seed,
    rng: ChaCha8Rng,
    forks: u64,
}

impl Sampler {
    /// Create a sampler from a seed.
    #[must_use]
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            rng: seed.to_rng(),
            forks: 0,
        }
    }

    /// Create a sampler from ambient entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(Seed::from_entropy())
    }

    /// The seed this sampler was created from.
    #[must_use]
    pub const fn seed(&self) -> Seed {
        self.seed
    }

    /// Number of positional forks taken so far.
    #[must_use]
    pub const fn fork_count(&self) -> u64 {
        self.forks
    }

    /// Fork the next positional child stream.
    pub fn fork(&mut self) -> Sampler {
        let child = Sampler::new(self.seed.child(self.forks));
        self.forks += 1;
        child
    }

    /// Fork `n` positional child streams.
    pub fn fork_n(&mut self, n: usize) -> Vec<Sampler> {
        (0..n).map(|_| self.fork()).collect()
    }

    /// Sub-stream keyed by `key`.
    ///
    /// Does not advance the fork counter: the same key always yields the same
    /// stream, whatever else has been forked.
    #[must_use]
    pub fn fork_keyed(&self, key: u64) -> Sampler {
        Sampler::new(self.seed.keyed(key))
    }

    /// Draw a value named `name` from `dist` with the given `shape`.
    ///
    /// `[]` yields a scalar, `[n]` a vector, anything else a dense array.
    /// Integer-valued distributions yield `int`/`int_vector`, Bernoulli yields
    /// `bool`/`bool_vector`; multi-dimensional draws are stored as `f64` arrays.
    /// [`Distribution::RandKFrom`] always yields an `int_vector` and accepts
    /// `[]` or `[k]`.
    ///
    /// # Errors
    ///
    /// A configuration error if `dist` is invalid or the draw is not finite
    /// (a wide log-normal can overflow), or a shape mismatch if a fixed value
    /// or per-element arguments cannot take the requested shape.
    pub fn draw(&mut self, name: &str, dist: &Distribution, shape: &[usize]) -> Result<Value> {
        dist.validate().map_err(|err| match err {
            CoreError::Configuration { message, .. } => CoreError::configuration(
                "Sampler",
                format!("parameter `{name}`: {message}"),
            ),
            other => other,
        })?;

        let value = self.draw_validated(name, dist, shape)?;
        if !value.is_finite() {
            return Err(CoreError::configuration(
                "Sampler",
                format!("parameter `{name}`: `{}` drew a non-finite value", dist.kind()),
            ));
        }
        Ok(value)
    }

    fn draw_validated(&mut self, name: &str, dist: &Distribution, shape: &[usize]) -> Result<Value> {
        let n: usize = shape.iter().product();
        match dist {
            Distribution::Fixed { value } => {
                if value.shape() == shape {
                    return Ok(value.clone());
                }
                return value.broadcast(shape).ok_or_else(|| {
                    CoreError::shape_mismatch(
                        "Sampler",
                        name,
                        format!(
                            "fixed value of shape {:?} does not match declared shape {shape:?}",
                            value.shape()
                        ),
                    )
                });
            }
            Distribution::RandKFrom {
                values,
                k,
                replacement,
            } => return self.draw_k_from(name, values, *k, *replacement, shape),
            _ => {}
        }

        if let Some(len) = dist.element_count() {
            if len != n {
                return Err(CoreError::shape_mismatch(
                    "Sampler",
                    name,
                    format!("{len} per-element arguments for declared shape {shape:?}"),
                ));
            }
        }

        let value = match (dist, shape.len()) {
            (Distribution::Bernoulli { p }, 0) => Value::Bool(self.rng.gen_bool(*p)),
            (Distribution::Bernoulli { p }, 1) => {
                Value::BoolVector((0..n).map(|_| self.rng.gen_bool(*p)).collect())
            }
            (Distribution::RandInt { .. } | Distribution::Categorical { .. }, 0) => {
                Value::Int(self.draw_int(dist)?)
            }
            (Distribution::RandInt { .. } | Distribution::Categorical { .. }, 1) => {
                Value::IntVector((0..n).map(|_| self.draw_int(dist)).collect::<Result<_>>()?)
            }
            (_, 0) => Value::Float(self.draw_f64(dist, 0)?),
            (_, 1) => Value::FloatVector((0..n).map(|i| self.draw_f64(dist, i)).collect::<Result<_>>()?),
            (_, _) => Value::Array {
                shape: shape.to_vec(),
                data: (0..n).map(|i| self.draw_f64(dist, i)).collect::<Result<_>>()?,
            },
        };
        Ok(value)
    }

    fn draw_k_from(
        &mut self,
        name: &str,
        values: &[i64],
        k: Option<usize>,
        replacement: bool,
        shape: &[usize],
    ) -> Result<Value> {
        match (shape, k) {
            ([], _) => {}
            ([m], Some(k)) if *m == k => {}
            _ => {
                return Err(CoreError::shape_mismatch(
                    "Sampler",
                    name,
                    format!("rand_k_from with k = {k:?} cannot take declared shape {shape:?}"),
                ))
            }
        }
        let k = k.unwrap_or_else(|| self.rand_k_from(values.len()));
        let picked = if replacement {
            (0..k)
                .filter_map(|_| values.choose(&mut self.rng).copied())
                .collect()
        } else {
            rand::seq::index::sample(&mut self.rng, values.len(), k.min(values.len()))
                .into_iter()
                .map(|i| values[i])
                .collect()
        };
        Ok(Value::IntVector(picked))
    }

    /// Element `i` of a continuous draw.
    fn draw_f64(&mut self, dist: &Distribution, i: usize) -> Result<f64> {
        let value = match dist {
            Distribution::Uniform { low, high } => self.uniform(low.at(i), high.at(i)),
            Distribution::LogUniform { low, high } => {
                self.uniform(low.at(i).ln(), high.at(i).ln()).exp()
            }
            Distribution::Normal { mean, std } => self.normal(mean.at(i), std.at(i)),
            Distribution::LogNormal { mu, sigma } => self.normal(mu.at(i), sigma.at(i)).exp(),
            Distribution::Bernoulli { p } => {
                if self.rng.gen_bool(*p) {
                    1.0
                } else {
                    0.0
                }
            }
            Distribution::RandInt { .. } | Distribution::Categorical { .. } => {
                self.draw_int(dist)? as f64
            }
            Distribution::Fixed { value } => value.as_f64().ok_or_else(|| {
                CoreError::configuration("Sampler", "fixed value is not a scalar")
            })?,
            Distribution::RandKFrom { .. } => {
                return Err(CoreError::configuration(
                    "Sampler",
                    "`rand_k_from` does not yield a scalar",
                ))
            }
        };
        Ok(value)
    }

    fn draw_int(&mut self, dist: &Distribution) -> Result<i64> {
        match *dist {
            Distribution::RandInt { low, high } => Ok(self.rand_int(low, high)),
            Distribution::Categorical { ref weights } => Ok(self.categorical(weights)? as i64),
            _ => Err(CoreError::configuration(
                "Sampler",
                format!("`{}` is not an integer distribution", dist.kind()),
            )),
        }
    }

    /// Uniform float on `[low, high)`; returns `low` when the range is empty.
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.rng.gen::<f64>()
    }

    /// Gaussian float.
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + std * z
    }

    /// Integer uniform on `low..=high`.
    pub fn rand_int(&mut self, low: i64, high: i64) -> i64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    /// `true` with probability `p`, clamped to `[0, 1]`. NaN counts as `0`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        if p.is_nan() {
            return false;
        }
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Index drawn proportionally to `weights`.
    ///
    /// # Errors
    ///
    /// A configuration error if the weights are empty, negative or sum to zero.
    pub fn categorical(&mut self, weights: &[f64]) -> Result<usize> {
        validate_weights(weights).map_err(|message| CoreError::configuration("Sampler", message))?;
        let index = WeightedIndex::new(weights)
            .map_err(|e| CoreError::configuration("Sampler", e.to_string()))?;
        Ok(index.sample(&mut self.rng))
    }

    /// Random permutation of `0..n` (Fisher-Yates).
    pub fn permutation(&mut self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng);
        order
    }

    /// `k` distinct indices from `0..n`, ascending. `k` is capped at `n`.
    pub fn subset(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut indices = rand::seq::index::sample(&mut self.rng, n, k.min(n)).into_vec();
        indices.sort_unstable();
        indices
    }

    /// A random count in `1..=n` (`0` when `n == 0`).
    pub fn rand_k_from(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(1..=n)
    }

    /// Raw 64-bit draw, used to seed deterministic noise fields.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}
