//! Distribution descriptors.
//!
//! A [`Distribution`] only describes *what* to draw. Drawing happens in
//! [`crate::Sampler::draw`], which owns the random stream.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::value::Value;

/// A distribution argument: one value shared by every element of a draw, or
/// one value per element.
///
/// Serialized untagged, so `0.5` and `[0.5, 1.0, 2.0]` are both accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// Broadcast to every element.
    One(f64),
    /// One value per element, in row-major order.
    Each(Vec<f64>),
}

impl Arg {
    /// Number of per-element values, or `None` for a broadcast argument.
    #[must_use]
    pub fn per_element_len(&self) -> Option<usize> {
        match self {
            Self::One(_) => None,
            Self::Each(values) => Some(values.len()),
        }
    }

    /// Value used for element `i`.
    ///
    /// Out-of-range indices yield NaN, which every consumer rejects.
    #[must_use]
    pub fn at(&self, i: usize) -> f64 {
        match self {
            Self::One(x) => *x,
            Self::Each(values) => values.get(i).copied().unwrap_or(f64::NAN),
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            Self::One(x) => Self::One(f(*x)),
            Self::Each(values) => Self::Each(values.iter().map(|&x| f(x)).collect()),
        }
    }
}

impl From<f64> for Arg {
    fn from(x: f64) -> Self {
        Self::One(x)
    }
}

impl From<Vec<f64>> for Arg {
    fn from(values: Vec<f64>) -> Self {
        Self::Each(values)
    }
}

impl From<&[f64]> for Arg {
    fn from(values: &[f64]) -> Self {
        Self::Each(values.to_vec())
    }
}

/// A named distribution, or a fixed value standing in for one.
///
/// Serialized with a `kind` tag:
///
/// ```json
/// { "kind": "uniform", "low": 0.5, "high": 1.5 }
/// { "kind": "uniform", "low": [-2, -2, -8], "high": [2, 2, 8] }
/// ```
///
/// Continuous kinds take [`Arg`]s, so bounds may differ per element (per
/// axis, for a `[ndim]` draw).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Always yields `value`.
    Fixed {
        /// The value.
        value: Value,
    },
    /// Continuous uniform on `[low, high)`.
    Uniform {
        /// Lower bound.
        low: Arg,
        /// Upper bound.
        high: Arg,
    },
    /// `exp(U(ln low, ln high))`; both bounds must be positive.
    LogUniform {
        /// Lower bound.
        low: Arg,
        /// Upper bound.
        high: Arg,
    },
    /// Gaussian.
    Normal {
        /// Mean.
        mean: Arg,
        /// Standard deviation.
        std: Arg,
    },
    /// `exp(N(mu, sigma))`.
    LogNormal {
        /// Mean of the log.
        mu: Arg,
        /// Standard deviation of the log.
        sigma: Arg,
    },
    /// Discrete uniform on `low..=high`.
    RandInt {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
    },
    /// Index drawn proportionally to `weights`.
    Categorical {
        /// Non-negative weights with a positive sum.
        weights: Vec<f64>,
    },
    /// `true` with probability `p`.
    Bernoulli {
        /// Success probability in `[0, 1]`.
        p: f64,
    },
    /// `k` entries picked from `values`.
    ///
    /// Yields an `int_vector`. Without `k`, a count is drawn from
    /// `1..=values.len()` first, so at least one entry is always picked.
    RandKFrom {
        /// Candidates.
        values: Vec<i64>,
        /// Number of picks; random when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        k: Option<usize>,
        /// Pick with replacement.
        #[serde(default)]
        replacement: bool,
    },
}

impl Distribution {
    /// Fixed value.
    pub fn fixed(value: impl Into<Value>) -> Self {
        Self::Fixed {
            value: value.into(),
        }
    }

    /// Uniform on `[low, high)`.
    #[must_use]
    pub fn uniform(low: impl Into<Arg>, high: impl Into<Arg>) -> Self {
        Self::Uniform {
            low: low.into(),
            high: high.into(),
        }
    }

    /// Log-uniform on `[low, high)`.
    #[must_use]
    pub fn log_uniform(low: impl Into<Arg>, high: impl Into<Arg>) -> Self {
        Self::LogUniform {
            low: low.into(),
            high: high.into(),
        }
    }

    /// Gaussian.
    #[must_use]
    pub fn normal(mean: impl Into<Arg>, std: impl Into<Arg>) -> Self {
        Self::Normal {
            mean: mean.into(),
            std: std.into(),
        }
    }

    /// Log-normal.
    #[must_use]
    pub fn log_normal(mu: impl Into<Arg>, sigma: impl Into<Arg>) -> Self {
        Self::LogNormal {
            mu: mu.into(),
            sigma: sigma.into(),
        }
    }

    /// Discrete uniform on `low..=high`.
    #[must_use]
    pub const fn rand_int(low: i64, high: i64) -> Self {
        Self::RandInt { low, high }
    }

    /// Categorical over `weights`.
    #[must_use]
    pub fn categorical(weights: Vec<f64>) -> Self {
        Self::Categorical { weights }
    }

    /// Bernoulli with success probability `p`.
    #[must_use]
    pub const fn bernoulli(p: f64) -> Self {
        Self::Bernoulli { p }
    }

    /// `k` picks from `values`; a random count in `1..=values.len()` when
    /// `k` is `None`.
    #[must_use]
    pub fn rand_k_from(values: Vec<i64>, k: Option<usize>, replacement: bool) -> Self {
        Self::RandKFrom {
            values,
            k,
            replacement,
        }
    }

    /// `U(-x, x)`, per element when `x` is a vector.
    #[must_use]
    pub fn symmetric(x: impl Into<Arg>) -> Self {
        let x = x.into().map(f64::abs);
        Self::uniform(x.map(|v| -v), x)
    }

    /// `U(0, x)`.
    #[must_use]
    pub fn upper(x: impl Into<Arg>) -> Self {
        let x = x.into();
        Self::uniform(x.map(|_| 0.0), x)
    }

    /// `U(x, 0)`.
    #[must_use]
    pub fn lower(x: impl Into<Arg>) -> Self {
        let x = x.into();
        Self::uniform(x.clone(), x.map(|_| 0.0))
    }

    /// Build a distribution from its kind name and positional arguments.
    ///
    /// | kind | args |
    /// |------|------|
    /// | `fixed` | `value` |
    /// | `uniform`, `log_uniform` | `low, high` (or just `high`, with `low = 0`) |
    /// | `normal` | `mean, std` |
    /// | `log_normal` | `mu, sigma` |
    /// | `rand_int` | `low, high` (or just `high`), integral |
    /// | `categorical` | `weights...` |
    /// | `bernoulli` | `p` |
    /// | `rand_k_from` | `values...`, integral |
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown kind, a wrong number of
    /// arguments, or a non-integral argument to an integer kind.
    pub fn from_kind(kind: &str, args: &[f64]) -> Result<Self> {
        let bad_arity = |expected: &str| {
            CoreError::configuration(
                "Distribution",
                format!("`{kind}` expects {expected} argument(s), got {}", args.len()),
            )
        };
        let dist = match (kind, args) {
            ("fixed", [value]) => Self::fixed(*value),
            ("fixed", _) => return Err(bad_arity("1")),
            ("uniform", [high]) => Self::uniform(0.0, *high),
            ("uniform", [low, high]) => Self::uniform(*low, *high),
            ("uniform", _) => return Err(bad_arity("1 or 2")),
            ("log_uniform", [low, high]) => Self::log_uniform(*low, *high),
            ("log_uniform", _) => return Err(bad_arity("2")),
            ("normal", [mean, std]) => Self::normal(*mean, *std),
            ("normal", _) => return Err(bad_arity("2")),
            ("log_normal", [mu, sigma]) => Self::log_normal(*mu, *sigma),
            ("log_normal", _) => return Err(bad_arity("2")),
            ("rand_int", [high]) => Self::rand_int(0, integral(kind, *high)?),
            ("rand_int", [low, high]) => Self::rand_int(integral(kind, *low)?, integral(kind, *high)?),
            ("rand_int", _) => return Err(bad_arity("1 or 2")),
            ("categorical", weights) => Self::categorical(weights.to_vec()),
            ("bernoulli", [p]) => Self::bernoulli(*p),
            ("bernoulli", _) => return Err(bad_arity("1")),
            ("rand_k_from", []) => return Err(bad_arity("at least 1")),
            ("rand_k_from", values) => Self::rand_k_from(
                values.iter().map(|&x| integral(kind, x)).collect::<Result<_>>()?,
                None,
                false,
            ),
            (other, _) => {
                return Err(CoreError::configuration(
                    "Distribution",
                    format!("unknown distribution kind `{other}`"),
                ))
            }
        };
        dist.validate()?;
        Ok(dist)
    }

    /// Kind name, as used in serialized form.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Uniform { .. } => "uniform",
            Self::LogUniform { .. } => "log_uniform",
            Self::Normal { .. } => "normal",
            Self::LogNormal { .. } => "log_normal",
            Self::RandInt { .. } => "rand_int",
            Self::Categorical { .. } => "categorical",
            Self::Bernoulli { .. } => "bernoulli",
            Self::RandKFrom { .. } => "rand_k_from",
        }
    }

    /// Number of elements the per-element arguments describe, if any.
    ///
    /// A draw must then have exactly this many elements.
    #[must_use]
    pub fn element_count(&self) -> Option<usize> {
        let (a, b) = match self {
            Self::Uniform { low, high } | Self::LogUniform { low, high } => (low, high),
            Self::Normal { mean, std } => (mean, std),
            Self::LogNormal { mu, sigma } => (mu, sigma),
            _ => return None,
        };
        a.per_element_len().max(b.per_element_len())
    }

    /// Check the distribution's parameters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid parameter.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(CoreError::configuration("Distribution", message));
        let kind = self.kind();
        match self {
            Self::Fixed { .. } => Ok(()),
            Self::Uniform { low, high } => {
                for (low, high) in pairs(kind, low, high)? {
                    if !(low.is_finite() && high.is_finite()) || low > high {
                        return fail(format!("uniform bounds must be finite with low <= high, got [{low}, {high}]"));
                    }
                }
                Ok(())
            }
            Self::LogUniform { low, high } => {
                for (low, high) in pairs(kind, low, high)? {
                    if !(low > 0.0 && high.is_finite()) || low > high {
                        return fail(format!("log_uniform bounds must satisfy 0 < low <= high, got [{low}, {high}]"));
                    }
                }
                Ok(())
            }
            Self::Normal { mean, std } => {
                for (mean, std) in pairs(kind, mean, std)? {
                    if !mean.is_finite() || !(std >= 0.0 && std.is_finite()) {
                        return fail(format!("normal needs finite mean and std >= 0, got ({mean}, {std})"));
                    }
                }
                Ok(())
            }
            Self::LogNormal { mu, sigma } => {
                for (mu, sigma) in pairs(kind, mu, sigma)? {
                    if !mu.is_finite() || !(sigma >= 0.0 && sigma.is_finite()) {
                        return fail(format!("log_normal needs finite mu and sigma >= 0, got ({mu}, {sigma})"));
                    }
                }
                Ok(())
            }
            Self::RandInt { low, high } => {
                if low > high {
                    return fail(format!("rand_int needs low <= high, got [{low}, {high}]"));
                }
                Ok(())
            }
            Self::Categorical { weights } => validate_weights(weights).map_err(|message| {
                CoreError::configuration("Distribution", message)
            }),
            Self::Bernoulli { p } => {
                if !(0.0..=1.0).contains(p) {
                    return fail(format!("bernoulli p must lie in [0, 1], got {p}"));
                }
                Ok(())
            }
            Self::RandKFrom {
                values,
                k,
                replacement,
            } => {
                if values.is_empty() {
                    return fail("rand_k_from needs at least one value".to_string());
                }
                match *k {
                    Some(0) => fail("rand_k_from needs k >= 1".to_string()),
                    Some(k) if !replacement && k > values.len() => fail(format!(
                        "rand_k_from cannot pick {k} of {} values without replacement",
                        values.len()
                    )),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Element-wise argument pairs, broadcasting a single value against a
/// per-element one.
fn pairs(kind: &str, a: &Arg, b: &Arg) -> Result<Vec<(f64, f64)>> {
    let n = match (a.per_element_len(), b.per_element_len()) {
        (None, None) => 1,
        (Some(n), None) | (None, Some(n)) => n,
        (Some(n), Some(m)) if n == m => n,
        (Some(n), Some(m)) => {
            return Err(CoreError::configuration(
                "Distribution",
                format!("{kind} per-element arguments differ in length ({n} vs {m})"),
            ))
        }
    };
    if n == 0 {
        return Err(CoreError::configuration(
            "Distribution",
            format!("{kind} per-element arguments must not be empty"),
        ));
    }
    Ok((0..n).map(|i| (a.at(i), b.at(i))).collect())
}

fn integral(kind: &str, x: f64) -> Result<i64> {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        Ok(x as i64)
    } else {
        Err(CoreError::configuration(
            "Distribution",
            format!("`{kind}` expects integer arguments, got {x}"),
        ))
    }
}

/// Check categorical weights: non-empty, finite, non-negative, positive sum.
pub(crate) fn validate_weights(weights: &[f64]) -> std::result::Result<(), String> {
    if weights.is_empty() {
        return Err("categorical weights must not be empty".to_string());
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(format!("categorical weights must be finite and non-negative, got {weights:?}"));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err("categorical weights must have a positive sum".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kind() {
        assert_eq!(
            Distribution::from_kind("uniform", &[0.5, 1.5]).unwrap(),
            Distribution::uniform(0.5, 1.5)
        );
        assert_eq!(
            Distribution::from_kind("uniform", &[2.0]).unwrap(),
            Distribution::uniform(0.0, 2.0)
        );
        assert_eq!(
            Distribution::from_kind("rand_int", &[1.0, 4.0]).unwrap(),
            Distribution::rand_int(1, 4)
        );
    }

    #[test]
    fn test_unknown_kind_is_configuration_error() {
        let err = Distribution::from_kind("cauchy", &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
        assert!(err.to_string().contains("cauchy"));
    }

    #[test]
    fn test_wrong_arity() {
        assert!(Distribution::from_kind("normal", &[0.0]).is_err());
        assert!(Distribution::from_kind("bernoulli", &[]).is_err());
    }

    #[test]
    fn test_validation() {
        assert!(Distribution::uniform(1.0, 0.0).validate().is_err());
        assert!(Distribution::log_uniform(0.0, 1.0).validate().is_err());
        assert!(Distribution::normal(0.0, -1.0).validate().is_err());
        assert!(Distribution::bernoulli(1.5).validate().is_err());
        assert!(Distribution::categorical(vec![]).validate().is_err());
        assert!(Distribution::categorical(vec![0.0, 0.0]).validate().is_err());
        assert!(Distribution::categorical(vec![1.0, -1.0]).validate().is_err());
        assert!(Distribution::rand_int(3, 2).validate().is_err());
        assert!(Distribution::rand_k_from(vec![], None, false).validate().is_err());
        assert!(Distribution::rand_k_from(vec![1, 2], Some(3), false).validate().is_err());
        assert!(Distribution::rand_k_from(vec![1, 2], Some(3), true).validate().is_ok());

        assert!(Distribution::uniform(1.0, 1.0).validate().is_ok());
        assert!(Distribution::bernoulli(0.0).validate().is_ok());
        assert!(Distribution::categorical(vec![0.0, 2.0]).validate().is_ok());
    }

    #[test]
    fn test_rand_int_needs_integers() {
        for bad in [[0.0, 2.7], [f64::NAN, 3.0], [0.0, f64::INFINITY]] {
            let err = Distribution::from_kind("rand_int", &bad).unwrap_err();
            assert!(matches!(err, CoreError::Configuration { .. }));
        }
        assert!(Distribution::from_kind("rand_int", &[2.5]).is_err());
        assert!(Distribution::from_kind("rand_k_from", &[0.0, 1.5]).is_err());
        assert_eq!(
            Distribution::from_kind("rand_k_from", &[-3.0, -2.0, -1.0]).unwrap(),
            Distribution::rand_k_from(vec![-3, -2, -1], None, false)
        );
    }

    #[test]
    fn test_per_element_arguments() {
        let dist = Distribution::uniform(vec![-1.0, -2.0, -8.0], vec![1.0, 2.0, 8.0]);
        assert_eq!(dist.element_count(), Some(3));
        assert!(dist.validate().is_ok());
        assert_eq!(Distribution::uniform(0.0, 1.0).element_count(), None);

        // one side broadcast against the other
        assert!(Distribution::normal(0.0, vec![1.0, 2.0]).validate().is_ok());
        assert!(Distribution::uniform(vec![0.0, 3.0], 2.0).validate().is_err());
        assert!(Distribution::uniform(vec![0.0, 0.0], vec![1.0]).validate().is_err());
        assert!(Distribution::uniform(Vec::<f64>::new(), 1.0).validate().is_err());

        assert_eq!(
            Distribution::symmetric(vec![2.0, -4.0]),
            Distribution::uniform(vec![-2.0, -4.0], vec![2.0, 4.0])
        );
    }

    #[test]
    fn test_range_helpers() {
        assert_eq!(Distribution::symmetric(-2.0), Distribution::uniform(-2.0, 2.0));
        assert_eq!(Distribution::upper(3.0), Distribution::uniform(0.0, 3.0));
        assert_eq!(Distribution::lower(-3.0), Distribution::uniform(-3.0, 0.0));
    }

    #[test]
    fn test_serde_tagging() {
        let dist: Distribution =
            serde_json::from_str(r#"{"kind": "normal", "mean": 0.0, "std": 2.0}"#).unwrap();
        assert_eq!(dist, Distribution::normal(0.0, 2.0));

        let err = serde_json::from_str::<Distribution>(r#"{"kind": "cauchy"}"#);
        assert!(err.is_err());

        let per_axis: Distribution =
            serde_json::from_str(r#"{"kind": "uniform", "low": [-2, -2, -8], "high": [2, 2, 8]}"#)
                .unwrap();
        assert_eq!(per_axis.element_count(), Some(3));

        let axes: Distribution =
            serde_json::from_str(r#"{"kind": "rand_k_from", "values": [0, 1, 2]}"#).unwrap();
        assert_eq!(axes, Distribution::rand_k_from(vec![0, 1, 2], None, false));

        let fixed = Distribution::fixed(3_i64);
        let json = serde_json::to_string(&fixed).unwrap();
        assert_eq!(serde_json::from_str::<Distribution>(&json).unwrap(), fixed);
    }
}
