//! Realized parameter values.

use serde::{Deserialize, Serialize};

/// A single sampled value.
///
/// The variant records the numeric type so that a serialized parameter tree
/// deserializes back to exactly the values that were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// Vector of booleans.
    BoolVector(Vec<bool>),
    /// Vector of integers.
    IntVector(Vec<i64>),
    /// Vector of floats.
    FloatVector(Vec<f64>),
    /// Dense row-major array.
    Array {
        /// Array shape.
        shape: Vec<usize>,
        /// Row-major data, `shape.iter().product()` elements.
        data: Vec<f64>,
    },
}

impl Value {
    /// Shape of the value: `[]` for scalars, `[n]` for vectors.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::Float(_) => Vec::new(),
            Self::BoolVector(v) => vec![v.len()],
            Self::IntVector(v) => vec![v.len()],
            Self::FloatVector(v) => vec![v.len()],
            Self::Array { shape, .. } => shape.clone(),
        }
    }

    /// Check if the value is a scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_))
    }

    /// `false` if any float entry is NaN or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            Self::FloatVector(data) | Self::Array { data, .. } => data.iter().all(|v| v.is_finite()),
            Self::Bool(_) | Self::Int(_) | Self::BoolVector(_) | Self::IntVector(_) => true,
        }
    }

    /// Short name of the value's type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::BoolVector(_) => "bool_vector",
            Self::IntVector(_) => "int_vector",
            Self::FloatVector(_) => "float_vector",
            Self::Array { .. } => "array",
        }
    }

    /// Scalar as `f64`. Integers and booleans are widened.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f64),
            Self::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Scalar as `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Bool(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    /// Scalar as `bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Any scalar or vector flattened to `f64`s.
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::Float(_) => self.as_f64().into_iter().collect(),
            Self::BoolVector(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            Self::IntVector(v) => v.iter().map(|&i| i as f64).collect(),
            Self::FloatVector(v) => v.clone(),
            Self::Array { data, .. } => data.clone(),
        }
    }

    /// Broadcast a scalar to `shape`.
    ///
    /// Returns `None` if `self` is not a scalar.
    #[must_use]
    pub fn broadcast(&self, shape: &[usize]) -> Option<Self> {
        if shape.is_empty() {
            return self.is_scalar().then(|| self.clone());
        }
        let n: usize = shape.iter().product();
        match (self, shape.len()) {
            (Self::Bool(b), 1) => Some(Self::BoolVector(vec![*b; n])),
            (Self::Int(i), 1) => Some(Self::IntVector(vec![*i; n])),
            (Self::Float(f), 1) => Some(Self::FloatVector(vec![*f; n])),
            (scalar, _) if scalar.is_scalar() => Some(Self::Array {
                shape: shape.to_vec(),
                data: vec![scalar.as_f64()?; n],
            }),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatVector(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Self::IntVector(v)
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Self::BoolVector(v)
    }
}
